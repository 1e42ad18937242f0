use std::fs;
use std::path::PathBuf;

use game_of_life::board_io::{self, InputBoard};
use game_of_life::display::{self, BoardSink, FileSink, Frame};
use game_of_life::{Engine, Grid, LifeConfig, LifeError};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("gol-{}-{name}", std::process::id()))
}

#[test]
fn output_file_reads_back_as_input() {
    let mut grid = Grid::allocate(6, 9).unwrap();
    grid.fill_random(31, 0.5);

    let path = temp_path("roundtrip.out");
    let frame = Frame {
        generation: None,
        nrows: 6,
        ncols: 9,
    };
    display::show(&mut FileSink::new(&path), &frame, grid.cells()).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    let _ = fs::remove_file(&path);

    // A dump is the input format plus a separator line.
    let body = text.trim_end_matches('\n').trim_end_matches(board_io::SEPARATOR);
    let input = InputBoard::parse(body).unwrap();
    let mut back = Grid::allocate(input.nrows, input.ncols).unwrap();
    back.fill_from_lines(&input.lines).unwrap();
    assert_eq!(back.cells(), grid.cells());
}

#[test]
fn rendered_board_parses_back() {
    let mut grid = Grid::allocate(4, 5).unwrap();
    grid.fill_random(2, 0.6);
    let input = InputBoard::parse(&board_io::render_board(grid.cells(), 4, 5)).unwrap();
    let mut back = Grid::allocate(4, 5).unwrap();
    back.fill_from_lines(&input.lines).unwrap();
    assert_eq!(back.cells(), grid.cells());
}

#[test]
fn every_dump_is_kept_in_order() {
    let path = temp_path("dumps.out");
    let mut sink = FileSink::new(&path);
    let boards = [[1u8, 0, 0, 1], [0, 1, 1, 0], [1, 1, 1, 1]];
    for (i, cells) in boards.iter().enumerate() {
        let frame = Frame {
            generation: i.checked_sub(1),
            nrows: 2,
            ncols: 2,
        };
        sink.begin(&frame).unwrap();
        sink.rows(cells).unwrap();
        sink.end().unwrap();
    }
    let text = fs::read_to_string(&path).unwrap();
    let _ = fs::remove_file(&path);

    let dumps = board_io::parse_dumps(&text).unwrap();
    assert_eq!(dumps, boards.iter().map(|b| b.to_vec()).collect::<Vec<_>>());
}

#[test]
fn malformed_boards_are_format_errors() {
    let cases = [
        "",
        "3\nXXX\n",
        "x 3\n...\n",
        "2 3\nXXX\n",
        "2 3\nXXX\nXX\n",
        "2 3\nXXX\nXXXX\n",
    ];
    for text in cases {
        let result = InputBoard::parse(text).and_then(|input| {
            let mut grid = Grid::allocate(input.nrows, input.ncols)?;
            grid.fill_from_lines(&input.lines)
        });
        assert!(
            matches!(result, Err(LifeError::Format { .. })),
            "{text:?} should be rejected"
        );
    }
}

#[test]
fn input_header_overrides_the_configured_size() {
    let path = temp_path("header.txt");
    fs::write(&path, "3 4\n.X..\n..X.\nXXX.\n").unwrap();
    let config = LifeConfig {
        input_path: Some(path.clone()),
        ..LifeConfig::default()
    };
    let engine = Engine::initialize(&config).unwrap();
    let _ = fs::remove_file(&path);

    assert_eq!((engine.grid().nrows(), engine.grid().ncols()), (3, 4));
    assert_eq!(engine.grid().population(), 5);
}

#[test]
fn malformed_input_falls_back_to_a_random_board() {
    let path = temp_path("bad.txt");
    fs::write(&path, "3 4\n.X..\n").unwrap();
    let config = LifeConfig {
        nrows: 10,
        ncols: 12,
        input_path: Some(path.clone()),
        ..LifeConfig::default()
    };
    let engine = Engine::initialize(&config).unwrap();
    let _ = fs::remove_file(&path);

    let mut expected = Grid::allocate(10, 12).unwrap();
    expected.fill_random(config.seed, config.init_prob);
    assert_eq!(engine.grid().cells(), expected.cells());
}

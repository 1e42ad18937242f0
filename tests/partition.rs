use game_of_life::chunk::Chunk;
use game_of_life::partition::compute_bounds;
use game_of_life::Grid;

const WORKER_COUNTS: [usize; 4] = [1, 2, 3, 5];

fn chunks(nrows: usize, ncols: usize, workers: usize) -> Vec<Chunk> {
    (0..workers)
        .map(|rank| Chunk::allocate(compute_bounds(nrows, workers, rank).unwrap(), ncols).unwrap())
        .collect()
}

fn concat_own_rows(chunks: &[Chunk]) -> Vec<u8> {
    chunks.iter().flat_map(|c| c.own_rows().iter().copied()).collect()
}

#[test]
fn random_fill_does_not_depend_on_the_worker_count() {
    let (ncols, seed, prob) = (7, 1234, 0.5);
    for nrows in 4..=50 {
        let mut grid = Grid::allocate(nrows, ncols).unwrap();
        grid.fill_random(seed, prob);

        for workers in WORKER_COUNTS.into_iter().filter(|&w| w <= nrows) {
            let mut parts = chunks(nrows, ncols, workers);
            for chunk in &mut parts {
                chunk.fill_random(seed, prob);
            }
            assert_eq!(
                concat_own_rows(&parts),
                grid.cells(),
                "{nrows} rows over {workers} workers"
            );
        }
    }
}

#[test]
fn file_fill_does_not_depend_on_the_worker_count() {
    let (nrows, ncols) = (13, 5);
    let lines: Vec<String> = (0..nrows)
        .map(|r| (0..ncols).map(|c| if (r * 3 + c) % 4 == 0 { 'X' } else { '.' }).collect())
        .collect();

    let mut grid = Grid::allocate(nrows, ncols).unwrap();
    grid.fill_from_lines(&lines).unwrap();

    for workers in WORKER_COUNTS {
        let mut parts = chunks(nrows, ncols, workers);
        for chunk in &mut parts {
            chunk.fill_from_lines(&lines).unwrap();
        }
        assert_eq!(concat_own_rows(&parts), grid.cells());
    }
}

#[test]
fn ghosts_hold_the_neighbouring_rows() {
    let (nrows, ncols, seed, prob) = (17, 6, 8, 0.5);
    let mut grid = Grid::allocate(nrows, ncols).unwrap();
    grid.fill_random(seed, prob);

    for workers in WORKER_COUNTS {
        for mut chunk in chunks(nrows, ncols, workers) {
            chunk.fill_random(seed, prob);
            let b = *chunk.bounds();
            assert_eq!(chunk.row(0), grid.row((b.from + nrows - 1) % nrows));
            assert_eq!(chunk.row(b.nrows + 1), grid.row((b.to + 1) % nrows));
        }
    }
}

#[test]
fn last_rank_owns_the_displacement() {
    for workers in WORKER_COUNTS {
        let nrows = 23;
        let last = compute_bounds(nrows, workers, workers - 1).unwrap();
        assert_eq!(last.nrows, nrows / workers + nrows % workers);
        assert_eq!(last.to, nrows - 1);
    }
}

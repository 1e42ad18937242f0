//! Board file formats.
//!
//! Input:
//!
//! ```text
//! <nrows> <ncols>
//! <row 0: ncols chars, 'X' = ALIVE, anything else = DEAD>
//! ...
//! <row nrows-1>
//! ```
//!
//! Output: the same header, written once when the file is created, then one
//! dump per displayed generation (`X` or space per cell) each followed by a
//! line of [`SEPARATOR`].

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{LifeError, Result};
use crate::rules::{Cell, ALIVE, DEAD};

/// Line written after every generation dump.
pub const SEPARATOR: &str =
    "****************************************************************************************************";

const ALIVE_CHAR: char = 'X';
const DEAD_CHAR: char = ' ';

/// An input board as read from disk: the declared dimensions and the raw
/// row lines, not yet checked against them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBoard {
    pub nrows: usize,
    pub ncols: usize,
    pub lines: Vec<String>,
}

impl InputBoard {
    /// Read and split an input file.
    pub fn open(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| LifeError::io(path, e))?;
        Self::parse(&text)
    }

    /// Split input text into its header and row lines.
    ///
    /// Only the header is validated here; row count and row widths are
    /// checked when the lines are loaded into a grid or a chunk.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .ok_or_else(|| LifeError::format("the input file is empty"))?;
        let (nrows, ncols) = parse_header(header)?;

        Ok(Self {
            nrows,
            ncols,
            lines: lines.map(str::to_owned).collect(),
        })
    }
}

/// Parse the `<nrows> <ncols>` header line.
pub fn parse_header(line: &str) -> Result<(usize, usize)> {
    let mut tokens = line.split_whitespace();
    let mut next_dimension = |name: &str| -> Result<usize> {
        let token = tokens
            .next()
            .ok_or_else(|| LifeError::format(format!("the header is missing {name}")))?;
        let value = token
            .parse::<usize>()
            .map_err(|_| LifeError::format(format!("{name} `{token}` is not a number")))?;
        if value == 0 {
            return Err(LifeError::format(format!("{name} must be > 0")));
        }
        Ok(value)
    };

    let nrows = next_dimension("the number of rows")?;
    let ncols = next_dimension("the number of columns")?;
    Ok((nrows, ncols))
}

/// Check `lines` against the declared board shape.
pub fn check_shape(lines: &[String], nrows: usize, ncols: usize) -> Result<()> {
    if lines.len() != nrows {
        return Err(LifeError::format(format!(
            "expected {nrows} rows, found {}",
            lines.len()
        )));
    }
    for (i, line) in lines.iter().enumerate() {
        let width = line.chars().count();
        if width != ncols {
            return Err(LifeError::format(format!(
                "row {i} has {width} columns instead of {ncols}"
            )));
        }
    }
    Ok(())
}

/// Copy one text row into a row of cells. Only `X` marks a live cell.
pub fn decode_row(line: &str, out: &mut [Cell]) {
    for (cell, ch) in out.iter_mut().zip(line.chars()) {
        *cell = if ch == ALIVE_CHAR { ALIVE } else { DEAD };
    }
}

pub fn write_header<W: Write>(out: &mut W, nrows: usize, ncols: usize) -> std::io::Result<()> {
    writeln!(out, "{nrows} {ncols}")
}

/// Write `cells` (row-major, `ncols` wide) as text rows.
pub fn write_rows<W: Write>(out: &mut W, cells: &[Cell], ncols: usize) -> std::io::Result<()> {
    let mut line = String::with_capacity(ncols + 1);
    for row in cells.chunks(ncols) {
        line.clear();
        line.extend(row.iter().map(|&c| if c == ALIVE { ALIVE_CHAR } else { DEAD_CHAR }));
        line.push('\n');
        out.write_all(line.as_bytes())?;
    }
    Ok(())
}

pub fn write_separator<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "{SEPARATOR}")
}

/// Render a whole board in the input format (header and rows, no separator).
pub fn render_board(cells: &[Cell], nrows: usize, ncols: usize) -> String {
    let mut buf = Vec::with_capacity(nrows * (ncols + 1) + 16);
    // Writing into a Vec cannot fail.
    let _ = write_header(&mut buf, nrows, ncols);
    let _ = write_rows(&mut buf, cells, ncols);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Read every generation dump back out of an output file's text.
pub fn parse_dumps(text: &str) -> Result<Vec<Vec<Cell>>> {
    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| LifeError::format("the output file is empty"))?;
    let (nrows, ncols) = parse_header(header)?;

    let mut dumps = Vec::new();
    loop {
        let rows: Vec<String> = lines
            .by_ref()
            .take_while(|l| *l != SEPARATOR)
            .map(str::to_owned)
            .collect();
        if rows.is_empty() {
            break;
        }
        check_shape(&rows, nrows, ncols)?;

        let mut cells = vec![DEAD; nrows * ncols];
        for (line, out) in rows.iter().zip(cells.chunks_mut(ncols)) {
            decode_row(line, out);
        }
        dumps.push(cells);
    }
    Ok(dumps)
}

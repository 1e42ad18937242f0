//! Where displayed boards go.
//!
//! A board is streamed into a [`BoardSink`] as `begin`, any number of
//! `rows` calls in global row order, then `end`. The single-process engine
//! hands over the whole grid in one `rows` call; the distributed gather
//! hands over one rank's band at a time.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Stdout, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::board_io;
use crate::config;
use crate::error::{LifeError, Result};
use crate::rules::{Cell, ALIVE};

/// Pause between two console frames.
pub const FRAME_DELAY: Duration = Duration::from_millis(160);

const CLEAR: &str = "\x1b[H\x1b[J";
const LIVE_CELL: &str = "\x1b[07m  \x1b[m";
const DEAD_CELL: &str = "  ";
const NEXT_LINE: &str = "\x1b[E";

/// What is about to be displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// `None` for the initial board.
    pub generation: Option<usize>,
    pub nrows: usize,
    pub ncols: usize,
}

pub trait BoardSink {
    fn begin(&mut self, frame: &Frame) -> Result<()>;
    /// Row-major cells, a whole number of rows.
    fn rows(&mut self, cells: &[Cell]) -> Result<()>;
    fn end(&mut self) -> Result<()>;
}

/// Display a whole board at once.
pub fn show<S: BoardSink + ?Sized>(sink: &mut S, frame: &Frame, cells: &[Cell]) -> Result<()> {
    sink.begin(frame)?;
    sink.rows(cells)?;
    sink.end()
}

/// Which boards get displayed.
///
/// Small boards are shown initially and after every generation; big ones
/// only initially and after the last generation, to keep the output file
/// readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayPolicy {
    pub enabled: bool,
    pub big: bool,
}

impl DisplayPolicy {
    pub fn new(enabled: bool, nrows: usize, ncols: usize, max_display_size: usize) -> Self {
        Self {
            enabled,
            big: config::is_big(nrows, ncols, max_display_size),
        }
    }

    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            big: false,
        }
    }

    pub const fn show_initial(&self) -> bool {
        self.enabled
    }

    /// Whether the board computed at generation `t` (0-based) is shown.
    pub const fn show_generation(&self, t: usize, timesteps: usize) -> bool {
        self.enabled && (!self.big || t + 1 == timesteps)
    }
}

/// Pick the sink matching `policy`: the console for small boards, the output
/// file for big ones.
pub fn sink_for(policy: DisplayPolicy, output: &Path) -> Box<dyn BoardSink + Send> {
    match (policy.enabled, policy.big) {
        (false, _) => Box::new(NullSink),
        (true, false) => Box::new(ConsoleSink::stdout()),
        (true, true) => Box::new(FileSink::new(output)),
    }
}

/// ANSI rendering: every live cell is an inverted double space.
pub struct ConsoleSink<W: Write> {
    out: W,
    ncols: usize,
    delay: Option<Duration>,
}

impl ConsoleSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout()).with_delay(Some(FRAME_DELAY))
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            ncols: 0,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Option<Duration>) -> Self {
        self.delay = delay;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn fail(e: io::Error) -> LifeError {
        LifeError::io("<stdout>", e)
    }
}

impl<W: Write> BoardSink for ConsoleSink<W> {
    fn begin(&mut self, frame: &Frame) -> Result<()> {
        self.ncols = frame.ncols;
        self.out.write_all(CLEAR.as_bytes()).map_err(Self::fail)
    }

    fn rows(&mut self, cells: &[Cell]) -> Result<()> {
        let mut line = String::with_capacity(self.ncols * LIVE_CELL.len() + NEXT_LINE.len());
        for row in cells.chunks(self.ncols.max(1)) {
            line.clear();
            for &cell in row {
                line.push_str(if cell == ALIVE { LIVE_CELL } else { DEAD_CELL });
            }
            line.push_str(NEXT_LINE);
            self.out.write_all(line.as_bytes()).map_err(Self::fail)?;
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.out.flush().map_err(Self::fail)?;
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        Ok(())
    }
}

/// Output file in the board file format. The first dump truncates the file
/// and writes the dimension header, later dumps are appended.
pub struct FileSink {
    path: PathBuf,
    started: bool,
    writer: Option<BufWriter<File>>,
    ncols: usize,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            started: false,
            writer: None,
            ncols: 0,
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        let path = &self.path;
        self.writer
            .as_mut()
            .ok_or_else(|| LifeError::io(path, io::Error::other("rows written outside of a frame")))
    }
}

impl BoardSink for FileSink {
    fn begin(&mut self, frame: &Frame) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.started)
            .truncate(!self.started)
            .open(&self.path)
            .map_err(|e| LifeError::io(&self.path, e))?;
        let mut writer = BufWriter::new(file);

        if !self.started {
            board_io::write_header(&mut writer, frame.nrows, frame.ncols)
                .map_err(|e| LifeError::io(&self.path, e))?;
            self.started = true;
        }
        self.ncols = frame.ncols;
        self.writer = Some(writer);
        Ok(())
    }

    fn rows(&mut self, cells: &[Cell]) -> Result<()> {
        let ncols = self.ncols;
        let writer = self.writer()?;
        board_io::write_rows(writer, cells, ncols).map_err(|e| LifeError::io(&self.path, e))
    }

    fn end(&mut self) -> Result<()> {
        let mut writer = match self.writer.take() {
            Some(writer) => writer,
            None => return Ok(()),
        };
        board_io::write_separator(&mut writer)
            .and_then(|()| writer.flush())
            .map_err(|e| LifeError::io(&self.path, e))
    }
}

/// Keeps every displayed board in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub frames: Vec<(Frame, Vec<Cell>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last board displayed, if any.
    pub fn last(&self) -> Option<&[Cell]> {
        self.frames.last().map(|(_, cells)| cells.as_slice())
    }
}

impl BoardSink for MemorySink {
    fn begin(&mut self, frame: &Frame) -> Result<()> {
        self.frames.push((*frame, Vec::new()));
        Ok(())
    }

    fn rows(&mut self, cells: &[Cell]) -> Result<()> {
        if let Some((_, board)) = self.frames.last_mut() {
            board.extend_from_slice(cells);
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl BoardSink for NullSink {
    fn begin(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }

    fn rows(&mut self, _cells: &[Cell]) -> Result<()> {
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

//! Grid Store: the dense, double-buffered board of a single process run.

use crate::board_io;
use crate::error::{LifeError, Result};
use crate::rules::{Cell, ALIVE, DEAD};
use crate::utils::UniformRng;

/// Allocate a zeroed cell buffer, reporting failure instead of aborting.
pub(crate) fn alloc_cells(len: usize) -> Result<Vec<Cell>> {
    let mut cells = Vec::new();
    cells
        .try_reserve_exact(len)
        .map_err(|_| LifeError::Allocation { cells: len })?;
    cells.resize(len, DEAD);
    Ok(cells)
}

/// The current and next generation of an `nrows x ncols` toroidal board,
/// each stored as one contiguous row-major buffer.
#[derive(Debug, Clone)]
pub struct Grid {
    nrows: usize,
    ncols: usize,
    pub(crate) current: Vec<Cell>,
    pub(crate) next: Vec<Cell>,
}

impl Grid {
    /// Allocate both buffers, every cell DEAD.
    pub fn allocate(nrows: usize, ncols: usize) -> Result<Self> {
        if nrows == 0 || ncols == 0 {
            return Err(LifeError::config(format!(
                "board dimensions must be > 0, got {nrows}x{ncols}"
            )));
        }
        let len = nrows
            .checked_mul(ncols)
            .ok_or(LifeError::Allocation { cells: usize::MAX })?;

        Ok(Self {
            nrows,
            ncols,
            current: alloc_cells(len)?,
            next: alloc_cells(len)?,
        })
    }

    /// Build a grid whose current generation is `cells`.
    pub fn from_cells(nrows: usize, ncols: usize, cells: &[Cell]) -> Result<Self> {
        let mut grid = Self::allocate(nrows, ncols)?;
        if cells.len() != grid.current.len() {
            return Err(LifeError::format(format!(
                "{} cells do not fill a {nrows}x{ncols} board",
                cells.len()
            )));
        }
        grid.current.copy_from_slice(cells);
        Ok(grid)
    }

    pub const fn nrows(&self) -> usize {
        self.nrows
    }

    pub const fn ncols(&self) -> usize {
        self.ncols
    }

    /// Current generation, row-major.
    pub fn cells(&self) -> &[Cell] {
        &self.current
    }

    pub fn row(&self, r: usize) -> &[Cell] {
        &self.current[r * self.ncols..(r + 1) * self.ncols]
    }

    pub fn get(&self, r: usize, c: usize) -> Cell {
        self.current[r * self.ncols + c]
    }

    pub fn set(&mut self, r: usize, c: usize, cell: Cell) {
        self.current[r * self.ncols + c] = cell;
    }

    /// Number of ALIVE cells in the current generation.
    pub fn population(&self) -> usize {
        self.current.iter().filter(|&&c| c == ALIVE).count()
    }

    /// Set every cell of both buffers to DEAD.
    pub fn fill_dead(&mut self) {
        self.current.fill(DEAD);
        self.next.fill(DEAD);
    }

    /// Seed the board randomly: cells are visited in row-major order and each
    /// one takes exactly one draw, ALIVE iff the draw is below `prob`.
    ///
    /// The chunked fill replays this exact order, so the order must not change.
    pub fn fill_random(&mut self, seed: u64, prob: f64) {
        let mut rng = UniformRng::new(seed);
        for cell in self.current.iter_mut() {
            *cell = if rng.next_f64() < prob { ALIVE } else { DEAD };
        }
    }

    /// Load the board from text rows: `X` at column `j` of line `i` marks
    /// cell `(i, j)` ALIVE.
    pub fn fill_from_lines(&mut self, lines: &[String]) -> Result<()> {
        board_io::check_shape(lines, self.nrows, self.ncols)?;
        for (line, row) in lines.iter().zip(self.current.chunks_mut(self.ncols)) {
            board_io::decode_row(line, row);
        }
        Ok(())
    }

    /// Exchange the current and next buffers.
    pub(crate) fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }
}

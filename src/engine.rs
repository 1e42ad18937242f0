//! Single-process evolution engine.
//!
//! Every generation is computed from the current buffer only, written into the
//! next buffer, and then the two buffers trade places.

use std::convert::Infallible;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::board_io::InputBoard;
use crate::config::LifeConfig;
use crate::error::Result;
use crate::grid::Grid;
use crate::rules::{evolve_row, wrap_next, wrap_prev, Cell};
use crate::utils::elapsed_ms;

/// Timings of a finished run, consumed by the log file writer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub timesteps: usize,
    /// Wall-clock duration of every generation, in ms.
    pub generation_ms: Vec<f64>,
}

impl RunReport {
    /// Total time spent evolving, in ms.
    pub fn cumulative_ms(&self) -> f64 {
        self.generation_ms.iter().sum()
    }
}

/// Where the engine stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ready,
    Evolving { step: usize },
    Done,
}

/// Evolve a whole toroidal board from `current` into `next`.
///
/// With `parallel` the rows are spread over the current rayon pool; every
/// output row is written by exactly one task and nothing reads `next`.
pub fn evolve(current: &[Cell], next: &mut [Cell], nrows: usize, ncols: usize, parallel: bool) {
    let evolve_one = |r: usize, out: &mut [Cell]| {
        evolve_row(
            row_of(current, wrap_prev(r, nrows), ncols),
            row_of(current, r, ncols),
            row_of(current, wrap_next(r, nrows), ncols),
            out,
        );
    };

    if parallel {
        next.par_chunks_mut(ncols)
            .enumerate()
            .for_each(|(r, out)| evolve_one(r, out));
    } else {
        for (r, out) in next.chunks_mut(ncols).enumerate() {
            evolve_one(r, out);
        }
    }
}

/// Owns the grid for the whole run.
pub struct Engine {
    grid: Grid,
    parallel: bool,
    phase: Phase,
}

impl Engine {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            parallel: false,
            phase: Phase::Ready,
        }
    }

    /// Build the initial board from `config`: the input file when one is
    /// given and well formed, a seeded random fill otherwise.
    ///
    /// A missing or malformed input file is not fatal here: the run warns and
    /// falls back to the configured dimensions with a random board.
    pub fn initialize(config: &LifeConfig) -> Result<Self> {
        let grid = match &config.input_path {
            Some(path) => match grid_from_file(path) {
                Ok(grid) => grid,
                Err(e) if e.is_recoverable_in_single_process() => {
                    warn!(
                        input = %path.display(),
                        error = %e,
                        "Launching the simulation in default configuration"
                    );
                    random_grid(config)?
                }
                Err(e) => return Err(e),
            },
            None => random_grid(config)?,
        };

        debug!(
            nrows = grid.nrows(),
            ncols = grid.ncols(),
            population = grid.population(),
            "Grid initialized"
        );
        Ok(Self::new(grid))
    }

    /// Spread each generation over the rayon pool.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Compute one generation and swap buffers.
    pub fn step(&mut self) {
        let (nrows, ncols) = (self.grid.nrows(), self.grid.ncols());
        evolve(&self.grid.current, &mut self.grid.next, nrows, ncols, self.parallel);
        self.grid.swap();
    }

    /// Run `timesteps` generations in order.
    pub fn run(&mut self, timesteps: usize) -> RunReport {
        match self.run_with(timesteps, |_, _| Ok::<(), Infallible>(())) {
            Ok(report) => report,
            Err(never) => match never {},
        }
    }

    /// Run `timesteps` generations, handing the board to `observer` after
    /// each one (generation index, freshly computed grid).
    ///
    /// The observer is the display hook; its failure stops the run.
    pub fn run_with<F, E>(
        &mut self,
        timesteps: usize,
        mut observer: F,
    ) -> std::result::Result<RunReport, E>
    where
        F: FnMut(usize, &Grid) -> std::result::Result<(), E>,
    {
        let mut report = RunReport {
            timesteps,
            generation_ms: Vec::with_capacity(timesteps),
        };

        for t in 0..timesteps {
            self.phase = Phase::Evolving { step: t };

            let gstart = Instant::now();
            self.step();
            let gend = Instant::now();

            let cur_gene_time = elapsed_ms(gstart, gend);
            report.generation_ms.push(cur_gene_time);
            debug!(generation = t, ms = cur_gene_time, "Generation evolved");
            trace!(generation = t, population = self.grid.population(), "Grid status");

            observer(t, &self.grid)?;
        }

        self.phase = Phase::Done;
        info!(
            timesteps,
            ms = report.cumulative_ms(),
            "Evolved the grid"
        );
        Ok(report)
    }
}

fn row_of(cells: &[Cell], r: usize, ncols: usize) -> &[Cell] {
    &cells[r * ncols..(r + 1) * ncols]
}

fn grid_from_file(path: &std::path::Path) -> Result<Grid> {
    let input = InputBoard::open(path)?;
    let mut grid = Grid::allocate(input.nrows, input.ncols)?;
    grid.fill_from_lines(&input.lines)?;
    Ok(grid)
}

fn random_grid(config: &LifeConfig) -> Result<Grid> {
    let mut grid = Grid::allocate(config.nrows, config.ncols)?;
    grid.fill_random(config.seed, config.init_prob);
    Ok(grid)
}

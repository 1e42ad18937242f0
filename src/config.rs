//! Run configuration handed to the engines.
//!
//! Command-line parsing lives in the binary; this module only defines the
//! plain structure the engines consume, its defaults and its validation.

use std::fmt;
use std::path::PathBuf;

use crate::error::{LifeError, Result};

pub const DEFAULT_TIMESTEPS: usize = 100;
pub const DEFAULT_SIZE_ROWS: usize = 50;
pub const DEFAULT_SIZE_COLS: usize = 50;
pub const DEFAULT_INIT_PROB: f64 = 0.5;
pub const DEFAULT_SEED: u64 = 1;

/// Above this many cells the board is not drawn on the console at every
/// generation; it is written to the output file instead.
pub const DEFAULT_MAX_SIZE: usize = DEFAULT_SIZE_ROWS * DEFAULT_SIZE_COLS;

pub const DEFAULT_NUM_THREADS: usize = 4;
/// 4 threads x 64 cores per processor.
pub const DEFAULT_MAX_THREADS: usize = 256;

/// How the evolution is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// One process, one thread.
    Serial,
    /// One process, each generation split across a rayon thread pool.
    Threads,
    /// `workers` ranks inside this process, one thread each, exchanging ghost
    /// rows over channels.
    LocalRing { workers: usize },
    /// One rank per MPI process (`mpirun -n N gol ...`).
    Mpi,
}

impl Backend {
    /// Whether the board is split into chunks.
    pub const fn is_distributed(self) -> bool {
        matches!(self, Self::LocalRing { .. } | Self::Mpi)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Threads => write!(f, "threads"),
            Self::LocalRing { workers } => write!(f, "local ring ({workers} workers)"),
            Self::Mpi => write!(f, "mpi"),
        }
    }
}

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct LifeConfig {
    pub nrows: usize,
    pub ncols: usize,
    pub timesteps: usize,
    /// Probability for a cell to start ALIVE under random initialization.
    pub init_prob: f64,
    /// Random seed; `0` must be resolved by the caller (see [`resolve_seed`]).
    pub seed: u64,
    /// Board file to start from instead of a random fill.
    pub input_path: Option<PathBuf>,
    pub output_path: PathBuf,
    pub backend: Backend,
    /// Threads per process (or per rank) for the cell loop. `None` keeps the
    /// loop sequential unless the backend is [`Backend::Threads`].
    pub threads: Option<usize>,
    /// Directory of the timing log; `None` disables the log file.
    pub log_dir: Option<PathBuf>,
    pub max_display_size: usize,
}

impl Default for LifeConfig {
    fn default() -> Self {
        let backend = Backend::Serial;
        Self {
            nrows: DEFAULT_SIZE_ROWS,
            ncols: DEFAULT_SIZE_COLS,
            timesteps: DEFAULT_TIMESTEPS,
            init_prob: DEFAULT_INIT_PROB,
            seed: DEFAULT_SEED,
            input_path: None,
            output_path: PathBuf::from(default_out_file(backend, None)),
            backend,
            threads: None,
            log_dir: None,
            max_display_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl LifeConfig {
    /// Reject settings no engine can run with.
    pub fn validate(&self) -> Result<()> {
        if self.nrows == 0 || self.ncols == 0 {
            return Err(LifeError::config(format!(
                "board dimensions must be > 0, got {}x{}",
                self.nrows, self.ncols
            )));
        }
        if !(0.0..=1.0).contains(&self.init_prob) {
            return Err(LifeError::config(format!(
                "init_prob must be within [0, 1], got {}",
                self.init_prob
            )));
        }
        if self.seed == 0 {
            return Err(LifeError::config(
                "seed 0 must be replaced by a time-derived seed before the run",
            ));
        }
        if self.threads == Some(0) {
            return Err(LifeError::config("the number of threads must be > 0"));
        }
        // Rows per worker are checked once the board size is final, since an
        // input header overrides `nrows`.
        if self.backend == (Backend::LocalRing { workers: 0 }) {
            return Err(LifeError::config("the number of workers must be > 0"));
        }
        Ok(())
    }

    /// Threads to use for the cell loop, capped at [`DEFAULT_MAX_THREADS`].
    pub fn effective_threads(&self) -> Option<usize> {
        match (self.backend, self.threads) {
            (_, Some(n)) => Some(n.min(DEFAULT_MAX_THREADS)),
            (Backend::Threads, None) => Some(DEFAULT_NUM_THREADS),
            _ => None,
        }
    }
}

/// Whether an `nrows x ncols` board is too large to be drawn on the console.
/// A cell count that does not even fit in a `usize` is big.
pub fn is_big(nrows: usize, ncols: usize, max_display_size: usize) -> bool {
    nrows
        .checked_mul(ncols)
        .map_or(true, |cells| cells > max_display_size)
}

/// A partition needs at least one row per worker.
pub fn check_workers(nrows: usize, workers: usize) -> Result<()> {
    if workers == 0 || workers > nrows {
        return Err(LifeError::Partition { nrows, workers });
    }
    Ok(())
}

/// Replace the `0` seed with one derived from the wall clock.
pub fn resolve_seed(seed: u64) -> u64 {
    if seed != 0 {
        return seed;
    }
    // 32-bit unix time, never the reserved 0.
    u64::from(chrono::Utc::now().timestamp() as u32).max(1)
}

/// Output file name for a backend (and an optional cell-loop thread count).
pub fn default_out_file(backend: Backend, threads: Option<usize>) -> &'static str {
    match (backend.is_distributed(), threads.is_some() || backend == Backend::Threads) {
        (true, true) => "GoL_hybrid.out",
        (true, false) => "GoL_mpi.out",
        (false, true) => "GoL_omp.out",
        (false, false) => "GoL.out",
    }
}

/// Log directory for a backend, same naming scheme as [`default_out_file`].
pub fn default_logs_dir(backend: Backend, threads: Option<usize>) -> &'static str {
    match (backend.is_distributed(), threads.is_some() || backend == Backend::Threads) {
        (true, true) => "logs_hybrid",
        (true, false) => "logs_mpi",
        (false, true) => "logs_omp",
        (false, false) => "logs",
    }
}

//! Error taxonomy shared by the grid store, the engines and the transports.

use std::path::PathBuf;

/// Every failure the simulation can run into.
///
/// Whether a variant is fatal depends on the mode: a malformed input file is
/// recovered from in a single process run (random initialization takes over),
/// but aborts the whole cohort in a distributed run.
#[derive(Debug, thiserror::Error)]
pub enum LifeError {
    /// A board or chunk buffer could not be allocated.
    #[error("failed to allocate a buffer of {cells} cells")]
    Allocation {
        /// Number of cells that were requested.
        cells: usize,
    },

    /// The input board does not respect the file format.
    #[error("malformed board: {message}")]
    Format {
        /// What was wrong with the input.
        message: String,
    },

    /// A send or receive between two ranks failed.
    #[error("transport failure on rank {rank}: {message}")]
    Transport {
        /// Rank that observed the failure.
        rank: usize,
        /// Description of the failure.
        message: String,
    },

    /// Another rank aborted the cohort while this one was blocked.
    #[error("rank {rank} stopped: the cohort was aborted")]
    Aborted {
        /// Rank that observed the abort.
        rank: usize,
    },

    /// Opening, reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File the operation was about.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The run configuration is not usable.
    #[error("invalid configuration: {message}")]
    Config {
        /// Which setting is wrong and why.
        message: String,
    },

    /// The board cannot be split across the requested number of workers.
    #[error("cannot split {nrows} rows across {workers} workers")]
    Partition {
        /// Global number of rows.
        nrows: usize,
        /// Requested number of workers.
        workers: usize,
    },
}

impl LifeError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn transport(rank: usize, message: impl Into<String>) -> Self {
        Self::Transport {
            rank,
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when a single process run may warn and carry on with a random
    /// board instead of stopping: bad input contents, or an input file that
    /// cannot be read at all.
    pub const fn is_recoverable_in_single_process(&self) -> bool {
        matches!(self, Self::Format { .. } | Self::Io { .. })
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, LifeError>;

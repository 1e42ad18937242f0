//! Row-band partitioning of the global board.
//!
//! Every rank gets `nrows / workers` consecutive rows; the remainder (the
//! displacement) goes to the last rank. All ranks compute the same bounds
//! from the same inputs, so nobody has to agree on ownership at run time.

use crate::config::check_workers;
use crate::error::Result;
use crate::rules::{wrap_next, wrap_prev};

/// Global rows owned by one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub rank: usize,
    pub workers: usize,
    /// First owned global row.
    pub from: usize,
    /// Last owned global row, inclusive.
    pub to: usize,
    /// Number of owned rows (`to - from + 1`).
    pub nrows: usize,
    /// Leftover rows assigned to the last rank.
    pub displacement: usize,
    pub global_nrows: usize,
}

impl Bounds {
    /// Whether `row` is one of the rank's own rows.
    pub const fn owns(&self, row: usize) -> bool {
        self.from <= row && row <= self.to
    }

    /// Global row mirrored in the top ghost slot.
    pub const fn top_ghost(&self) -> usize {
        wrap_prev(self.from, self.global_nrows)
    }

    /// Global row mirrored in the bottom ghost slot.
    pub const fn bottom_ghost(&self) -> usize {
        wrap_next(self.to, self.global_nrows)
    }

    /// Largest number of rows any rank owns (the last rank's count).
    pub const fn max_rows(&self) -> usize {
        self.global_nrows / self.workers + self.displacement
    }

    /// Ring neighbour above (previous rank).
    pub const fn prev_rank(&self) -> usize {
        (self.rank + self.workers - 1) % self.workers
    }

    /// Ring neighbour below (next rank).
    pub const fn next_rank(&self) -> usize {
        (self.rank + 1) % self.workers
    }
}

/// Rows owned by `rank` out of `workers` for a board of `global_nrows` rows.
pub fn compute_bounds(global_nrows: usize, workers: usize, rank: usize) -> Result<Bounds> {
    check_workers(global_nrows, workers)?;
    if rank >= workers {
        return Err(crate::error::LifeError::config(format!(
            "rank {rank} is out of range for {workers} workers"
        )));
    }

    let rows_per_worker = global_nrows / workers;
    let displacement = global_nrows % workers;
    let from = rank * rows_per_worker;

    // Last process will keep all remaining rows.
    let to = if rank == workers - 1 {
        global_nrows - 1
    } else {
        (rank + 1) * rows_per_worker - 1
    };

    Ok(Bounds {
        rank,
        workers,
        from,
        to,
        nrows: to - from + 1,
        displacement,
        global_nrows,
    })
}

/// Rank that owns global `row`.
pub fn owner_of(row: usize, global_nrows: usize, workers: usize) -> usize {
    let rows_per_worker = global_nrows / workers;
    (row / rows_per_worker).min(workers - 1)
}

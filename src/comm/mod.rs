//! Message passing between ranks.
//!
//! The ghost exchange and the gather only need point-to-point sends and
//! receives addressed by rank, a barrier, and a way to take the whole cohort
//! down. [`Communicator`] is that contract; [`local::LocalComm`] implements it
//! with threads and channels, [`mpi::MpiComm`] (feature `mpi`) with MPI.

pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi;

use crate::error::Result;
use crate::rules::Cell;

/// Message tags, so that concurrent streams between the same pair of ranks
/// cannot be confused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// First own row travelling to the previous rank's bottom ghost.
    Top,
    /// Last own row travelling to the next rank's top ghost.
    Bottom,
    /// Own rows travelling to rank 0 for display.
    Print,
    /// Barrier arrival / release.
    Barrier,
}

impl Tag {
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Top => 0,
            Self::Bottom => 1,
            Self::Print => 2,
            Self::Barrier => 3,
        }
    }
}

/// Blocking point-to-point communication within a fixed cohort of ranks.
///
/// Every operation either completes or fails; a failure is fatal for the
/// whole cohort and callers are expected to [`Communicator::abort`].
pub trait Communicator {
    /// This rank, `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks in the cohort.
    fn size(&self) -> usize;

    /// Block until every rank has arrived.
    fn barrier(&self) -> Result<()>;

    /// Send `send` to `dest` while receiving a message from `source` into
    /// `recv`. Returns once both have completed.
    fn send_receive(
        &self,
        send: &[Cell],
        dest: usize,
        recv: &mut [Cell],
        source: usize,
        tag: Tag,
    ) -> Result<()>;

    fn send(&self, data: &[Cell], dest: usize, tag: Tag) -> Result<()>;

    /// Receive a message of at most `recv.len()` cells from `source`;
    /// returns how many cells arrived.
    fn receive(&self, recv: &mut [Cell], source: usize, tag: Tag) -> Result<usize>;

    /// Take every rank down after a fatal error.
    fn abort(&self, code: i32);
}

//! MPI transport (rsmpi). One rank per process, launched by `mpirun`.
//!
//! rsmpi runs with `MPI_ERRORS_ARE_FATAL`, so a failed call never returns;
//! the `Result`s here only carry the checks done on our side.

use std::process;

use mpi::topology::{Rank, SystemCommunicator};
use mpi::traits::Communicator as _;
use mpi::traits::*;

use super::{Communicator, Tag};
use crate::error::{LifeError, Result};
use crate::rules::Cell;

pub struct MpiComm {
    world: SystemCommunicator,
}

impl MpiComm {
    pub fn new(world: SystemCommunicator) -> Self {
        Self { world }
    }

    fn peer(&self, rank: usize) -> Result<Rank> {
        if rank >= self.size() {
            return Err(LifeError::transport(
                self.rank(),
                format!("rank {rank} is outside a world of {}", self.size()),
            ));
        }
        Rank::try_from(rank).map_err(|_| LifeError::transport(self.rank(), "rank overflows i32"))
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn barrier(&self) -> Result<()> {
        self.world.barrier();
        Ok(())
    }

    fn send_receive(
        &self,
        send: &[Cell],
        dest: usize,
        recv: &mut [Cell],
        source: usize,
        tag: Tag,
    ) -> Result<()> {
        let dest = self.world.process_at_rank(self.peer(dest)?);
        let source = self.world.process_at_rank(self.peer(source)?);
        let tag = tag.as_i32();

        // Post the send first so that every rank of the ring can sit in its
        // receive without deadlocking.
        let status = mpi::request::scope(|scope| {
            let request = dest.immediate_send_with_tag(scope, send, tag);
            let status = source.receive_into_with_tag(recv, tag);
            request.wait_without_status();
            status
        });

        let n = status.count(Cell::equivalent_datatype()) as usize;
        if n != recv.len() {
            return Err(LifeError::transport(
                self.rank(),
                format!("expected {} cells, got {n}", recv.len()),
            ));
        }
        Ok(())
    }

    fn send(&self, data: &[Cell], dest: usize, tag: Tag) -> Result<()> {
        self.world
            .process_at_rank(self.peer(dest)?)
            .send_with_tag(data, tag.as_i32());
        Ok(())
    }

    fn receive(&self, recv: &mut [Cell], source: usize, tag: Tag) -> Result<usize> {
        let status = self
            .world
            .process_at_rank(self.peer(source)?)
            .receive_into_with_tag(recv, tag.as_i32());
        Ok(status.count(Cell::equivalent_datatype()) as usize)
    }

    /// Aborting one process tears down the whole MPI job.
    fn abort(&self, code: i32) {
        tracing::error!(rank = self.rank(), code, "Aborting the MPI job");
        process::abort();
    }
}

//! In-process transport: every rank is an OS thread with an inbox.
//!
//! Sends never block (unbounded channels), receives block until a message
//! with the wanted source and tag arrives. Messages that arrive early for a
//! different (source, tag) pair are parked until someone asks for them.
//! A rank that fails raises the shared abort flag; every rank blocked in a
//! receive notices it and bails out with [`LifeError::Aborted`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use super::{Communicator, Tag};
use crate::error::{LifeError, Result};
use crate::rules::Cell;

/// How often a blocked receive checks the abort flag.
const ABORT_POLL: Duration = Duration::from_millis(20);

struct Envelope {
    source: usize,
    tag: Tag,
    payload: Vec<Cell>,
}

/// One rank's end of the in-process cohort.
pub struct LocalComm {
    rank: usize,
    size: usize,
    inbox: Receiver<Envelope>,
    peers: Vec<Sender<Envelope>>,
    parked: RefCell<VecDeque<Envelope>>,
    aborted: Arc<AtomicBool>,
}

impl LocalComm {
    /// Wire up `size` ranks, each able to reach every other one.
    pub fn cohort(size: usize) -> Vec<Self> {
        let aborted = Arc::new(AtomicBool::new(false));
        let (senders, inboxes): (Vec<_>, Vec<_>) = (0..size).map(|_| mpsc::channel()).unzip();

        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| Self {
                rank,
                size,
                inbox,
                peers: senders.clone(),
                parked: RefCell::new(VecDeque::new()),
                aborted: Arc::clone(&aborted),
            })
            .collect()
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn check_rank(&self, peer: usize) -> Result<()> {
        if peer >= self.size {
            return Err(LifeError::transport(
                self.rank,
                format!("rank {peer} is outside a cohort of {}", self.size),
            ));
        }
        Ok(())
    }

    fn take_parked(&self, source: usize, tag: Tag) -> Option<Envelope> {
        let mut parked = self.parked.borrow_mut();
        let pos = parked.iter().position(|e| e.source == source && e.tag == tag)?;
        parked.remove(pos)
    }

    fn wait_for(&self, source: usize, tag: Tag) -> Result<Envelope> {
        if let Some(envelope) = self.take_parked(source, tag) {
            return Ok(envelope);
        }
        loop {
            match self.inbox.recv_timeout(ABORT_POLL) {
                Ok(envelope) if envelope.source == source && envelope.tag == tag => {
                    return Ok(envelope);
                }
                Ok(envelope) => self.parked.borrow_mut().push_back(envelope),
                Err(RecvTimeoutError::Timeout) => {
                    if self.is_aborted() {
                        return Err(LifeError::Aborted { rank: self.rank });
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(LifeError::transport(self.rank, "inbox disconnected"));
                }
            }
        }
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    /// Every rank reports to rank 0, which releases them all once the last
    /// one has arrived.
    fn barrier(&self) -> Result<()> {
        if self.rank == 0 {
            for r in 1..self.size {
                self.wait_for(r, Tag::Barrier)?;
            }
            for r in 1..self.size {
                self.send(&[], r, Tag::Barrier)?;
            }
        } else {
            self.send(&[], 0, Tag::Barrier)?;
            self.wait_for(0, Tag::Barrier)?;
        }
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
        // Sends are buffered, so sending first cannot deadlock the ring.
        self.send(send, dest, tag)?;
        let n = self.receive(recv, source, tag)?;
        if n != recv.len() {
            return Err(LifeError::transport(
                self.rank,
                format!("expected {} cells from rank {source}, got {n}", recv.len()),
            ));
        }
        Ok(())
    }

    fn send(&self, data: &[Cell], dest: usize, tag: Tag) -> Result<()> {
        self.check_rank(dest)?;
        if self.is_aborted() {
            return Err(LifeError::Aborted { rank: self.rank });
        }
        let envelope = Envelope {
            source: self.rank,
            tag,
            payload: data.to_vec(),
        };
        // A failed rank raises the flag before hanging up its inbox.
        self.peers[dest].send(envelope).map_err(|_| {
            if self.is_aborted() {
                LifeError::Aborted { rank: self.rank }
            } else {
                LifeError::transport(self.rank, format!("rank {dest} is gone"))
            }
        })
    }

    fn receive(&self, recv: &mut [Cell], source: usize, tag: Tag) -> Result<usize> {
        self.check_rank(source)?;
        let envelope = self.wait_for(source, tag)?;
        let n = envelope.payload.len();
        if n > recv.len() {
            return Err(LifeError::transport(
                self.rank,
                format!(
                    "message of {n} cells from rank {source} overflows a {}-cell buffer",
                    recv.len()
                ),
            ));
        }
        recv[..n].copy_from_slice(&envelope.payload);
        Ok(n)
    }

    fn abort(&self, code: i32) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            error!(rank = self.rank, code, "Aborting every rank");
        }
    }
}

/// Raises the abort flag if the owning rank's thread unwinds.
struct AbortOnPanic<'a>(&'a LocalComm);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort(1);
        }
    }
}

/// Run `body` on `size` ranks, one thread each, and collect their results in
/// rank order.
///
/// As soon as one rank fails, the whole cohort is aborted. The error returned
/// is the one that caused the abort rather than the follow-up
/// [`LifeError::Aborted`] reports of the other ranks.
pub fn spawn_ring<T, F>(size: usize, body: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&LocalComm) -> Result<T> + Sync,
{
    let comms = LocalComm::cohort(size);
    let body = &body;

    let results: Vec<Result<T>> = thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let rank = comm.rank;
                let handle = thread::Builder::new()
                    .name(format!("rank-{rank}"))
                    .spawn_scoped(scope, move || {
                        let _guard = AbortOnPanic(&comm);
                        let result = body(&comm);
                        if let Err(e) = &result {
                            debug!(rank, error = %e, "Rank failed");
                            comm.abort(1);
                        }
                        result
                    });
                (rank, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(rank, handle)| match handle {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|_| Err(LifeError::transport(rank, "rank panicked"))),
                Err(e) => Err(LifeError::transport(rank, format!("failed to spawn: {e}"))),
            })
            .collect()
    });

    let mut values = Vec::with_capacity(size);
    let mut first_aborted = None;
    let mut root_cause = None;
    for result in results {
        match result {
            Ok(v) => values.push(v),
            Err(e @ LifeError::Aborted { .. }) => {
                first_aborted.get_or_insert(e);
            }
            Err(e) => {
                root_cause.get_or_insert(e);
            }
        }
    }

    match root_cause.or(first_aborted) {
        Some(e) => Err(e),
        None => Ok(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_shift() {
        let received = spawn_ring(4, |comm| {
            let next = (comm.rank() + 1) % comm.size();
            let prev = (comm.rank() + comm.size() - 1) % comm.size();
            let mut buf = [0u8; 2];
            comm.send_receive(&[comm.rank() as u8; 2], next, &mut buf, prev, Tag::Top)?;
            Ok(buf[0])
        })
        .unwrap();
        assert_eq!(received, vec![3, 0, 1, 2]);
    }

    #[test]
    fn messages_are_matched_by_source_and_tag() {
        let got = spawn_ring(3, |comm| {
            if comm.rank() == 0 {
                let mut a = [0u8; 1];
                let mut b = [0u8; 1];
                let mut c = [0u8; 1];
                // Ask in the opposite order of arrival.
                comm.receive(&mut a, 2, Tag::Print)?;
                comm.receive(&mut b, 1, Tag::Bottom)?;
                comm.receive(&mut c, 1, Tag::Print)?;
                Ok(vec![a[0], b[0], c[0]])
            } else {
                let r = comm.rank() as u8;
                comm.send(&[r * 10], 0, Tag::Print)?;
                if comm.rank() == 1 {
                    comm.send(&[r * 10 + 1], 0, Tag::Bottom)?;
                }
                Ok(Vec::new())
            }
        })
        .unwrap();
        assert_eq!(got[0], vec![20, 11, 10]);
    }

    #[test]
    fn barrier_with_single_rank() {
        assert!(spawn_ring(1, |comm| comm.barrier()).is_ok());
    }

    #[test]
    fn a_failing_rank_releases_the_others() {
        let err = spawn_ring(3, |comm| {
            if comm.rank() == 1 {
                return Err(LifeError::transport(1, "link down"));
            }
            // Would wait forever without the abort.
            comm.barrier()
        })
        .unwrap_err();
        assert!(matches!(err, LifeError::Transport { rank: 1, .. }));
    }

    #[test]
    fn oversized_messages_are_transport_errors() {
        let err = spawn_ring(2, |comm| {
            if comm.rank() == 0 {
                let mut small = [0u8; 1];
                comm.receive(&mut small, 1, Tag::Print).map(|_| ())
            } else {
                comm.send(&[1, 2, 3], 0, Tag::Print)
            }
        })
        .unwrap_err();
        assert!(matches!(err, LifeError::Transport { rank: 0, .. }));
    }
}

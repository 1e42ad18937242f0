//! Distributed evolution engine.
//!
//! Every rank owns a [`Chunk`] and, per generation, evolves its own rows and
//! then trades boundary rows with its two ring neighbours:
//!
//! 1. own row 1 goes to the previous rank while the next rank's row 1 lands
//!    in the bottom ghost;
//! 2. own row `nrows` goes to the next rank while the previous rank's last
//!    row lands in the top ghost.
//!
//! Both exchanges complete before the next generation starts. Displayed
//! boards are gathered on rank 0 in increasing rank order.

use std::sync::Mutex;
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::board_io::InputBoard;
use crate::chunk::Chunk;
use crate::comm::local::spawn_ring;
use crate::comm::{Communicator, Tag};
use crate::config::LifeConfig;
use crate::display::{BoardSink, DisplayPolicy, Frame};
use crate::engine::RunReport;
use crate::error::{LifeError, Result};
use crate::grid::alloc_cells;
use crate::partition::compute_bounds;
use crate::utils::elapsed_ms;

/// Where a worker stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Ready,
    Evolve { generation: usize },
    ExchangeGhosts { generation: usize },
    Gather,
    Done,
}

/// Read the input file named by `config`, if any.
///
/// Unlike a single process run there is no fallback: ranks that disagree on
/// the board would corrupt each other, so any problem is fatal.
pub fn load_input(config: &LifeConfig) -> Result<Option<InputBoard>> {
    config
        .input_path
        .as_deref()
        .map(InputBoard::open)
        .transpose()
}

/// Board dimensions: the input header when there is one, the configured
/// ones otherwise.
pub fn board_shape(config: &LifeConfig, input: Option<&InputBoard>) -> (usize, usize) {
    input.map_or((config.nrows, config.ncols), |board| (board.nrows, board.ncols))
}

/// One rank of a distributed run.
pub struct Worker<'c, C: Communicator + ?Sized> {
    comm: &'c C,
    chunk: Chunk,
    parallel: bool,
    phase: WorkerPhase,
}

impl<'c, C: Communicator + ?Sized> Worker<'c, C> {
    /// Wrap a chunk that was laid out for this rank of this cohort.
    pub fn new(comm: &'c C, chunk: Chunk) -> Result<Self> {
        if chunk.rank() != comm.rank() || chunk.workers() != comm.size() {
            return Err(LifeError::config(format!(
                "chunk of rank {}/{} handed to rank {}/{}",
                chunk.rank(),
                chunk.workers(),
                comm.rank(),
                comm.size()
            )));
        }
        Ok(Self {
            comm,
            chunk,
            parallel: false,
            phase: WorkerPhase::Ready,
        })
    }

    /// Lay out this rank's chunk and fill it from `input`, or randomly from
    /// the configured seed when there is no input.
    pub fn initialize(
        comm: &'c C,
        config: &LifeConfig,
        input: Option<&InputBoard>,
    ) -> Result<Self> {
        let (nrows, ncols) = board_shape(config, input);
        let bounds = compute_bounds(nrows, comm.size(), comm.rank())?;
        debug!(
            rank = bounds.rank,
            from = bounds.from,
            to = bounds.to,
            nrows = bounds.nrows,
            "Chunk bounds"
        );

        let mut chunk = Chunk::allocate(bounds, ncols)?;
        match input {
            Some(board) => chunk.fill_from_lines(&board.lines)?,
            None => chunk.fill_random(config.seed, config.init_prob),
        }
        Self::new(comm, chunk)
    }

    /// Spread the cell loop of each generation over the rayon pool.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub const fn phase(&self) -> WorkerPhase {
        self.phase
    }

    /// Refresh both ghost rows from the ring neighbours.
    pub fn exchange_ghosts(&mut self) -> Result<()> {
        let bounds = *self.chunk.bounds();
        let (prev, next) = (bounds.prev_rank(), bounds.next_rank());

        let (send, recv) = self.chunk.first_row_and_bottom_ghost();
        self.comm.send_receive(send, prev, recv, next, Tag::Top)?;

        let (send, recv) = self.chunk.last_row_and_top_ghost();
        self.comm.send_receive(send, next, recv, prev, Tag::Bottom)?;
        Ok(())
    }

    /// Evolve one generation and exchange ghosts. Returns the time spent,
    /// measured between two cohort-wide barriers.
    pub fn step(&mut self, generation: usize) -> Result<f64> {
        self.comm.barrier()?;
        let gstart = Instant::now();

        self.phase = WorkerPhase::Evolve { generation };
        self.chunk.evolve(self.parallel);

        self.phase = WorkerPhase::ExchangeGhosts { generation };
        self.exchange_ghosts()?;

        let gend = Instant::now();
        self.comm.barrier()?;
        Ok(elapsed_ms(gstart, gend))
    }

    /// Collect the whole board on rank 0 and stream it into `sink`.
    ///
    /// Rank 0 writes its own rows first, then receives every other rank's
    /// rows in rank order into a buffer sized for the largest chunk. The
    /// other ranks only send; their `sink` is never touched.
    pub fn gather<S: BoardSink + ?Sized>(
        &mut self,
        sink: &mut S,
        generation: Option<usize>,
    ) -> Result<()> {
        self.phase = WorkerPhase::Gather;
        let bounds = *self.chunk.bounds();

        if self.comm.rank() != 0 {
            return self.comm.send(self.chunk.own_rows(), 0, Tag::Print);
        }

        let ncols = self.chunk.ncols();
        sink.begin(&Frame {
            generation,
            nrows: bounds.global_nrows,
            ncols,
        })?;
        sink.rows(self.chunk.own_rows())?;

        let cells = bounds
            .max_rows()
            .checked_mul(ncols)
            .ok_or(LifeError::Allocation { cells: usize::MAX })?;
        let mut buffer = alloc_cells(cells)?;
        for rank in 1..bounds.workers {
            let rows = compute_bounds(bounds.global_nrows, bounds.workers, rank)?.nrows;
            let received = self.comm.receive(&mut buffer, rank, Tag::Print)?;
            if received != rows * ncols {
                return Err(LifeError::transport(
                    0,
                    format!("rank {rank} sent {received} cells instead of {}", rows * ncols),
                ));
            }
            sink.rows(&buffer[..received])?;
        }
        sink.end()
    }

    /// Run `timesteps` generations, gathering the boards `policy` asks for.
    ///
    /// Only rank 0 records timings; the other ranks return an empty report.
    pub fn run<S: BoardSink + ?Sized>(
        &mut self,
        timesteps: usize,
        policy: DisplayPolicy,
        sink: &mut S,
    ) -> Result<RunReport> {
        let rank = self.comm.rank();
        let is_root = rank == 0;

        if policy.show_initial() {
            self.gather(sink, None)?;
        }

        let mut report = RunReport {
            timesteps,
            generation_ms: Vec::with_capacity(if is_root { timesteps } else { 0 }),
        };

        for t in 0..timesteps {
            let cur_gene_time = self.step(t)?;

            if is_root {
                report.generation_ms.push(cur_gene_time);
                if policy.big {
                    info!(generation = t, ms = cur_gene_time, "Generation evolved");
                } else {
                    debug!(generation = t, ms = cur_gene_time, "Generation evolved");
                }
            }
            trace!(rank, generation = t, population = self.chunk.population(), "Chunk status");

            if policy.show_generation(t, timesteps) {
                self.gather(sink, Some(t))?;
            }
        }

        self.phase = WorkerPhase::Done;
        if is_root {
            info!(
                timesteps,
                workers = self.comm.size(),
                ms = report.cumulative_ms(),
                "Evolved the grid"
            );
        }
        Ok(report)
    }
}

/// Everything one rank does from initialization to the last gather.
///
/// `sink` is only written on rank 0.
pub fn run_rank<C, S>(
    comm: &C,
    config: &LifeConfig,
    input: Option<&InputBoard>,
    policy: DisplayPolicy,
    sink: &mut S,
) -> Result<RunReport>
where
    C: Communicator + ?Sized,
    S: BoardSink + ?Sized,
{
    let parallel = config.effective_threads().is_some();
    let mut worker = Worker::initialize(comm, config, input)?.with_parallelism(parallel);
    worker.run(config.timesteps, policy, sink)
}

/// Run the distributed engine on `workers` in-process ranks and return
/// rank 0's report. The first failing rank aborts the others.
pub fn run_local<S>(
    config: &LifeConfig,
    workers: usize,
    input: Option<&InputBoard>,
    policy: DisplayPolicy,
    sink: &mut S,
) -> Result<RunReport>
where
    S: BoardSink + Send + ?Sized,
{
    let (nrows, _) = board_shape(config, input);
    crate::config::check_workers(nrows, workers)?;

    let sink = Mutex::new(sink);
    let mut reports = spawn_ring(workers, |comm| {
        if comm.rank() == 0 {
            let mut guard = sink
                .lock()
                .map_err(|_| LifeError::transport(0, "display sink poisoned"))?;
            run_rank(comm, config, input, policy, &mut **guard)
        } else {
            run_rank(comm, config, input, policy, &mut crate::display::NullSink)
        }
    })?;

    // Ranks come back in order; rank 0 is first.
    Ok(reports.swap_remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::local::LocalComm;
    use crate::display::MemorySink;
    use crate::engine::Engine;
    use crate::grid::Grid;
    use crate::rules::{ALIVE, DEAD};

    fn config(nrows: usize, ncols: usize, timesteps: usize) -> LifeConfig {
        LifeConfig {
            nrows,
            ncols,
            timesteps,
            seed: 21,
            init_prob: 0.4,
            ..LifeConfig::default()
        }
    }

    #[test]
    fn single_rank_is_its_own_neighbour() {
        let cfg = config(7, 6, 9);
        let comms = LocalComm::cohort(1);
        let mut sink = MemorySink::new();
        let policy = DisplayPolicy::new(true, 7, 6, usize::MAX);
        let report = run_rank(&comms[0], &cfg, None, policy, &mut sink).unwrap();
        assert_eq!(report.generation_ms.len(), 9);

        let mut engine = Engine::initialize(&cfg).unwrap();
        engine.run(9);
        assert_eq!(sink.last(), Some(engine.grid().cells()));
        assert_eq!(sink.frames.len(), 10);
    }

    #[test]
    fn phases_advance_to_done() {
        let cfg = config(4, 4, 2);
        let comms = LocalComm::cohort(1);
        let mut worker = Worker::initialize(&comms[0], &cfg, None).unwrap();
        assert_eq!(worker.phase(), WorkerPhase::Ready);
        worker.step(0).unwrap();
        assert_eq!(worker.phase(), WorkerPhase::ExchangeGhosts { generation: 0 });
        worker
            .run(1, DisplayPolicy::disabled(), &mut crate::display::NullSink)
            .unwrap();
        assert_eq!(worker.phase(), WorkerPhase::Done);
    }

    #[test]
    fn mismatched_chunk_is_rejected() {
        let comms = LocalComm::cohort(1);
        let chunk = Chunk::allocate(compute_bounds(6, 2, 1).unwrap(), 3).unwrap();
        assert!(Worker::new(&comms[0], chunk).is_err());
    }

    #[test]
    fn gather_reassembles_rows_in_rank_order() {
        let input = InputBoard::parse("5 2\nX.\n.X\nXX\n..\nX.\n").unwrap();
        let mut sink = MemorySink::new();
        let policy = DisplayPolicy::new(true, 5, 2, usize::MAX);
        let cfg = LifeConfig {
            timesteps: 0,
            ..LifeConfig::default()
        };
        run_local(&cfg, 3, Some(&input), policy, &mut sink).unwrap();

        assert_eq!(sink.frames.len(), 1);
        let (frame, cells) = &sink.frames[0];
        assert_eq!((frame.nrows, frame.ncols, frame.generation), (5, 2, None));
        assert_eq!(
            cells,
            &vec![ALIVE, DEAD, DEAD, ALIVE, ALIVE, ALIVE, DEAD, DEAD, ALIVE, DEAD]
        );
    }

    #[test]
    fn big_boards_gather_only_the_initial_and_final_state() {
        let cfg = config(12, 10, 6);
        let mut sink = MemorySink::new();
        let policy = DisplayPolicy::new(true, 12, 10, 50);
        run_local(&cfg, 3, None, policy, &mut sink).unwrap();

        let generations: Vec<_> = sink.frames.iter().map(|(f, _)| f.generation).collect();
        assert_eq!(generations, vec![None, Some(5)]);

        let mut grid = Grid::allocate(12, 10).unwrap();
        grid.fill_random(cfg.seed, cfg.init_prob);
        assert_eq!(sink.frames[0].1, grid.cells());
    }

    #[test]
    fn malformed_input_is_fatal() {
        let input = InputBoard::parse("4 3\nX..\n...\n").unwrap();
        let err = run_local(
            &LifeConfig::default(),
            2,
            Some(&input),
            DisplayPolicy::disabled(),
            &mut crate::display::NullSink,
        )
        .unwrap_err();
        assert!(matches!(err, LifeError::Format { .. }));
    }

    #[test]
    fn too_many_workers_is_a_partition_error() {
        let err = run_local(
            &config(3, 3, 1),
            4,
            None,
            DisplayPolicy::disabled(),
            &mut crate::display::NullSink,
        )
        .unwrap_err();
        assert!(matches!(err, LifeError::Partition { nrows: 3, workers: 4 }));
    }
}

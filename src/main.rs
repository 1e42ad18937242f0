use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use game_of_life::config::{
    self, default_logs_dir, default_out_file, resolve_seed, Backend, LifeConfig,
};
use game_of_life::display::{self, DisplayPolicy, Frame};
use game_of_life::distributed;
use game_of_life::log::{write_run_log, LogTags};
use game_of_life::utils::as_ms;
use game_of_life::{Engine, RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    /// One thread.
    Serial,
    /// One process, rayon thread pool.
    Threads,
    /// In-process ranks exchanging ghost rows over channels.
    Local,
    /// One rank per MPI process.
    Mpi,
}

/// Conway's Game of Life on a toroidal board.
#[derive(Debug, Parser)]
#[command(name = "gol", version, about)]
struct Cli {
    /// Number of rows.
    #[arg(short = 'r', long, default_value_t = config::DEFAULT_SIZE_ROWS)]
    rows: usize,

    /// Number of columns.
    #[arg(short = 'c', long, default_value_t = config::DEFAULT_SIZE_COLS)]
    columns: usize,

    /// Number of generations.
    #[arg(short = 't', long, default_value_t = config::DEFAULT_TIMESTEPS)]
    tsteps: usize,

    /// Random seed; 0 takes one from the clock.
    #[arg(short = 's', long, default_value_t = config::DEFAULT_SEED)]
    seed: u64,

    /// Probability of a cell starting ALIVE.
    #[arg(short = 'p', long, default_value_t = config::DEFAULT_INIT_PROB)]
    init_prob: f64,

    /// Board file to start from; its header overrides --rows/--columns.
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Output file for boards too big for the console.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Threads for the cell loop of each process or rank.
    #[arg(short = 'n', long)]
    nthreads: Option<usize>,

    /// Ranks of the local backend.
    #[arg(short = 'w', long, default_value_t = 4)]
    workers: usize,

    #[arg(long, value_enum, default_value_t = BackendArg::Serial)]
    backend: BackendArg,

    /// Directory of the timing log (implies --log).
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Write a timing log.
    #[arg(long)]
    log: bool,

    /// Boards with more cells than this go to the output file.
    #[arg(long, default_value_t = config::DEFAULT_MAX_SIZE)]
    max_display_size: usize,

    /// Do not display any board.
    #[arg(long)]
    no_display: bool,
}

impl Cli {
    fn into_config(self) -> LifeConfig {
        let backend = match self.backend {
            BackendArg::Serial => Backend::Serial,
            BackendArg::Threads => Backend::Threads,
            BackendArg::Local => Backend::LocalRing {
                workers: self.workers,
            },
            BackendArg::Mpi => Backend::Mpi,
        };
        let threads = self.nthreads;

        let log_dir = match (self.log_dir, self.log) {
            (Some(dir), _) => Some(dir),
            (None, true) => Some(PathBuf::from(default_logs_dir(backend, threads))),
            (None, false) => None,
        };

        LifeConfig {
            nrows: self.rows,
            ncols: self.columns,
            timesteps: self.tsteps,
            init_prob: self.init_prob,
            seed: resolve_seed(self.seed),
            input_path: self.input,
            output_path: self
                .output
                .unwrap_or_else(|| PathBuf::from(default_out_file(backend, threads))),
            backend,
            threads,
            log_dir,
            max_display_size: self.max_display_size,
        }
    }
}

fn main() -> ExitCode {
    let prog_start = Instant::now();

    // Logs go to stderr; stdout belongs to the board.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let show = !cli.no_display;
    let config = cli.into_config();

    match run(&config, show, prog_start) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &LifeConfig, show: bool, prog_start: Instant) -> Result<()> {
    config.validate()?;

    if let Some(threads) = config.effective_threads() {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to build the thread pool")?;
    }

    info!(
        backend = %config.backend,
        nrows = config.nrows,
        ncols = config.ncols,
        timesteps = config.timesteps,
        seed = config.seed,
        "Starting"
    );

    match config.backend {
        Backend::Serial | Backend::Threads => run_single(config, show, prog_start),
        Backend::LocalRing { workers } => run_ring(config, workers, show, prog_start),
        Backend::Mpi => run_mpi(config, show, prog_start),
    }
}

fn run_single(config: &LifeConfig, show: bool, prog_start: Instant) -> Result<()> {
    let parallel = config.effective_threads().is_some();
    let mut engine = Engine::initialize(config)?.with_parallelism(parallel);
    let (nrows, ncols) = (engine.grid().nrows(), engine.grid().ncols());

    let policy = DisplayPolicy::new(show, nrows, ncols, config.max_display_size);
    let mut sink = display::sink_for(policy, &config.output_path);
    let frame = |generation| Frame {
        generation,
        nrows,
        ncols,
    };

    if policy.show_initial() {
        display::show(&mut *sink, &frame(None), engine.grid().cells())?;
    }

    let timesteps = config.timesteps;
    let report = engine.run_with(timesteps, |t, grid| {
        if policy.show_generation(t, timesteps) {
            display::show(&mut *sink, &frame(Some(t)), grid.cells())
        } else {
            Ok(())
        }
    })?;

    let tags = LogTags::new(config, nrows, ncols, None, config.input_path.is_some());
    finish(config, &tags, &report, prog_start);
    Ok(())
}

fn run_ring(config: &LifeConfig, workers: usize, show: bool, prog_start: Instant) -> Result<()> {
    let input = distributed::load_input(config)?;
    let (nrows, ncols) = distributed::board_shape(config, input.as_ref());

    let policy = DisplayPolicy::new(show, nrows, ncols, config.max_display_size);
    let mut sink = display::sink_for(policy, &config.output_path);
    let report = distributed::run_local(config, workers, input.as_ref(), policy, &mut *sink)?;

    let tags = LogTags::new(config, nrows, ncols, Some(workers), input.is_some());
    finish(config, &tags, &report, prog_start);
    Ok(())
}

#[cfg(feature = "mpi")]
fn run_mpi(config: &LifeConfig, show: bool, prog_start: Instant) -> Result<()> {
    use game_of_life::comm::mpi::MpiComm;
    use game_of_life::comm::Communicator;
    use game_of_life::display::{BoardSink, NullSink};

    let universe = mpi::initialize().context("MPI is already initialized")?;
    let comm = MpiComm::new(universe.world());
    let is_root = comm.rank() == 0;

    let outcome = distributed::load_input(config).and_then(|input| {
        let (nrows, ncols) = distributed::board_shape(config, input.as_ref());
        let policy = DisplayPolicy::new(show, nrows, ncols, config.max_display_size);
        let mut sink: Box<dyn BoardSink + Send> = if is_root {
            display::sink_for(policy, &config.output_path)
        } else {
            Box::new(NullSink)
        };
        let report = distributed::run_rank(&comm, config, input.as_ref(), policy, &mut *sink)?;
        let tags = LogTags::new(config, nrows, ncols, Some(comm.size()), input.is_some());
        Ok((report, tags))
    });

    match outcome {
        Ok((report, tags)) => {
            if is_root {
                finish(config, &tags, &report, prog_start);
            }
            Ok(())
        }
        Err(e) => {
            error!(rank = comm.rank(), error = %e, "Fatal error");
            comm.abort(1);
            Err(e.into())
        }
    }
}

#[cfg(not(feature = "mpi"))]
fn run_mpi(_config: &LifeConfig, _show: bool, _prog_start: Instant) -> Result<()> {
    anyhow::bail!("this build has no MPI support, rebuild with `--features mpi`")
}

fn finish(config: &LifeConfig, tags: &LogTags, report: &RunReport, prog_start: Instant) {
    let tot_prog_time = as_ms(prog_start.elapsed());
    info!(
        cum_gene_time = report.cumulative_ms(),
        tot_prog_time,
        "Run complete"
    );
    if let Some(dir) = &config.log_dir {
        write_run_log(dir, tags, report, tot_prog_time);
    }
}

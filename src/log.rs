//! Tab-separated timing log, one file per run.
//!
//! ```text
//! timesteps	cum_gene_time	tot_prog_time
//! 100      	12.345       	20.001
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::LifeConfig;
use crate::engine::RunReport;
use crate::error::{LifeError, Result};

const HEADER: &str = "timesteps\tcum_gene_time\ttot_prog_time";

/// What the log file name is made of.
#[derive(Debug, Clone, PartialEq)]
pub struct LogTags {
    /// Number of ranks, for distributed runs.
    pub ranks: Option<usize>,
    /// Cell-loop threads, when the loop is parallel.
    pub threads: Option<usize>,
    pub nrows: usize,
    pub ncols: usize,
    pub timesteps: usize,
    /// Probability and seed of a random initialization; `None` when the
    /// board came from a file.
    pub random: Option<(f64, u64)>,
}

impl LogTags {
    pub fn new(
        config: &LifeConfig,
        nrows: usize,
        ncols: usize,
        ranks: Option<usize>,
        from_file: bool,
    ) -> Self {
        Self {
            ranks,
            threads: config.effective_threads(),
            nrows,
            ncols,
            timesteps: config.timesteps,
            random: (!from_file).then_some((config.init_prob, config.seed)),
        }
    }

    /// `GoL_[mpi<N>_][omp<T>_]nc<C>_nr<R>_nt<T>[_prob<P>_seed<S>]_<unix>.log`
    pub fn file_name(&self, unix_time: i64) -> String {
        let mut name = String::from("GoL_");
        if let Some(ranks) = self.ranks {
            name.push_str(&format!("mpi{ranks}_"));
        }
        if let Some(threads) = self.threads {
            name.push_str(&format!("omp{threads}_"));
        }
        name.push_str(&format!("nc{}_nr{}_nt{}", self.ncols, self.nrows, self.timesteps));
        if let Some((prob, seed)) = self.random {
            name.push_str(&format!("_prob{prob:.1}_seed{seed}"));
        }
        name.push_str(&format!("_{unix_time}.log"));
        name
    }
}

/// Format one data row.
pub fn format_row(timesteps: usize, cum_gene_time: f64, tot_prog_time: f64) -> String {
    format!("{timesteps:<9}\t{cum_gene_time:<13.3}\t{tot_prog_time:<13.3}")
}

pub struct TimingLog {
    path: PathBuf,
    out: BufWriter<File>,
}

impl TimingLog {
    /// Create `dir` if needed and open `dir/name` for appending, header
    /// first.
    pub fn create(dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| LifeError::io(dir, e))?;
        let path = dir.join(name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LifeError::io(&path, e))?;

        let mut log = Self {
            path,
            out: BufWriter::new(file),
        };
        log.write_line(HEADER)?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(
        &mut self,
        timesteps: usize,
        cum_gene_time: f64,
        tot_prog_time: f64,
    ) -> Result<()> {
        self.write_line(&format_row(timesteps, cum_gene_time, tot_prog_time))
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{line}")
            .and_then(|()| self.out.flush())
            .map_err(|e| LifeError::io(&self.path, e))
    }
}

/// Append a run's totals to a fresh log in `dir`.
///
/// The log is not essential: failures are reported and swallowed.
pub fn write_run_log(dir: &Path, tags: &LogTags, report: &RunReport, tot_prog_time: f64) {
    let name = tags.file_name(chrono::Utc::now().timestamp());
    let result = TimingLog::create(dir, &name).and_then(|mut log| {
        log.record(report.timesteps, report.cumulative_ms(), tot_prog_time)?;
        Ok(log)
    });

    match result {
        Ok(log) => info!(path = %log.path().display(), "Timing log written"),
        Err(e) => warn!(error = %e, "Could not write the timing log"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags() -> LogTags {
        LogTags {
            ranks: None,
            threads: None,
            nrows: 30,
            ncols: 40,
            timesteps: 100,
            random: Some((0.5, 7)),
        }
    }

    #[test]
    fn names_carry_the_configuration() {
        assert_eq!(
            tags().file_name(1_700_000_000),
            "GoL_nc40_nr30_nt100_prob0.5_seed7_1700000000.log"
        );

        let hybrid = LogTags {
            ranks: Some(4),
            threads: Some(8),
            random: None,
            ..tags()
        };
        assert_eq!(hybrid.file_name(12), "GoL_mpi4_omp8_nc40_nr30_nt100_12.log");
    }

    #[test]
    fn rows_are_padded_columns() {
        assert_eq!(format_row(5, 1.5, 20.0), "5        \t1.500        \t20.000       ");
    }

    #[test]
    fn log_file_has_header_and_row() {
        let dir = std::env::temp_dir().join(format!("gol-logs-{}", std::process::id()));
        let report = RunReport {
            timesteps: 2,
            generation_ms: vec![1.0, 2.0],
        };
        write_run_log(&dir, &tags(), &report, 10.0);

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let text = fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        let _ = fs::remove_dir_all(&dir);

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(HEADER));
        assert_eq!(lines.next(), Some(format_row(2, 3.0, 10.0).as_str()));
    }

    #[test]
    fn unwritable_directory_only_warns() {
        let report = RunReport::default();
        write_run_log(Path::new("/proc/definitely/not/writable"), &tags(), &report, 0.0);
    }
}

use std::path::PathBuf;

use crate::error::TallyError;
use crate::kernel::DEFAULT_KERNEL_PATH;
use crate::types::{Mode, Partition, Pattern};

pub const USAGE: &str = "\
usage: tally <mode> <inputFile> <targetPattern> <runs> <outputCsv>
  mode = serial | cpu | gpu | all
  runs = number of repetitions per backend (e.g. 3)";

/// Everything one invocation needs, validated.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub input: PathBuf,
    pub pattern: Pattern,
    pub runs: u32,
    pub output: PathBuf,
    /// Multi-worker backend pool size.
    pub workers: usize,
    pub partition: Partition,
    pub kernel_path: PathBuf,
}

impl Config {
    /// Build from the five positional arguments, with defaults for the rest.
    pub fn from_args(
        mode: &str,
        input: impl Into<PathBuf>,
        pattern: &str,
        runs: &str,
        output: impl Into<PathBuf>,
    ) -> Result<Self, TallyError> {
        let mode = mode.parse::<Mode>()?;
        let runs = parse_runs(runs)?;
        let pattern = Pattern::new(pattern)?;
        Ok(Self {
            mode,
            input: input.into(),
            pattern,
            runs,
            output: output.into(),
            workers: default_workers(),
            partition: Partition::default(),
            kernel_path: PathBuf::from(DEFAULT_KERNEL_PATH),
        })
    }

    pub fn with_workers(mut self, workers: usize) -> Result<Self, TallyError> {
        if workers == 0 {
            return Err(TallyError::config("--workers must be at least 1"));
        }
        self.workers = workers;
        Ok(self)
    }

    #[must_use]
    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    #[must_use]
    pub fn with_kernel_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.kernel_path = path.into();
        self
    }
}

/// Available parallel execution units on this host.
#[must_use]
pub fn default_workers() -> usize {
    num_cpus::get().max(1)
}

fn parse_runs(runs: &str) -> Result<u32, TallyError> {
    match runs.trim().parse::<u32>() {
        Ok(0) => Err(TallyError::config("runs must be at least 1")),
        Ok(n) => Ok(n),
        Err(e) => Err(TallyError::config(format!(
            "runs must be a positive integer, got \"{runs}\": {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_args() {
        let c = Config::from_args("all", "in.txt", "fox", "3", "out/results.csv").unwrap();
        assert_eq!(c.mode, Mode::All);
        assert_eq!(c.runs, 3);
        assert_eq!(c.pattern.as_bytes(), b"fox");
        assert_eq!(c.partition, Partition::Lines);
        assert!(c.workers >= 1);
        assert_eq!(c.kernel_path, PathBuf::from(DEFAULT_KERNEL_PATH));
    }

    #[test]
    fn rejects_bad_runs() {
        for runs in ["0", "-1", "three", ""] {
            assert!(
                matches!(
                    Config::from_args("serial", "in.txt", "fox", runs, "o.csv"),
                    Err(TallyError::Config { .. })
                ),
                "runs={runs:?}"
            );
        }
    }

    #[test]
    fn rejects_bad_mode_and_pattern() {
        assert!(Config::from_args("fast", "in.txt", "fox", "1", "o.csv").is_err());
        assert!(Config::from_args("cpu", "in.txt", "", "1", "o.csv").is_err());
    }

    #[test]
    fn builder_overrides() {
        let c = Config::from_args("cpu", "in.txt", "fox", "1", "o.csv")
            .unwrap()
            .with_workers(4)
            .unwrap()
            .with_partition(Partition::Spans)
            .with_kernel_path("k.cl");
        assert_eq!(c.workers, 4);
        assert_eq!(c.partition, Partition::Spans);
        assert_eq!(c.kernel_path, PathBuf::from("k.cl"));
        assert!(c.with_workers(0).is_err());
    }
}

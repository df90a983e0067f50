//! Repeated, timed backend invocations.
//!
//! Backends run one after another, never concurrently, so their timings do
//! not contend. A backend that cannot run produces a `-1` row for that run
//! and the harness moves on; only non-recoverable errors (I/O, bad
//! configuration) stop it.

use std::time::Instant;

use tracing::{error, info};

use crate::config::Config;
use crate::error::TallyError;
use crate::scan::{Scanner, backends_for};
use crate::types::{Corpus, Method, Pattern, RunRecord, ScanResult};

pub struct Harness {
    scanners: Vec<Box<dyn Scanner>>,
    runs: u32,
}

impl Harness {
    /// `runs` invocations of each scanner, in the order given.
    pub fn new(scanners: Vec<Box<dyn Scanner>>, runs: u32) -> Result<Self, TallyError> {
        if runs == 0 {
            return Err(TallyError::config("runs must be at least 1"));
        }
        Ok(Self { scanners, runs })
    }

    /// The backends `config.mode` selects, configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self, TallyError> {
        Self::new(backends_for(config), config.runs)
    }

    #[must_use]
    pub fn methods(&self) -> Vec<Method> {
        self.scanners.iter().map(|s| s.method()).collect()
    }

    /// Execute every run, handing each record to `emit` as soon as it exists.
    /// Returns all records in invocation order.
    pub fn run<F>(
        &self,
        corpus: &Corpus,
        pattern: &Pattern,
        input: &str,
        mut emit: F,
    ) -> Result<Vec<RunRecord>, TallyError>
    where
        F: FnMut(&RunRecord) -> Result<(), TallyError>,
    {
        let target = pattern.display().into_owned();
        let mut records = Vec::with_capacity(self.scanners.len() * self.runs as usize);

        for scanner in &self.scanners {
            let method = scanner.method();
            for run in 1..=self.runs {
                let start = Instant::now();
                let outcome = scanner.count(corpus, pattern);
                let elapsed = start.elapsed();

                let result = match outcome {
                    Ok(count) => {
                        info!(%method, run, count, ?elapsed, "run complete");
                        ScanResult::counted(count, elapsed)
                    }
                    Err(e) if e.is_recoverable() => {
                        error!(%method, run, error = %e, "backend failed, recording -1");
                        ScanResult::unavailable(elapsed)
                    }
                    Err(e) => return Err(e),
                };

                let record = RunRecord {
                    method,
                    file: input.to_string(),
                    target: target.clone(),
                    result,
                    run,
                };
                emit(&record)?;
                records.push(record);
            }
        }

        Ok(records)
    }
}

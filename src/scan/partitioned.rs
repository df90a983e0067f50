//! Multi-worker scan on a rayon pool scoped to one invocation.
//!
//! Two ways to divide the corpus:
//!
//! - **lines**: contiguous runs of whole lines, each line scanned as an
//!   isolated sub-text. A match that straddles a line break is never seen,
//!   so the count can be lower than the serial scan's.
//! - **spans**: contiguous byte ranges of candidate start offsets. Each
//!   worker reads `len(pattern) - 1` bytes past its own range and counts only
//!   matches that start inside it, so nothing is lost or double-counted.
//!
//! Workers share nothing mutable; partial counts are summed after every
//! worker has finished.

use rayon::prelude::*;
use tracing::debug;

use super::{Scanner, count_occurrences, timed};
use crate::error::TallyError;
use crate::types::{Corpus, Method, Partition, Pattern, ScanResult};

#[derive(Debug, Clone, Copy)]
pub struct PartitionedScanner {
    workers: usize,
    partition: Partition,
}

impl PartitionedScanner {
    #[must_use]
    pub fn new(workers: usize, partition: Partition) -> Self {
        Self { workers, partition }
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Scanner for PartitionedScanner {
    fn method(&self) -> Method {
        Method::ParallelCpu
    }

    fn count(&self, corpus: &Corpus, pattern: &Pattern) -> Result<u64, TallyError> {
        match self.partition {
            Partition::Lines => count_lines(&corpus.lines(), pattern.as_bytes(), self.workers),
            Partition::Spans => count_spans(corpus.bytes(), pattern.as_bytes(), self.workers),
        }
    }
}

/// Count over pre-split lines. Lines are grouped into chunks of
/// `max(1, lines / workers)` and each chunk is one unit of work.
pub fn scan_partitioned(
    lines: &[&[u8]],
    pattern: &[u8],
    workers: usize,
) -> Result<ScanResult, TallyError> {
    timed(|| count_lines(lines, pattern, workers))
}

/// Count over the whole byte buffer split into `workers` spans of candidate
/// start offsets. Agrees with the serial scan for every input.
pub fn scan_spans(text: &[u8], pattern: &[u8], workers: usize) -> Result<ScanResult, TallyError> {
    timed(|| count_spans(text, pattern, workers))
}

fn count_lines(lines: &[&[u8]], pattern: &[u8], workers: usize) -> Result<u64, TallyError> {
    let pool = worker_pool(workers)?;
    let chunk_size = (lines.len() / workers).max(1);
    debug!(
        workers,
        lines = lines.len(),
        chunk_size,
        "line-partitioned scan"
    );

    let count = pool.install(|| {
        lines
            .par_chunks(chunk_size)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|line| count_occurrences(line, pattern))
                    .sum::<u64>()
            })
            .sum::<u64>()
    });

    Ok(count)
}

fn count_spans(text: &[u8], pattern: &[u8], workers: usize) -> Result<u64, TallyError> {
    let pool = worker_pool(workers)?;

    if pattern.is_empty() || pattern.len() > text.len() {
        return Ok(0);
    }
    let candidates = text.len() - pattern.len() + 1;
    let span = candidates.div_ceil(workers);
    debug!(workers, candidates, span, "span-partitioned scan");

    let count = pool.install(|| {
        (0..workers)
            .into_par_iter()
            .map(|w| {
                let lo = w * span;
                let hi = (lo + span).min(candidates);
                if lo >= hi {
                    return 0;
                }
                // Starts in lo..hi; the window ends where the last of them would
                count_occurrences(&text[lo..hi + pattern.len() - 1], pattern)
            })
            .sum::<u64>()
    });

    Ok(count)
}

/// Fresh pool per invocation, torn down when dropped.
fn worker_pool(workers: usize) -> Result<rayon::ThreadPool, TallyError> {
    if workers == 0 {
        return Err(TallyError::config("worker count must be at least 1"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("tally-worker-{i}"))
        .build()
        .map_err(|e| TallyError::BackendUnavailable(format!("cannot start worker pool: {e}")))
}

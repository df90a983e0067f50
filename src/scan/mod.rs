pub mod device;
pub mod partitioned;
pub mod serial;

use std::time::Instant;

use crate::config::Config;
use crate::error::TallyError;
use crate::kernel::KernelLoader;
use crate::types::{Corpus, Method, Pattern, ScanResult};

pub use device::{DeviceScanner, scan_device};
pub use partitioned::{PartitionedScanner, scan_partitioned, scan_spans};
pub use serial::{SerialScanner, count_occurrences, scan_serial};

/// Does `pattern` occur in `text` at `offset`? Byte-exact, no normalization.
/// Offsets where the pattern would run past the end are never a match.
///
/// The device kernel restates this check in OpenCL C; the two must agree.
#[inline]
#[must_use]
pub fn matches_at(text: &[u8], offset: usize, pattern: &[u8]) -> bool {
    offset
        .checked_add(pattern.len())
        .and_then(|end| text.get(offset..end))
        .is_some_and(|window| window == pattern)
}

/// One counting strategy. Implementations must not mutate the corpus or
/// pattern, and must agree on the count they report (see each backend's
/// docs for the documented exceptions).
pub trait Scanner {
    fn method(&self) -> Method;

    /// Count occurrences, untimed; the caller owns the clock. `Err` with a
    /// recoverable error means the backend could not run at all, not that
    /// counting went wrong.
    fn count(&self, corpus: &Corpus, pattern: &Pattern) -> Result<u64, TallyError>;
}

/// The backends `config.mode` selects, in execution order, configured from
/// `config`.
#[must_use]
pub fn backends_for(config: &Config) -> Vec<Box<dyn Scanner>> {
    config
        .mode
        .methods()
        .iter()
        .map(|method| -> Box<dyn Scanner> {
            match method {
                Method::SerialCpu => Box::new(SerialScanner),
                Method::ParallelCpu => {
                    Box::new(PartitionedScanner::new(config.workers, config.partition))
                }
                Method::ParallelGpu => {
                    Box::new(DeviceScanner::new(KernelLoader::new(&config.kernel_path)))
                }
            }
        })
        .collect()
}

/// Run `count` under a wall clock. Used by the standalone `scan_*` entry
/// points; the harness times `Scanner::count` itself.
fn timed(count: impl FnOnce() -> Result<u64, TallyError>) -> Result<ScanResult, TallyError> {
    let start = Instant::now();
    let n = count()?;
    Ok(ScanResult::counted(n, start.elapsed()))
}

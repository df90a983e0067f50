use std::borrow::Cow;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::TallyError;

/// The literal searched for. Non-empty by construction; compared byte-exact,
/// no case or encoding normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    bytes: Box<[u8]>,
}

impl Pattern {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, TallyError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(TallyError::config("pattern must not be empty"));
        }
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false: construction rejects empty patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lossy text form for reports.
    #[must_use]
    pub fn display(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// The text searched, loaded once and read-only afterwards. Carries a
/// line view (split on `\n`, one trailing `\r` dropped) used only as the
/// chunking unit of the line-partitioned scan.
#[derive(Debug)]
pub struct Corpus {
    bytes: Vec<u8>,
    lines: Vec<Range<usize>>,
}

impl Corpus {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        let lines = line_ranges(&bytes);
        Self { bytes, lines }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// The line view as borrowed slices, in input order.
    #[must_use]
    pub fn lines(&self) -> Vec<&[u8]> {
        self.lines.iter().map(|r| &self.bytes[r.clone()]).collect()
    }
}

/// Byte ranges of each line, terminators (`\n` or `\r\n`) excluded. Trailing empty lines are
/// dropped, so `"a\nb\n"` has two lines and an empty input has none.
fn line_ranges(buf: &[u8]) -> Vec<Range<usize>> {
    let mut ranges = Vec::with_capacity(memchr::memchr_iter(b'\n', buf).count() + 1);
    let mut start = 0;
    for nl in memchr::memchr_iter(b'\n', buf).chain(std::iter::once(buf.len())) {
        let mut end = nl;
        // Only a `\r` that precedes a `\n` is part of the terminator
        if nl < buf.len() && end > start && buf[end - 1] == b'\r' {
            end -= 1;
        }
        ranges.push(start..end);
        start = nl + 1;
    }
    while ranges.last().is_some_and(Range::is_empty) {
        ranges.pop();
    }
    ranges
}

/// Outcome of one backend invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Occurrence count, or [`ScanResult::UNAVAILABLE`].
    pub count: i64,
    #[serde(rename = "millis", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl ScanResult {
    /// Sentinel count for a backend that could not run. The only legal
    /// negative count.
    pub const UNAVAILABLE: i64 = -1;

    /// Wrap a host-side count. Saturates rather than wrapping into the
    /// sentinel range.
    #[must_use]
    pub fn counted(count: u64, elapsed: Duration) -> Self {
        Self {
            count: i64::try_from(count).unwrap_or(i64::MAX),
            elapsed,
        }
    }

    #[must_use]
    pub fn unavailable(elapsed: Duration) -> Self {
        Self {
            count: Self::UNAVAILABLE,
            elapsed,
        }
    }

    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.count == Self::UNAVAILABLE
    }

    /// Whole milliseconds, as written to the CSV `millis` column.
    #[must_use]
    pub fn millis(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// Backend identity as reported in output rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Method {
    #[serde(rename = "SerialCPU")]
    SerialCpu,
    #[serde(rename = "ParallelCPU")]
    ParallelCpu,
    #[serde(rename = "ParallelGPU")]
    ParallelGpu,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SerialCpu => "SerialCPU",
            Self::ParallelCpu => "ParallelCPU",
            Self::ParallelGpu => "ParallelGPU",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which backends an invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Serial,
    Cpu,
    Gpu,
    All,
}

impl Mode {
    /// Backends in execution order.
    #[must_use]
    pub fn methods(self) -> &'static [Method] {
        match self {
            Self::Serial => &[Method::SerialCpu],
            Self::Cpu => &[Method::ParallelCpu],
            Self::Gpu => &[Method::ParallelGpu],
            Self::All => &[Method::SerialCpu, Method::ParallelCpu, Method::ParallelGpu],
        }
    }
}

impl FromStr for Mode {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serial" => Ok(Self::Serial),
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            "all" => Ok(Self::All),
            other => Err(TallyError::config(format!(
                "unknown mode \"{other}\" (expected serial, cpu, gpu or all)"
            ))),
        }
    }
}

/// How the multi-worker backend divides the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Partition {
    /// Contiguous runs of whole lines; matches never cross a line break.
    #[default]
    Lines,
    /// Contiguous byte spans with a `len(pattern) - 1` overlap; agrees with
    /// the serial scan on every input.
    Spans,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lines => write!(f, "lines"),
            Self::Spans => write!(f, "spans"),
        }
    }
}

/// One executed run, in the shape of an output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub method: Method,
    /// Input identifier as given on the command line.
    pub file: String,
    /// Pattern, lossily decoded.
    pub target: String,
    #[serde(flatten)]
    pub result: ScanResult,
    /// 1-based repetition index within the method.
    pub run: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_of(text: &str) -> Vec<String> {
        Corpus::new(text.as_bytes().to_vec())
            .lines()
            .into_iter()
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .collect()
    }

    #[test]
    fn empty_pattern_rejected() {
        assert!(matches!(Pattern::new(""), Err(TallyError::Config { .. })));
        assert_eq!(Pattern::new("ab").unwrap().len(), 2);
    }

    #[test]
    fn lines_split_on_lf_and_crlf() {
        assert_eq!(lines_of("a\nb\r\nc"), ["a", "b", "c"]);
        assert_eq!(lines_of("a\n\nb\n"), ["a", "", "b"]);
        assert_eq!(lines_of("one line"), ["one line"]);
    }

    #[test]
    fn trailing_and_empty_lines_dropped() {
        assert!(lines_of("").is_empty());
        assert!(lines_of("\n\n").is_empty());
        assert_eq!(lines_of("x\r\n"), ["x"]);
    }

    #[test]
    fn lone_carriage_return_kept_mid_line() {
        assert_eq!(lines_of("a\rb\n"), ["a\rb"]);
    }

    #[test]
    fn carriage_return_at_end_of_input_kept() {
        assert_eq!(lines_of("ab\r"), ["ab\r"]);
        assert_eq!(lines_of("x\r\nab\r"), ["x", "ab\r"]);
        assert_eq!(lines_of("\r"), ["\r"]);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("all".parse::<Mode>().unwrap().methods().len(), 3);
        assert_eq!(
            "gpu".parse::<Mode>().unwrap().methods(),
            &[Method::ParallelGpu]
        );
        assert!("GPU".parse::<Mode>().is_err());
    }

    #[test]
    fn sentinel_result() {
        let r = ScanResult::unavailable(Duration::from_millis(7));
        assert!(r.is_unavailable());
        assert_eq!(r.millis(), 7);
        assert!(!ScanResult::counted(0, Duration::ZERO).is_unavailable());
    }

    #[test]
    fn record_serializes_with_csv_field_names() {
        let rec = RunRecord {
            method: Method::ParallelCpu,
            file: "in.txt".into(),
            target: "fox".into(),
            result: ScanResult::counted(3, Duration::from_millis(12)),
            run: 2,
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "method": "ParallelCPU",
                "file": "in.txt",
                "target": "fox",
                "count": 3,
                "millis": 12,
                "run": 2,
            })
        );
    }
}

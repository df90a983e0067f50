use std::borrow::Cow;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::TallyError;
use crate::types::{Method, RunRecord};

pub const CSV_HEADER: &str = "method,file,target,count,millis,run";

/// Writes run records as CSV rows, header first.
pub struct CsvSink<W: Write> {
    out: W,
    path: PathBuf,
}

impl CsvSink<BufWriter<File>> {
    /// Create (or truncate) the file at `path`, making parent directories.
    pub fn create(path: &Path) -> Result<Self, TallyError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TallyError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| TallyError::io(path, e))?;
        Self::from_writer(BufWriter::new(file), path)
    }
}

impl<W: Write> CsvSink<W> {
    /// `path` is only used in error messages.
    pub fn from_writer(mut out: W, path: impl Into<PathBuf>) -> Result<Self, TallyError> {
        let path = path.into();
        writeln!(out, "{CSV_HEADER}").map_err(|e| TallyError::io(&path, e))?;
        Ok(Self { out, path })
    }

    pub fn write(&mut self, record: &RunRecord) -> Result<(), TallyError> {
        writeln!(self.out, "{}", csv_row(record)).map_err(|e| TallyError::io(&self.path, e))
    }

    /// Flush and hand back the writer.
    pub fn finish(mut self) -> Result<W, TallyError> {
        self.out
            .flush()
            .map_err(|e| TallyError::io(&self.path, e))?;
        Ok(self.out)
    }
}

/// One CSV data row, no trailing newline.
#[must_use]
pub fn csv_row(record: &RunRecord) -> String {
    format!(
        "{},{},{},{},{},{}",
        record.method,
        csv_field(&record.file),
        csv_field(&record.target),
        record.result.count,
        record.result.millis(),
        record.run
    )
}

/// Quote a field only when it would otherwise break the row.
fn csv_field(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

/// Per-method timing statistics over successful runs.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSummary {
    pub method: Method,
    pub runs: usize,
    pub failures: usize,
    /// Count reported by successful runs, if they all agree.
    pub count: Option<i64>,
    pub consistent: bool,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub stdev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// `SerialCPU` mean divided by this method's mean.
    pub speedup: Option<f64>,
}

/// Group records by method, in first-seen order.
#[must_use]
pub fn summarize(records: &[RunRecord]) -> Vec<MethodSummary> {
    let mut methods: Vec<Method> = Vec::new();
    for r in records {
        if !methods.contains(&r.method) {
            methods.push(r.method);
        }
    }

    let mut summaries: Vec<MethodSummary> = methods
        .into_iter()
        .map(|method| {
            let group: Vec<&RunRecord> = records.iter().filter(|r| r.method == method).collect();
            let ok: Vec<&RunRecord> = group
                .iter()
                .copied()
                .filter(|r| !r.result.is_unavailable())
                .collect();
            let millis: Vec<f64> = ok
                .iter()
                .map(|r| r.result.elapsed.as_secs_f64() * 1000.0)
                .collect();
            let stats = Stats::of(&millis);
            let first = ok.first().map(|r| r.result.count);
            let consistent = ok.iter().all(|r| Some(r.result.count) == first);
            MethodSummary {
                method,
                runs: group.len(),
                failures: group.len() - ok.len(),
                count: if consistent { first } else { None },
                consistent,
                mean_ms: stats.mean,
                median_ms: stats.median,
                stdev_ms: stats.stdev,
                min_ms: stats.min,
                max_ms: stats.max,
                speedup: None,
            }
        })
        .collect();

    let baseline = summaries
        .iter()
        .find(|s| s.method == Method::SerialCpu && s.failures < s.runs)
        .map(|s| s.mean_ms);
    if let Some(base) = baseline {
        for s in &mut summaries {
            if s.failures < s.runs && s.mean_ms > 0.0 {
                s.speedup = Some(base / s.mean_ms);
            }
        }
    }
    summaries
}

struct Stats {
    mean: f64,
    median: f64,
    stdev: f64,
    min: f64,
    max: f64,
}

impl Stats {
    fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                median: 0.0,
                stdev: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        let stdev = if sorted.len() > 1 {
            let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        } else {
            0.0
        };
        Self {
            mean,
            median,
            stdev,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        }
    }
}

/// Plain-text table of summaries.
#[must_use]
pub fn format_summary(summaries: &[MethodSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:>5} {:>6} {:>12} {:>10} {:>10} {:>10} {:>8}",
        "method", "runs", "failed", "count", "mean ms", "median ms", "stdev ms", "speedup"
    );
    for s in summaries {
        let count = match (s.count, s.consistent) {
            (Some(c), _) => c.to_string(),
            (None, false) => "varies".into(),
            (None, true) => "-".into(),
        };
        let speedup = s.speedup.map_or_else(|| "-".into(), |x| format!("{x:.2}x"));
        let _ = writeln!(
            out,
            "{:<12} {:>5} {:>6} {:>12} {:>10.3} {:>10.3} {:>10.3} {:>8}",
            s.method.as_str(),
            s.runs,
            s.failures,
            count,
            s.mean_ms,
            s.median_ms,
            s.stdev_ms,
            speedup
        );
    }
    out
}

use std::path::PathBuf;

use thiserror::Error;

/// Every error tally can produce. Displayed as user-facing messages.
#[derive(Debug, Error)]
pub enum TallyError {
    /// Bad or missing invocation arguments.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// Input unreadable or output unwritable.
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A backend could not run: no platform or device, kernel build failure,
    /// worker pool construction failure, or a device command that failed.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Device resources could not be released cleanly.
    #[error("resource leak: {0}")]
    ResourceLeak(String),
}

impl TallyError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the harness records this error as a sentinel row and keeps
    /// going, instead of aborting the invocation.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::ResourceLeak(_))
    }

    /// Process exit code. Configuration errors print usage and exit cleanly.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 0,
            Self::Io { .. } => 2,
            Self::BackendUnavailable(_) | Self::ResourceLeak(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_backend_errors_are_recoverable() {
        assert!(TallyError::BackendUnavailable("no platform".into()).is_recoverable());
        assert!(TallyError::ResourceLeak("queue".into()).is_recoverable());
        assert!(!TallyError::config("runs must be positive").is_recoverable());
        let io = TallyError::io(
            "missing.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!io.is_recoverable());
        assert_eq!(io.exit_code(), 2);
    }

    #[test]
    fn display_includes_detail() {
        let e = TallyError::BackendUnavailable("no OpenCL platform found".into());
        assert_eq!(e.to_string(), "backend unavailable: no OpenCL platform found");
        let e = TallyError::io(
            "corpus/a.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert_eq!(e.to_string(), "corpus/a.txt: not found");
    }
}

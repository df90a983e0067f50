//! Kernel source resolution for the device backend.
//!
//! Two tiers, tried in order: a `.cl` file on disk (so the kernel can be
//! edited without rebuilding), then the source embedded at compile time.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Where the loader looks first, relative to the working directory.
pub const DEFAULT_KERNEL_PATH: &str = "kernels/match_kernel.cl";

/// Entry point every kernel source must define.
pub const KERNEL_NAME: &str = "count_matches";

/// Fallback source, compiled into the binary.
pub const EMBEDDED_KERNEL: &str = include_str!("../kernels/match_kernel.cl");

/// Which tier produced the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelOrigin {
    File(PathBuf),
    Embedded,
}

impl fmt::Display for KernelOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Embedded => write!(f, "embedded"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KernelSource {
    pub source: Cow<'static, str>,
    pub origin: KernelOrigin,
}

/// Resolves kernel source: file if readable, embedded otherwise.
#[derive(Debug, Clone)]
pub struct KernelLoader {
    path: PathBuf,
}

impl Default for KernelLoader {
    fn default() -> Self {
        Self::new(DEFAULT_KERNEL_PATH)
    }
}

impl KernelLoader {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails. A missing file is the normal case and falls back
    /// silently; a file that exists but cannot be read logs a warning first.
    #[must_use]
    pub fn load(&self) -> KernelSource {
        if self.path.is_file() {
            match std::fs::read_to_string(&self.path) {
                Ok(source) => {
                    debug!(path = %self.path.display(), "loaded kernel source from file");
                    return KernelSource {
                        source: Cow::Owned(source),
                        origin: KernelOrigin::File(self.path.clone()),
                    };
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "cannot read kernel file, using embedded kernel"
                    );
                }
            }
        }
        KernelSource {
            source: Cow::Borrowed(EMBEDDED_KERNEL),
            origin: KernelOrigin::Embedded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = KernelLoader::new(dir.path().join("nope.cl")).load();
        assert_eq!(loaded.origin, KernelOrigin::Embedded);
        assert_eq!(loaded.source, EMBEDDED_KERNEL);
    }

    #[test]
    fn file_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.cl");
        std::fs::write(&path, "__kernel void count_matches() {}").unwrap();
        let loaded = KernelLoader::new(&path).load();
        assert_eq!(loaded.origin, KernelOrigin::File(path));
        assert!(loaded.source.starts_with("__kernel"));
    }

    #[test]
    fn directory_at_path_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = KernelLoader::new(dir.path()).load();
        assert_eq!(loaded.origin, KernelOrigin::Embedded);
    }

    #[test]
    fn embedded_kernel_has_expected_contract() {
        assert!(EMBEDDED_KERNEL.contains(&format!("__kernel void {KERNEL_NAME}(")));
        assert!(EMBEDDED_KERNEL.contains("if (gid + patLen > textLen) return;"));
        assert!(EMBEDDED_KERNEL.contains("atomic_inc(outCount)"));
    }
}

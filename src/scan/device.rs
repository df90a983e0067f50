//! OpenCL device backend.
//!
//! Uploads the text and pattern once, launches one work-item per candidate
//! start offset, and reads back a single 32-bit counter that work-items bump
//! with `atomic_inc`. Every device object is owned by the call that created
//! it and released on return, success or not.
//!
//! Built only with the `opencl` feature. Without it the backend always
//! reports itself unavailable, which the harness records as a `-1` row.

use super::{Scanner, timed};
use crate::error::TallyError;
use crate::kernel::KernelLoader;
use crate::types::{Corpus, Method, Pattern, ScanResult};

#[derive(Debug, Clone, Default)]
pub struct DeviceScanner {
    loader: KernelLoader,
}

impl DeviceScanner {
    #[must_use]
    pub fn new(loader: KernelLoader) -> Self {
        Self { loader }
    }
}

impl Scanner for DeviceScanner {
    fn method(&self) -> Method {
        Method::ParallelGpu
    }

    fn count(&self, corpus: &Corpus, pattern: &Pattern) -> Result<u64, TallyError> {
        imp::count(corpus.bytes(), pattern.as_bytes(), &self.loader)
    }
}

/// Count on the first OpenCL platform's GPU (or CPU) device, using the
/// kernel at the default path or the embedded one.
pub fn scan_device(text: &[u8], pattern: &[u8]) -> Result<ScanResult, TallyError> {
    scan_device_with(text, pattern, &KernelLoader::default())
}

/// Same as [`scan_device`] with an explicit kernel loader.
pub fn scan_device_with(
    text: &[u8],
    pattern: &[u8],
    loader: &KernelLoader,
) -> Result<ScanResult, TallyError> {
    timed(|| imp::count(text, pattern, loader))
}

#[cfg(not(feature = "opencl"))]
mod imp {
    use crate::error::TallyError;
    use crate::kernel::KernelLoader;

    pub(super) fn count(
        _text: &[u8],
        _pattern: &[u8],
        _loader: &KernelLoader,
    ) -> Result<u64, TallyError> {
        Err(TallyError::BackendUnavailable(
            "built without the `opencl` feature".into(),
        ))
    }
}

#[cfg(feature = "opencl")]
mod imp {
    use std::borrow::Cow;

    use ocl::flags::{DeviceType, MemFlags};
    use ocl::{Buffer, Context, Device, Kernel, Platform, Program, Queue};
    use tracing::{debug, warn};

    use crate::error::TallyError;
    use crate::kernel::{KERNEL_NAME, KernelLoader};

    fn unavailable(what: &str, e: impl std::fmt::Display) -> TallyError {
        TallyError::BackendUnavailable(format!("{what}: {e}"))
    }

    /// Context and queue bound to one device. Drains the queue on drop so no
    /// command is still in flight when the handles are released.
    struct DeviceSession {
        device: Device,
        context: Context,
        queue: Queue,
    }

    impl DeviceSession {
        /// First platform, first GPU device, else first CPU device.
        fn open() -> Result<Self, TallyError> {
            let platform_ids = ocl::core::get_platform_ids()
                .map_err(|e| unavailable("cannot enumerate OpenCL platforms", e))?;
            let platform_id = platform_ids.first().cloned().ok_or_else(|| {
                TallyError::BackendUnavailable("no OpenCL platform found".into())
            })?;
            let platform = Platform::new(platform_id);

            let device = first_device(platform, DeviceType::GPU)
                .or_else(|| first_device(platform, DeviceType::CPU))
                .ok_or_else(|| {
                    TallyError::BackendUnavailable(
                        "no OpenCL GPU or CPU device on the first platform".into(),
                    )
                })?;
            debug!(
                platform = %platform.name().unwrap_or_else(|_| "unknown".into()),
                device = %device.name().unwrap_or_else(|_| "unknown".into()),
                "selected OpenCL device"
            );

            let context = Context::builder()
                .platform(platform)
                .devices(device)
                .build()
                .map_err(|e| unavailable("cannot create OpenCL context", e))?;
            let queue = Queue::new(&context, device, None)
                .map_err(|e| unavailable("cannot create command queue", e))?;

            Ok(Self {
                device,
                context,
                queue,
            })
        }
    }

    impl Drop for DeviceSession {
        fn drop(&mut self) {
            if let Err(e) = self.queue.finish() {
                let leak = TallyError::ResourceLeak(format!("command queue did not drain: {e}"));
                warn!(error = %leak, "releasing device session");
            }
            debug!("released OpenCL context and queue");
        }
    }

    fn first_device(platform: Platform, kind: DeviceType) -> Option<Device> {
        Device::list(platform, Some(kind))
            .ok()
            .and_then(|devices| devices.into_iter().next())
    }

    pub(super) fn count(
        text: &[u8],
        pattern: &[u8],
        loader: &KernelLoader,
    ) -> Result<u64, TallyError> {
        // Bounding the text by i32::MAX also bounds the counter below 2^31
        let text_len = i32::try_from(text.len()).map_err(|_| {
            TallyError::BackendUnavailable(format!(
                "corpus of {} bytes exceeds the kernel's 32-bit length",
                text.len()
            ))
        })?;
        let pat_len = i32::try_from(pattern.len()).map_err(|_| {
            TallyError::BackendUnavailable("pattern exceeds the kernel's 32-bit length".into())
        })?;

        let session = DeviceSession::open()?;
        let queue = &session.queue;

        // Zero-length buffers are invalid; the kernel reads at most textLen bytes
        let text_host: Cow<'_, [u8]> = if text.is_empty() {
            Cow::Owned(vec![0])
        } else {
            Cow::Borrowed(text)
        };

        let text_buf = Buffer::<u8>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().read_only())
            .len(text_host.len())
            .copy_host_slice(&text_host)
            .build()
            .map_err(|e| unavailable("cannot allocate text buffer", e))?;
        let pattern_buf = Buffer::<u8>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().read_only())
            .len(pattern.len())
            .copy_host_slice(pattern)
            .build()
            .map_err(|e| unavailable("cannot allocate pattern buffer", e))?;
        let count_buf = Buffer::<i32>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().read_write())
            .len(1)
            .build()
            .map_err(|e| unavailable("cannot allocate counter buffer", e))?;
        count_buf
            .write(&[0i32][..])
            .enq()
            .map_err(|e| unavailable("cannot zero counter", e))?;

        let kernel_source = loader.load();
        debug!(origin = %kernel_source.origin, "building kernel");
        // ocl folds the per-device build log into the error message
        let program = Program::builder()
            .src(kernel_source.source.as_ref())
            .devices(session.device)
            .build(&session.context)
            .map_err(|e| unavailable("kernel build failed", e))?;

        let work_items = (text.len() + 1).saturating_sub(pattern.len()).max(1);
        let kernel = Kernel::builder()
            .program(&program)
            .name(KERNEL_NAME)
            .queue(queue.clone())
            .global_work_size(work_items)
            .arg(&text_buf)
            .arg(text_len)
            .arg(&pattern_buf)
            .arg(pat_len)
            .arg(&count_buf)
            .build()
            .map_err(|e| unavailable("cannot create kernel", e))?;

        debug!(work_items, "launching count kernel");
        // SAFETY: every argument is bound above, and the kernel bounds-checks
        // each work-item against textLen before reading.
        unsafe {
            kernel
                .enq()
                .map_err(|e| unavailable("kernel launch failed", e))?;
        }
        queue
            .finish()
            .map_err(|e| unavailable("kernel execution failed", e))?;

        let mut out = vec![0i32; 1];
        count_buf
            .read(&mut out)
            .enq()
            .map_err(|e| unavailable("cannot read counter", e))?;

        u64::try_from(out[0]).map_err(|_| {
            TallyError::BackendUnavailable(format!("device counter overflowed ({})", out[0]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::serial::count_occurrences;

    /// Device count, or `None` when no device is reachable so the check skips.
    fn on_device(text: &[u8], pattern: &[u8]) -> Option<i64> {
        match scan_device(text, pattern) {
            Ok(r) => Some(r.count),
            Err(TallyError::BackendUnavailable(reason)) => {
                eprintln!("skipping device check: {reason}");
                None
            }
            Err(e) => panic!("unexpected device error: {e}"),
        }
    }

    #[cfg(not(feature = "opencl"))]
    #[test]
    fn unavailable_without_feature() {
        let err = scan_device(b"aaaa", b"aa").unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("opencl"));
    }

    #[test]
    fn agrees_with_serial_when_device_present() {
        let cases: [(&[u8], &[u8]); 6] = [
            (b"aaaa", b"aa"),
            (b"hello world", b"xyz"),
            (b"ab", b"abcd"),
            (b"", b"a"),
            (b"ab\ncd", b"b\nc"),
            (b"the quick brown fox jumps over the lazy dog the end", b"the"),
        ];
        for (text, pattern) in cases {
            let Some(count) = on_device(text, pattern) else {
                return;
            };
            let expected = i64::try_from(count_occurrences(text, pattern)).unwrap();
            assert_eq!(count, expected, "text={text:?} pattern={pattern:?}");
        }
    }

    #[test]
    fn device_scanner_reports_gpu_method() {
        assert_eq!(DeviceScanner::default().method(), Method::ParallelGpu);
    }
}

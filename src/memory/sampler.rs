//! Heap samplers.
//!
//! The governor reads heap usage through a port so tests can inject a
//! deterministic sampler. The default reads resident pages from
//! `/proc/self/statm`.

use std::sync::atomic::{AtomicU64, Ordering};

/// One heap usage observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapSample {
    pub used_bytes: u64,
}

/// Port over heap usage measurement.
pub trait HeapSampler: Send + Sync + 'static {
    /// Current usage, `None` when the platform offers no reading.
    fn sample(&self) -> Option<HeapSample>;

    /// Sampler name for logging.
    fn sampler_name(&self) -> &'static str;
}

/// Resident-set sampler backed by `/proc/self/statm`.
pub struct ProcStatmSampler {
    page_size: u64,
}

impl ProcStatmSampler {
    pub fn new() -> Self {
        // SAFETY: sysconf with a valid name has no preconditions.
        #[allow(unsafe_code)]
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        Self {
            page_size: if page_size > 0 { page_size as u64 } else { 4096 },
        }
    }
}

impl Default for ProcStatmSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapSampler for ProcStatmSampler {
    fn sample(&self) -> Option<HeapSample> {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        // Second field is resident pages.
        let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some(HeapSample {
            used_bytes: resident_pages * self.page_size,
        })
    }

    fn sampler_name(&self) -> &'static str {
        "proc-statm"
    }
}

/// Deterministic sampler for tests: reports whatever was last set.
#[derive(Debug, Default)]
pub struct FixedSampler {
    used_bytes: AtomicU64,
}

impl FixedSampler {
    pub fn new(used_bytes: u64) -> Self {
        Self {
            used_bytes: AtomicU64::new(used_bytes),
        }
    }

    pub fn set(&self, used_bytes: u64) {
        self.used_bytes.store(used_bytes, Ordering::Relaxed);
    }
}

impl HeapSampler for FixedSampler {
    fn sample(&self) -> Option<HeapSample> {
        Some(HeapSample {
            used_bytes: self.used_bytes.load(Ordering::Relaxed),
        })
    }

    fn sampler_name(&self) -> &'static str {
        "fixed"
    }
}

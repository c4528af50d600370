//! The memory governor.
//!
//! Samples heap usage on an interval, maintains the pressure flag with
//! hysteresis (set at the threshold, cleared a margin below it), and
//! suggests throttled batch sizes to the publisher. Transitions emit log
//! events; the flag itself is a plain atomic readable from any stage.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::defaults::PRESSURE_HYSTERESIS;
use crate::config::MemoryConfig;
use crate::memory::sampler::HeapSampler;
use crate::metrics::PipelineMetrics;

pub struct MemoryGovernor {
    config: MemoryConfig,
    sampler: Box<dyn HeapSampler>,
    metrics: Arc<PipelineMetrics>,
    pressured: AtomicBool,
    /// Latest usage ratio, stored as f64 bits.
    last_ratio: AtomicU64,
}

impl MemoryGovernor {
    pub fn new(
        config: MemoryConfig,
        sampler: Box<dyn HeapSampler>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            config,
            sampler,
            metrics,
            pressured: AtomicBool::new(false),
            last_ratio: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Whether the pressure flag is currently set.
    pub fn under_pressure(&self) -> bool {
        self.pressured.load(Ordering::Relaxed)
    }

    /// Latest sampled heap usage ratio.
    pub fn usage_ratio(&self) -> f64 {
        f64::from_bits(self.last_ratio.load(Ordering::Relaxed))
    }

    /// Effective batch-record bound under the current pressure state.
    ///
    /// Under pressure, the default shrinks by
    /// `clamp(1 / (usage / threshold), min_throttled / default, 1)` with a
    /// floor of `min_throttled_batch_size`.
    pub fn optimal_batch_size(&self, default_size: usize) -> usize {
        if !self.config.enabled
            || !self.config.enable_batch_throttling
            || !self.under_pressure()
            || default_size == 0
        {
            return default_size;
        }

        let ratio = self.usage_ratio();
        if ratio <= 0.0 {
            return default_size;
        }

        let floor = self.config.min_throttled_batch_size.min(default_size);
        let low = floor as f64 / default_size as f64;
        let factor = (self.config.pressure_threshold / ratio).clamp(low, 1.0);
        let throttled = (default_size as f64 * factor).floor() as usize;
        throttled.max(floor)
    }

    /// Take one sample and update the flag. Split out from [`run`] so
    /// tests drive it deterministically.
    pub fn poll_once(&self) {
        if !self.config.enabled {
            return;
        }
        let Some(sample) = self.sampler.sample() else {
            debug!(sampler = self.sampler.sampler_name(), "Heap sampler returned no reading");
            return;
        };

        let ratio = sample.used_bytes as f64 / self.config.heap_budget_bytes as f64;
        self.last_ratio.store(ratio.to_bits(), Ordering::Relaxed);

        let was_pressured = self.pressured.load(Ordering::Relaxed);
        if !was_pressured && ratio > self.config.pressure_threshold {
            self.pressured.store(true, Ordering::Relaxed);
            self.metrics
                .pressure_activations
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                ratio = ratio,
                threshold = self.config.pressure_threshold,
                "Memory pressure flag set"
            );
        } else if was_pressured && ratio < self.config.pressure_threshold - PRESSURE_HYSTERESIS {
            self.pressured.store(false, Ordering::Relaxed);
            info!(ratio = ratio, "Memory pressure flag cleared");
        }
    }

    /// Sampling loop; runs until cancellation.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("Memory governor disabled by config");
            return;
        }
        info!(
            interval_ms = self.config.check_interval_ms,
            budget_bytes = self.config.heap_budget_bytes,
            sampler = self.sampler.sampler_name(),
            "Memory governor started"
        );
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.check_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => self.poll_once(),
            }
        }
    }
}

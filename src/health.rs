//! Activity reporting.
//!
//! Health here is an observable, not a gate: the report always says `UP`
//! and surfaces counters. Delivery loss, parse failures, and memory
//! pressure are visible in the snapshot and the logs; nothing flips a
//! status that would take the worker out of rotation while it is still
//! making progress.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::defaults::ACTIVITY_REPORT_INTERVAL_SECS;
use crate::memory::MemoryGovernor;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};

/// One activity report.
#[derive(Debug, Clone)]
pub struct ActivityReport {
    /// Always `"UP"`.
    pub status: &'static str,
    pub uptime_secs: u64,
    pub under_pressure: bool,
    pub metrics: MetricsSnapshot,
}

/// Periodic always-UP activity reporter.
pub struct ActivityReporter {
    metrics: Arc<PipelineMetrics>,
    governor: Arc<MemoryGovernor>,
    started: Instant,
}

impl ActivityReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, governor: Arc<MemoryGovernor>) -> Self {
        Self {
            metrics,
            governor,
            started: Instant::now(),
        }
    }

    /// Current report.
    pub fn report(&self) -> ActivityReport {
        ActivityReport {
            status: "UP",
            uptime_secs: self.started.elapsed().as_secs(),
            under_pressure: self.governor.under_pressure(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// Log a report on an interval until cancellation.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(ACTIVITY_REPORT_INTERVAL_SECS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the immediate first tick; an empty report at startup is noise.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let report = self.report();
                    info!(
                        status = report.status,
                        uptime_secs = report.uptime_secs,
                        under_pressure = report.under_pressure,
                        summary = %report.metrics,
                        "Activity report"
                    );
                }
            }
        }
    }
}

//! Process-wide pipeline metrics.
//!
//! Counters are lock-free atomics, readable concurrently and mutated from
//! any stage. The snapshot type is what the activity reporter and the
//! final-statistics block print. None of this gates anything: failures are
//! visible here and in the logs, never as a health flip.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// All pipeline counters. One instance per process, shared by `Arc`.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    // Queue / message lifecycle
    pub messages_received: AtomicU64,
    pub messages_acked: AtomicU64,
    pub messages_failed: AtomicU64,
    pub messages_unparseable: AtomicU64,
    pub queue_poll_errors: AtomicU64,

    // Stage-1 transform
    pub lines_read: AtomicU64,
    pub parse_failures: AtomicU64,
    pub sanity_drops: AtomicU64,
    pub rssi_drops: AtomicU64,
    pub mac_drops: AtomicU64,
    pub hotspot_flagged: AtomicU64,
    pub hotspot_excluded: AtomicU64,
    pub hotspot_logged: AtomicU64,
    pub records_emitted: AtomicU64,

    // Delivery
    pub batches_submitted: AtomicU64,
    pub records_delivered: AtomicU64,
    pub records_lost: AtomicU64,
    pub delivery_retries: AtomicU64,
    pub partial_resubmits: AtomicU64,

    // Memory governor
    pub pressure_activations: AtomicU64,

    // Profiling accumulators (nanoseconds + sample counts)
    serialize_nanos: AtomicU64,
    serialize_samples: AtomicU64,
    flush_nanos: AtomicU64,
    flush_samples: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a serialization latency sample.
    pub fn record_serialize(&self, elapsed: Duration) {
        self.serialize_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.serialize_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch-flush latency sample.
    pub fn record_flush(&self, elapsed: Duration) {
        self.flush_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.flush_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            messages_received: load(&self.messages_received),
            messages_acked: load(&self.messages_acked),
            messages_failed: load(&self.messages_failed),
            messages_unparseable: load(&self.messages_unparseable),
            queue_poll_errors: load(&self.queue_poll_errors),
            lines_read: load(&self.lines_read),
            parse_failures: load(&self.parse_failures),
            sanity_drops: load(&self.sanity_drops),
            rssi_drops: load(&self.rssi_drops),
            mac_drops: load(&self.mac_drops),
            hotspot_flagged: load(&self.hotspot_flagged),
            hotspot_excluded: load(&self.hotspot_excluded),
            hotspot_logged: load(&self.hotspot_logged),
            records_emitted: load(&self.records_emitted),
            batches_submitted: load(&self.batches_submitted),
            records_delivered: load(&self.records_delivered),
            records_lost: load(&self.records_lost),
            delivery_retries: load(&self.delivery_retries),
            partial_resubmits: load(&self.partial_resubmits),
            pressure_activations: load(&self.pressure_activations),
            avg_serialize_micros: Self::avg_micros(
                load(&self.serialize_nanos),
                load(&self.serialize_samples),
            ),
            avg_flush_micros: Self::avg_micros(load(&self.flush_nanos), load(&self.flush_samples)),
        }
    }

    fn avg_micros(nanos: u64, samples: u64) -> f64 {
        if samples == 0 {
            0.0
        } else {
            nanos as f64 / samples as f64 / 1_000.0
        }
    }
}

/// Point-in-time metric values for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_acked: u64,
    pub messages_failed: u64,
    pub messages_unparseable: u64,
    pub queue_poll_errors: u64,
    pub lines_read: u64,
    pub parse_failures: u64,
    pub sanity_drops: u64,
    pub rssi_drops: u64,
    pub mac_drops: u64,
    pub hotspot_flagged: u64,
    pub hotspot_excluded: u64,
    pub hotspot_logged: u64,
    pub records_emitted: u64,
    pub batches_submitted: u64,
    pub records_delivered: u64,
    pub records_lost: u64,
    pub delivery_retries: u64,
    pub partial_resubmits: u64,
    pub pressure_activations: u64,
    pub avg_serialize_micros: f64,
    pub avg_flush_micros: f64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "messages: {} received, {} acked, {} failed | records: {} emitted, {} delivered, {} lost | drops: {} parse, {} sanity, {} rssi",
            self.messages_received,
            self.messages_acked,
            self.messages_failed,
            self.records_emitted,
            self.records_delivered,
            self.records_lost,
            self.parse_failures,
            self.sanity_drops,
            self.rssi_drops,
        )
    }
}

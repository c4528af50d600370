//! Canonical record serialization.
//!
//! One JSON object per record, newline-terminated. Field order follows the
//! `DeliveryRecord` struct; numeric precision is whatever round-trips
//! through `serde_json` unchanged, so serialize → parse → serialize is a
//! fixed point.

use std::sync::Arc;
use std::time::Instant;

use crate::metrics::PipelineMetrics;
use crate::types::{BatchRecord, Measurement};

/// Serializes measurements into delivery-ready payloads.
pub struct RecordSerializer {
    metrics: Arc<PipelineMetrics>,
    profile: bool,
}

impl RecordSerializer {
    pub fn new(metrics: Arc<PipelineMetrics>, profile: bool) -> Self {
        Self { metrics, profile }
    }

    /// Serialize one measurement for the given source message.
    ///
    /// Serialization of a validated measurement cannot fail: every field
    /// is a plain JSON-representable value.
    pub fn serialize(&self, message_id: &str, measurement: &Measurement) -> BatchRecord {
        let start = self.profile.then(Instant::now);

        let record = measurement.to_delivery_record();
        let mut payload = serde_json::to_vec(&record).unwrap_or_default();
        payload.push(b'\n');

        if let Some(start) = start {
            self.metrics.record_serialize(start.elapsed());
        }

        BatchRecord {
            message_id: message_id.to_string(),
            payload,
        }
    }
}

//! Delivery batches.
//!
//! A [`Batch`] is owned exclusively by one publisher until flush, at which
//! point ownership transfers to the delivery sink. It is never shared.

use std::time::Instant;

/// One serialized record plus the bookkeeping needed to report its
/// terminal outcome back to the ack coordinator.
#[derive(Debug, Clone)]
pub struct BatchRecord {
    /// Id of the queue message this record was derived from.
    pub message_id: String,
    /// Canonical serialized record, newline-terminated.
    pub payload: Vec<u8>,
}

impl BatchRecord {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// An ordered accumulation of serialized records bound for one delivery
/// stream submission.
#[derive(Debug)]
pub struct Batch {
    /// Records in accumulation order.
    pub records: Vec<BatchRecord>,
    /// Approximate payload size (sum of record lengths).
    pub approx_bytes: usize,
    /// When the first record was admitted (age bound anchor).
    pub created_at: Instant,
    /// Correlation id for log lines and resubmission tracking. Partial
    /// resubmissions append `-r<N>`.
    pub correlation_id: String,
}

impl Batch {
    pub fn new(correlation_id: String) -> Self {
        Self {
            records: Vec::new(),
            approx_bytes: 0,
            created_at: Instant::now(),
            correlation_id,
        }
    }

    /// Admit a record. The caller enforces the batch bounds.
    pub fn push(&mut self, record: BatchRecord) {
        if self.records.is_empty() {
            self.created_at = Instant::now();
        }
        self.approx_bytes += record.len();
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Age of the oldest admitted record.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

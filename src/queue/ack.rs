//! Ack coordination: a queue message is deleted only after every record
//! derived from it has reached a terminal state (delivered, permanently
//! discarded, or lost after exhausted retries).
//!
//! The registry is sharded (`DashMap`); per-message counters are atomics,
//! so the hot paths never hold a lock across I/O. A crash before the
//! delete leaves the message to redeliver after its visibility timeout —
//! the at-least-once contract.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::metrics::PipelineMetrics;
use crate::queue::WorkQueue;
use crate::types::QueueMessage;

/// Per-message in-flight accounting.
struct MessageState {
    receipt: String,
    /// Records emitted so far by the transformer.
    emitted: AtomicU64,
    /// Total derived records, set once streaming completes; -1 while the
    /// message is still being read.
    expected: AtomicI64,
    /// Records that reached a terminal state.
    terminal: AtomicU64,
}

/// Tracks derived records per message and deletes the message at the end.
pub struct AckCoordinator {
    queue: Arc<dyn WorkQueue>,
    metrics: Arc<PipelineMetrics>,
    inflight: DashMap<String, Arc<MessageState>>,
}

impl AckCoordinator {
    pub fn new(queue: Arc<dyn WorkQueue>, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            queue,
            metrics,
            inflight: DashMap::new(),
        }
    }

    /// Start tracking a message. Idempotent across redeliveries: a second
    /// registration for the same id replaces the stale entry.
    pub fn register(&self, message: &QueueMessage) {
        let state = Arc::new(MessageState {
            receipt: message.receipt.clone(),
            emitted: AtomicU64::new(0),
            expected: AtomicI64::new(-1),
            terminal: AtomicU64::new(0),
        });
        if self.inflight.insert(message.id.clone(), state).is_some() {
            debug!(message_id = %message.id, "Replacing stale ack entry (redelivery)");
        }
    }

    /// Count one record handed to the publisher for this message.
    pub fn record_emitted(&self, message_id: &str) {
        if let Some(state) = self.inflight.get(message_id) {
            state.emitted.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Streaming finished: fix the expected record count. The message
    /// completes now if deliveries already drained (or nothing was
    /// emitted).
    pub async fn seal(&self, message_id: &str) {
        let state = match self.inflight.get(message_id) {
            Some(entry) => Arc::clone(entry.value()),
            None => return,
        };
        let emitted = state.emitted.load(Ordering::SeqCst) as i64;
        state.expected.store(emitted, Ordering::SeqCst);
        self.try_complete(message_id, &state).await;
    }

    /// Count `count` records from this message reaching a terminal state.
    pub async fn record_terminal(&self, message_id: &str, count: u64) {
        let state = match self.inflight.get(message_id) {
            Some(entry) => Arc::clone(entry.value()),
            None => return,
        };
        state.terminal.fetch_add(count, Ordering::SeqCst);
        self.try_complete(message_id, &state).await;
    }

    /// Processing failed mid-stream: stop tracking without deleting, so
    /// the message redelivers after its visibility timeout.
    pub fn abandon(&self, message_id: &str) {
        if self.inflight.remove(message_id).is_some() {
            self.metrics.messages_failed.fetch_add(1, Ordering::Relaxed);
            debug!(message_id = %message_id, "Message abandoned for redelivery");
        }
    }

    /// The message is permanently unprocessable (unparseable body,
    /// oversize object): delete it so it cannot poison the queue.
    pub async fn resolve_unprocessable(&self, message_id: &str) {
        let Some((_, state)) = self.inflight.remove(message_id) else {
            return;
        };
        self.delete(message_id, &state.receipt).await;
    }

    /// Number of messages currently tracked.
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    /// Delete the message if every derived record is terminal.
    async fn try_complete(&self, message_id: &str, state: &MessageState) {
        let expected = state.expected.load(Ordering::SeqCst);
        if expected < 0 || (state.terminal.load(Ordering::SeqCst) as i64) < expected {
            return;
        }
        // First caller to remove the entry performs the delete; the map
        // remove is the linearization point.
        if self.inflight.remove(message_id).is_some() {
            self.delete(message_id, &state.receipt).await;
        }
    }

    async fn delete(&self, message_id: &str, receipt: &str) {
        match self.queue.delete(receipt).await {
            Ok(()) => {
                self.metrics.messages_acked.fetch_add(1, Ordering::Relaxed);
                debug!(message_id = %message_id, "Message acked");
            }
            Err(e) => {
                // The message will redeliver; downstream records were
                // already delivered, which at-least-once permits.
                warn!(message_id = %message_id, error = %e, "Failed to delete message");
            }
        }
    }
}

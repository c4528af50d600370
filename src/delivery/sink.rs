//! Delivery-stream submission with classified retry.
//!
//! The sink's contract to its caller is unconditional success: every
//! failure is absorbed here, counted, and resolved as a terminal outcome
//! for the affected records. The retry protocol:
//!
//! - partial failure → the failed subset resubmits as a new batch after a
//!   fixed short delay, with a `-r<N>` correlation suffix;
//! - whole-batch retriable error → exponential backoff with ±25% jitter,
//!   capped, up to `max_retries`;
//! - permanent or unknown error → the batch is lost, counted, logged.
//!
//! Waits before a submission are cancellable (shutdown grace expiry); an
//! in-flight network call is never cancelled.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::DeliveryConfig;
use crate::error::{classify_delivery_error, DeliveryError, DeliveryErrorKind};
use crate::metrics::PipelineMetrics;
use crate::queue::AckCoordinator;
use crate::types::{Batch, BatchRecord};

use super::retry::Backoff;

/// Per-record outcome of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    Delivered,
    Failed { code: String, message: String },
}

/// Port over the downstream append-only delivery stream.
#[async_trait]
pub trait DeliveryStream: Send + Sync + 'static {
    /// Submit a batch; on `Ok`, the status vector is positional and must
    /// have one entry per submitted record.
    async fn put_records(
        &self,
        stream_name: &str,
        correlation_id: &str,
        records: &[BatchRecord],
    ) -> Result<Vec<RecordStatus>, DeliveryError>;
}

/// Absorbing delivery sink.
pub struct DeliverySink {
    stream: Arc<dyn DeliveryStream>,
    config: DeliveryConfig,
    acks: Arc<AckCoordinator>,
    metrics: Arc<PipelineMetrics>,
    backoff: Backoff,
    drain: CancellationToken,
    profile: bool,
}

impl DeliverySink {
    pub fn new(
        stream: Arc<dyn DeliveryStream>,
        config: DeliveryConfig,
        acks: Arc<AckCoordinator>,
        metrics: Arc<PipelineMetrics>,
        profile: bool,
    ) -> Self {
        let backoff = Backoff::new(config.retry_backoff_ms);
        Self {
            stream,
            config,
            acks,
            metrics,
            backoff,
            drain: CancellationToken::new(),
            profile,
        }
    }

    /// Token that, once cancelled, converts pending retry waits into
    /// counted losses. Cancelled by the runtime when the shutdown grace
    /// expires.
    pub fn drain_token(&self) -> CancellationToken {
        self.drain.clone()
    }

    /// Deliver one batch to the stream. Never fails upstream.
    pub async fn deliver(&self, batch: Batch) {
        let base_correlation = batch.correlation_id.clone();
        let mut records = batch.records;
        let mut correlation = base_correlation.clone();
        let mut attempt: u32 = 0;
        let mut resubmission: u32 = 0;

        loop {
            let start = self.profile.then(Instant::now);
            let outcome = self
                .stream
                .put_records(&self.config.stream_name, &correlation, &records)
                .await;
            if let Some(start) = start {
                self.metrics.record_flush(start.elapsed());
            }

            match outcome {
                Ok(statuses) => {
                    let (delivered, failed) = partition_by_status(records, &statuses);
                    self.settle_delivered(&delivered).await;

                    if failed.is_empty() {
                        debug!(
                            correlation_id = %correlation,
                            delivered = delivered.len(),
                            "Batch delivered"
                        );
                        return;
                    }

                    if attempt >= self.config.max_retries {
                        self.lose(failed, &correlation, "partial-failure retry budget exhausted")
                            .await;
                        return;
                    }

                    attempt += 1;
                    resubmission += 1;
                    self.metrics.partial_resubmits.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        correlation_id = %correlation,
                        failed = failed.len(),
                        delivered = delivered.len(),
                        "Partial batch failure, resubmitting failed subset"
                    );
                    correlation = format!("{base_correlation}-r{resubmission}");
                    records = failed;

                    if !self
                        .wait(Duration::from_millis(self.config.partial_retry_delay_ms))
                        .await
                    {
                        self.lose(records, &correlation, "shutdown during resubmission wait")
                            .await;
                        return;
                    }
                }
                Err(err) => match classify_delivery_error(&err) {
                    DeliveryErrorKind::Permanent => {
                        self.lose(records, &correlation, &format!("permanent: {err}")).await;
                        return;
                    }
                    DeliveryErrorKind::Unknown => {
                        self.lose(records, &correlation, &format!("unclassified: {err}"))
                            .await;
                        return;
                    }
                    DeliveryErrorKind::Retriable => {
                        if attempt >= self.config.max_retries {
                            self.lose(records, &correlation, "retry budget exhausted").await;
                            return;
                        }
                        let delay = self.backoff.delay(attempt);
                        attempt += 1;
                        self.metrics.delivery_retries.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            correlation_id = %correlation,
                            attempt = attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Retriable delivery failure, backing off"
                        );
                        if !self.wait(delay).await {
                            self.lose(records, &correlation, "shutdown during retry wait").await;
                            return;
                        }
                    }
                },
            }
        }
    }

    /// Cancellable pre-submission wait; false when draining.
    async fn wait(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.drain.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn settle_delivered(&self, delivered: &[BatchRecord]) {
        if delivered.is_empty() {
            return;
        }
        self.metrics
            .records_delivered
            .fetch_add(delivered.len() as u64, Ordering::Relaxed);
        for (message_id, count) in count_by_message(delivered) {
            self.acks.record_terminal(&message_id, count).await;
        }
    }

    /// Losses are terminal too: the records are gone, the message must
    /// still be able to ack.
    async fn lose(&self, records: Vec<BatchRecord>, correlation: &str, reason: &str) {
        if records.is_empty() {
            return;
        }
        self.metrics
            .records_lost
            .fetch_add(records.len() as u64, Ordering::Relaxed);
        error!(
            correlation_id = %correlation,
            lost = records.len(),
            reason = reason,
            "Records lost"
        );
        for (message_id, count) in count_by_message(&records) {
            self.acks.record_terminal(&message_id, count).await;
        }
    }
}

/// Split records into delivered and failed by the positional status
/// vector. A missing status is treated as a failure.
fn partition_by_status(
    records: Vec<BatchRecord>,
    statuses: &[RecordStatus],
) -> (Vec<BatchRecord>, Vec<BatchRecord>) {
    let mut delivered = Vec::with_capacity(records.len());
    let mut failed = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        match statuses.get(index) {
            Some(RecordStatus::Delivered) => delivered.push(record),
            _ => failed.push(record),
        }
    }
    (delivered, failed)
}

fn count_by_message(records: &[BatchRecord]) -> HashMap<String, u64> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for record in records {
        *counts.entry(record.message_id.clone()).or_default() += 1;
    }
    counts
}

//! Work-queue port and long-poll consumer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::defaults::POLL_ERROR_BACKOFF_MS;
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::metrics::PipelineMetrics;
use crate::types::QueueMessage;

/// Port over the upstream work queue.
///
/// Implementations must be safe to share across tasks. Deleting a message
/// is idempotent from the pipeline's point of view: deleting an already
/// deleted or re-exposed receipt is not an error worth surfacing.
#[async_trait]
pub trait WorkQueue: Send + Sync + 'static {
    /// Long-poll for up to `max_messages`, holding them invisible for
    /// `visibility_timeout`.
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Delete a message by receipt handle.
    async fn delete(&self, receipt: &str) -> Result<(), QueueError>;

    /// Human-readable queue name for logging.
    fn queue_name(&self) -> &str;
}

/// Long-poll loop feeding the bounded record channel.
///
/// Backpressure is structural: the loop awaits channel capacity before the
/// next poll, so a saturated pipeline slows the poll rate instead of
/// accumulating messages in memory.
pub struct QueueConsumer {
    queue: Arc<dyn WorkQueue>,
    config: QueueConfig,
    metrics: Arc<PipelineMetrics>,
}

impl QueueConsumer {
    pub fn new(queue: Arc<dyn WorkQueue>, config: QueueConfig, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            queue,
            config,
            metrics,
        }
    }

    /// Run until cancellation. Never returns early on queue errors: a
    /// transient outage backs off and re-polls, a permission failure is
    /// logged and the loop continues (deployments fix policies without a
    /// restart).
    pub async fn run(self, tx: mpsc::Sender<QueueMessage>, cancel: CancellationToken) {
        let visibility = Duration::from_secs(self.config.visibility_timeout_secs);
        let wait = Duration::from_secs(self.config.wait_time_secs);

        info!(queue = self.queue.queue_name(), "Queue consumer started");

        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Queue consumer stopping on shutdown signal");
                    break;
                }
                result = self.queue.receive(self.config.max_messages_per_poll, visibility, wait) => {
                    match result {
                        Ok(batch) => batch,
                        Err(QueueError::Unavailable(reason)) => {
                            self.metrics
                                .queue_poll_errors
                                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                            warn!(reason = %reason, "Queue unavailable, backing off");
                            if self.backoff(&cancel).await {
                                break;
                            }
                            continue;
                        }
                        Err(QueueError::PermissionDenied(reason)) => {
                            self.metrics
                                .queue_poll_errors
                                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                            error!(reason = %reason, "Queue permission denied — check credentials/policy");
                            if self.backoff(&cancel).await {
                                break;
                            }
                            continue;
                        }
                    }
                }
            };

            if batch.is_empty() {
                debug!("Poll returned no messages");
                continue;
            }

            debug!(count = batch.len(), "Poll returned messages");
            for message in batch {
                self.metrics
                    .messages_received
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                // Awaiting capacity here is the backpressure point: a full
                // channel stalls the next poll, leaving further messages on
                // the queue under their visibility timeout.
                if tx.send(message).await.is_err() {
                    info!("Record channel closed, queue consumer exiting");
                    return;
                }
            }
        }
    }

    /// Sleep the error backoff; returns true when cancelled mid-wait.
    async fn backoff(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(Duration::from_millis(POLL_ERROR_BACKOFF_MS)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted queue: pops one pre-canned response per receive call.
    struct ScriptedQueue {
        responses: Mutex<Vec<Result<Vec<QueueMessage>, QueueError>>>,
    }

    #[async_trait]
    impl WorkQueue for ScriptedQueue {
        async fn receive(
            &self,
            _max: usize,
            _visibility: Duration,
            _wait: Duration,
        ) -> Result<Vec<QueueMessage>, QueueError> {
            let next = {
                let mut responses = self.responses.lock().unwrap();
                if responses.is_empty() {
                    None
                } else {
                    Some(responses.remove(0))
                }
            };
            match next {
                // Park forever once the script runs out.
                None => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
                Some(result) => result,
            }
        }

        async fn delete(&self, _receipt: &str) -> Result<(), QueueError> {
            Ok(())
        }

        fn queue_name(&self) -> &str {
            "scripted"
        }
    }

    fn message(id: &str) -> QueueMessage {
        QueueMessage {
            id: id.to_string(),
            receipt: format!("r-{id}"),
            body: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn forwards_messages_and_survives_transient_errors() {
        let queue = Arc::new(ScriptedQueue {
            responses: Mutex::new(vec![
                Ok(vec![message("m1")]),
                Err(QueueError::Unavailable("down".into())),
                Ok(vec![message("m2"), message("m3")]),
            ]),
        });
        let metrics = Arc::new(PipelineMetrics::new());
        let consumer = QueueConsumer::new(queue, QueueConfig::default(), metrics.clone());
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(consumer.run(tx, cancel.clone()));

        tokio::time::pause();
        let mut seen = Vec::new();
        while seen.len() < 3 {
            tokio::select! {
                Some(msg) = rx.recv() => seen.push(msg.id),
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }
        assert_eq!(seen, vec!["m1", "m2", "m3"]);
        assert_eq!(
            metrics
                .queue_poll_errors
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );

        cancel.cancel();
        handle.await.unwrap();
    }
}

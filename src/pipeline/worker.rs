//! Per-message pipeline execution.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::delivery::BatchPublisher;
use crate::error::ObjectError;
use crate::ingest::{parse_upload_event, ObjectReader, StreamRouter};
use crate::metrics::PipelineMetrics;
use crate::queue::AckCoordinator;
use crate::transform::{RecordSerializer, RecordTransformer};
use crate::types::QueueMessage;

/// Runs one queue message through the full pipeline. Stateless across
/// messages; the worker pool shares a single instance.
pub struct MessageWorker {
    router: Arc<StreamRouter>,
    reader: Arc<ObjectReader>,
    transformer: Arc<RecordTransformer>,
    serializer: Arc<RecordSerializer>,
    publisher: Arc<BatchPublisher>,
    acks: Arc<AckCoordinator>,
    metrics: Arc<PipelineMetrics>,
}

impl MessageWorker {
    pub fn new(
        router: Arc<StreamRouter>,
        reader: Arc<ObjectReader>,
        transformer: Arc<RecordTransformer>,
        serializer: Arc<RecordSerializer>,
        publisher: Arc<BatchPublisher>,
        acks: Arc<AckCoordinator>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            router,
            reader,
            transformer,
            serializer,
            publisher,
            acks,
            metrics,
        }
    }

    /// Process one message end to end.
    ///
    /// Outcomes:
    /// - unparseable notification or permanently unreadable object: the
    ///   message is counted and deleted (a poison message must not loop);
    /// - transport failure mid-stream: the message is abandoned and will
    ///   redeliver after its visibility timeout;
    /// - otherwise: every surviving record is published and the ack
    ///   coordinator seals the message.
    pub async fn process(&self, message: QueueMessage) {
        self.acks.register(&message);

        let event = match parse_upload_event(&message.body) {
            Ok(event) => event,
            Err(err) => {
                self.metrics
                    .messages_unparseable
                    .fetch_add(1, Ordering::Relaxed);
                warn!(message_id = %message.id, error = %err, "Unparseable notification, deleting");
                self.acks.resolve_unprocessable(&message.id).await;
                return;
            }
        };

        let processor = self.router.processor_for(&event.stream_name);
        debug!(
            message_id = %message.id,
            object = %event.object_ref(),
            stream = %event.stream_name,
            processor = processor.name(),
            "Processing upload event"
        );

        let mut lines = match self.reader.open(&event).await {
            Ok(lines) => lines,
            Err(err @ (ObjectError::TooLarge { .. } | ObjectError::NotFound(_))) => {
                self.metrics
                    .messages_unparseable
                    .fetch_add(1, Ordering::Relaxed);
                warn!(message_id = %message.id, error = %err, "Object permanently unreadable, deleting");
                self.acks.resolve_unprocessable(&message.id).await;
                return;
            }
            Err(err @ ObjectError::Transport(_)) => {
                warn!(message_id = %message.id, error = %err, "Object open failed, leaving for redelivery");
                self.acks.abandon(&message.id);
                return;
            }
        };

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    self.metrics.lines_read.fetch_add(1, Ordering::Relaxed);
                    let raw = match processor.parse_line(&line) {
                        Ok(raw) => raw,
                        Err(err) => {
                            self.metrics.parse_failures.fetch_add(1, Ordering::Relaxed);
                            debug!(message_id = %message.id, error = %err, "Dropping unparseable line");
                            continue;
                        }
                    };
                    for measurement in self.transformer.apply(raw) {
                        let record = self.serializer.serialize(&message.id, &measurement);
                        self.acks.record_emitted(&message.id);
                        self.metrics.records_emitted.fetch_add(1, Ordering::Relaxed);
                        self.publisher.publish(record).await;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    // Records already published stay in flight; the
                    // redelivered message re-emits them, which
                    // at-least-once permits.
                    warn!(
                        message_id = %message.id,
                        lines = lines.lines_yielded(),
                        error = %err,
                        "Object stream failed mid-read, leaving for redelivery"
                    );
                    self.acks.abandon(&message.id);
                    return;
                }
            }
        }

        self.acks.seal(&message.id).await;
        debug!(
            message_id = %message.id,
            lines = lines.lines_yielded(),
            "Message streaming complete"
        );
    }
}

//! Batch assembly.
//!
//! The publisher owns the in-flight batch behind a mutex whose critical
//! section is a push or a swap, never I/O. Dispatch acquires an in-flight
//! permit first, so at most `max_in_flight_batches` deliveries run
//! concurrently and a saturated sink backpressures the publishing path.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DeliveryConfig;
use crate::delivery::sink::DeliverySink;
use crate::memory::MemoryGovernor;
use crate::metrics::PipelineMetrics;
use crate::types::{Batch, BatchRecord};

pub struct BatchPublisher {
    config: DeliveryConfig,
    governor: Arc<MemoryGovernor>,
    sink: Arc<DeliverySink>,
    metrics: Arc<PipelineMetrics>,
    current: Mutex<Batch>,
    in_flight: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl BatchPublisher {
    pub fn new(
        config: DeliveryConfig,
        governor: Arc<MemoryGovernor>,
        sink: Arc<DeliverySink>,
        metrics: Arc<PipelineMetrics>,
    ) -> Arc<Self> {
        let in_flight = Arc::new(Semaphore::new(config.max_in_flight_batches));
        Arc::new(Self {
            config,
            governor,
            sink,
            metrics,
            current: Mutex::new(Batch::new(new_correlation_id())),
            in_flight,
            tracker: TaskTracker::new(),
        })
    }

    /// Admit one record, flushing as the bounds dictate.
    ///
    /// A record larger than `max_batch_bytes` can never share a batch:
    /// whatever is accumulated flushes first, then the oversize record
    /// ships alone.
    pub async fn publish(&self, record: BatchRecord) {
        if record.len() > self.config.max_batch_bytes {
            warn!(
                bytes = record.len(),
                limit = self.config.max_batch_bytes,
                "Oversize record, shipping in a dedicated batch"
            );
            let prior = {
                let mut current = self.current.lock().await;
                (!current.is_empty()).then(|| swap_batch(&mut current))
            };
            if let Some(batch) = prior {
                self.dispatch(batch).await;
            }
            let mut solo = Batch::new(new_correlation_id());
            solo.push(record);
            self.dispatch(solo).await;
            return;
        }

        let effective_records = self
            .governor
            .optimal_batch_size(self.config.max_batch_records);

        let mut ready: Vec<Batch> = Vec::new();
        {
            let mut current = self.current.lock().await;
            if !current.is_empty()
                && current.approx_bytes + record.len() > self.config.max_batch_bytes
            {
                ready.push(swap_batch(&mut current));
            }
            current.push(record);
            if current.len() >= effective_records {
                ready.push(swap_batch(&mut current));
            }
        }
        for batch in ready {
            self.dispatch(batch).await;
        }
    }

    /// Force-flush the accumulated batch (age tick or shutdown).
    pub async fn flush(&self) {
        let batch = {
            let mut current = self.current.lock().await;
            (!current.is_empty()).then(|| swap_batch(&mut current))
        };
        if let Some(batch) = batch {
            self.dispatch(batch).await;
        }
    }

    /// Age-bound flusher; runs until cancellation.
    pub async fn run_age_flusher(self: Arc<Self>, cancel: CancellationToken) {
        let tick = Duration::from_millis((self.config.max_batch_age_ms / 4).max(50));
        let max_age = Duration::from_millis(self.config.max_batch_age_ms);
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let batch = {
                        let mut current = self.current.lock().await;
                        (!current.is_empty() && current.age() >= max_age)
                            .then(|| swap_batch(&mut current))
                    };
                    if let Some(batch) = batch {
                        debug!(records = batch.len(), "Age-bound flush");
                        self.dispatch(batch).await;
                    }
                }
            }
        }
    }

    /// Flush, then drain in-flight deliveries within the grace period.
    /// After the grace expires, pending retry waits convert to losses; the
    /// submissions already at the network call still complete.
    pub async fn shutdown(&self, grace: Duration) {
        self.flush().await;
        self.tracker.close();
        tokio::select! {
            _ = self.tracker.wait() => {
                info!("All in-flight deliveries drained");
            }
            _ = tokio::time::sleep(grace) => {
                warn!(grace_ms = grace.as_millis() as u64, "Shutdown grace expired, draining retry waits");
                self.sink.drain_token().cancel();
                self.tracker.wait().await;
            }
        }
    }

    /// Hand a batch to the sink on its own task, bounded by the in-flight
    /// permit. The producing path blocks here only when the sink is
    /// saturated; it never waits on retries.
    async fn dispatch(&self, batch: Batch) {
        self.metrics.batches_submitted.fetch_add(1, Ordering::Relaxed);
        let permit = match self.in_flight.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return, // semaphore closed: shutting down
        };
        let sink = Arc::clone(&self.sink);
        self.tracker.spawn(async move {
            sink.deliver(batch).await;
            drop(permit);
        });
    }
}

fn swap_batch(current: &mut Batch) -> Batch {
    std::mem::replace(current, Batch::new(new_correlation_id()))
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::delivery::sink::{DeliveryStream, RecordStatus};
    use crate::error::{DeliveryError, QueueError};
    use crate::memory::FixedSampler;
    use crate::queue::{AckCoordinator, WorkQueue};
    use crate::types::QueueMessage;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct NullQueue;

    #[async_trait]
    impl WorkQueue for NullQueue {
        async fn receive(
            &self,
            _max: usize,
            _visibility: Duration,
            _wait: Duration,
        ) -> Result<Vec<QueueMessage>, QueueError> {
            Ok(Vec::new())
        }
        async fn delete(&self, _receipt: &str) -> Result<(), QueueError> {
            Ok(())
        }
        fn queue_name(&self) -> &str {
            "null"
        }
    }

    #[derive(Default)]
    struct CapturingStream {
        batches: StdMutex<Vec<(String, usize, usize)>>,
    }

    #[async_trait]
    impl DeliveryStream for CapturingStream {
        async fn put_records(
            &self,
            _stream_name: &str,
            correlation_id: &str,
            records: &[BatchRecord],
        ) -> Result<Vec<RecordStatus>, DeliveryError> {
            let bytes: usize = records.iter().map(BatchRecord::len).sum();
            self.batches
                .lock()
                .unwrap()
                .push((correlation_id.to_string(), records.len(), bytes));
            Ok(vec![RecordStatus::Delivered; records.len()])
        }
    }

    fn publisher(
        config: DeliveryConfig,
    ) -> (Arc<BatchPublisher>, Arc<CapturingStream>) {
        let metrics = Arc::new(PipelineMetrics::new());
        let stream = Arc::new(CapturingStream::default());
        let acks = Arc::new(AckCoordinator::new(Arc::new(NullQueue), metrics.clone()));
        let sink = Arc::new(DeliverySink::new(
            stream.clone(),
            config.clone(),
            acks,
            metrics.clone(),
            false,
        ));
        let governor = Arc::new(MemoryGovernor::new(
            MemoryConfig::default(),
            Box::new(FixedSampler::new(0)),
            metrics.clone(),
        ));
        (
            BatchPublisher::new(config, governor, sink, metrics),
            stream,
        )
    }

    fn record(bytes: usize) -> BatchRecord {
        BatchRecord {
            message_id: "m".to_string(),
            payload: vec![b'x'; bytes],
        }
    }

    #[tokio::test]
    async fn flushes_at_record_bound() {
        let config = DeliveryConfig {
            max_batch_records: 3,
            ..DeliveryConfig::default()
        };
        let (publisher, stream) = publisher(config);

        for _ in 0..7 {
            publisher.publish(record(10)).await;
        }
        publisher.flush().await;
        publisher.shutdown(Duration::from_secs(1)).await;

        let batches = stream.batches.lock().unwrap();
        let sizes: Vec<usize> = batches.iter().map(|(_, n, _)| *n).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn no_batch_exceeds_byte_bound_at_submission() {
        let config = DeliveryConfig {
            max_batch_records: 100,
            max_batch_bytes: 100,
            ..DeliveryConfig::default()
        };
        let (publisher, stream) = publisher(config);

        for _ in 0..10 {
            publisher.publish(record(30)).await;
        }
        publisher.shutdown(Duration::from_secs(1)).await;

        let batches = stream.batches.lock().unwrap();
        assert!(!batches.is_empty());
        for (_, records, bytes) in batches.iter() {
            assert!(*bytes <= 100, "batch of {bytes} bytes exceeds bound");
            assert!(*records <= 100);
        }
        let total: usize = batches.iter().map(|(_, n, _)| n).sum();
        assert_eq!(total, 10);
    }

    #[tokio::test]
    async fn oversize_record_ships_alone() {
        let config = DeliveryConfig {
            max_batch_records: 100,
            max_batch_bytes: 50,
            ..DeliveryConfig::default()
        };
        let (publisher, stream) = publisher(config);

        publisher.publish(record(10)).await;
        publisher.publish(record(500)).await;
        publisher.shutdown(Duration::from_secs(1)).await;

        let batches = stream.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].1, 1); // the accumulated small record
        assert_eq!(batches[1].1, 1); // the oversize record, alone
        assert_eq!(batches[1].2, 500);
    }

    #[tokio::test]
    async fn shutdown_flushes_remainder() {
        let (publisher, stream) = publisher(DeliveryConfig::default());
        publisher.publish(record(10)).await;
        publisher.shutdown(Duration::from_secs(1)).await;
        assert_eq!(stream.batches.lock().unwrap().len(), 1);
    }
}

//! Pipeline runtime: construction graph and lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::PipelineConfig;
use crate::delivery::{BatchPublisher, DeliverySink, DeliveryStream};
use crate::health::ActivityReporter;
use crate::ingest::{
    CanonicalFeedProcessor, FeedProcessor, LegacyFeedProcessor, ObjectReader, ObjectStore,
    StreamRouter,
};
use crate::memory::{HeapSampler, MemoryGovernor};
use crate::metrics::PipelineMetrics;
use crate::pipeline::stats::PipelineStats;
use crate::pipeline::worker::MessageWorker;
use crate::queue::{AckCoordinator, QueueConsumer, WorkQueue};
use crate::transform::{RecordSerializer, RecordTransformer};
use crate::types::QueueMessage;

/// Owns every pipeline component, built once from the validated config and
/// the injected ports.
pub struct PipelineRuntime {
    config: PipelineConfig,
    queue: Arc<dyn WorkQueue>,
    metrics: Arc<PipelineMetrics>,
    governor: Arc<MemoryGovernor>,
    publisher: Arc<BatchPublisher>,
    worker: Arc<MessageWorker>,
    reporter: Arc<ActivityReporter>,
}

impl PipelineRuntime {
    /// Wire the construction graph.
    pub fn new(
        config: PipelineConfig,
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn ObjectStore>,
        stream: Arc<dyn DeliveryStream>,
        sampler: Box<dyn HeapSampler>,
    ) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        let profile = config.memory.enable_performance_profiling;

        let governor = Arc::new(MemoryGovernor::new(
            config.memory.clone(),
            sampler,
            metrics.clone(),
        ));

        let acks = Arc::new(AckCoordinator::new(queue.clone(), metrics.clone()));
        let sink = Arc::new(DeliverySink::new(
            stream,
            config.delivery.clone(),
            acks.clone(),
            metrics.clone(),
            profile,
        ));
        let publisher = BatchPublisher::new(
            config.delivery.clone(),
            governor.clone(),
            sink,
            metrics.clone(),
        );

        let processors: Vec<Box<dyn FeedProcessor>> = vec![Box::new(LegacyFeedProcessor::new(
            config.feeds.legacy_streams.clone(),
        ))];
        let router = Arc::new(StreamRouter::new(
            processors,
            Box::new(CanonicalFeedProcessor),
        ));
        let reader = Arc::new(ObjectReader::new(store, config.object.max_file_size_bytes));
        let transformer = Arc::new(RecordTransformer::new(
            config.filtering.clone(),
            metrics.clone(),
        ));
        let serializer = Arc::new(RecordSerializer::new(metrics.clone(), profile));

        let worker = Arc::new(MessageWorker::new(
            router,
            reader,
            transformer,
            serializer,
            publisher.clone(),
            acks,
            metrics.clone(),
        ));

        let reporter = Arc::new(ActivityReporter::new(metrics.clone(), governor.clone()));

        Self {
            config,
            queue,
            metrics,
            governor,
            publisher,
            worker,
            reporter,
        }
    }

    /// Shared metrics handle (for reporting and tests).
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Run until `cancel` fires, then execute the stop sequence:
    /// stop the poller, drain the record channel, force-flush batches, and
    /// await in-flight deliveries up to the shutdown grace.
    pub async fn run(&self, cancel: CancellationToken) -> PipelineStats {
        info!(
            workers = self.config.queue.workers,
            channel_capacity = self.config.queue.channel_capacity,
            stream = %self.config.delivery.stream_name,
            "Pipeline starting"
        );

        // Background services stop on their own token so the workers can
        // finish draining first.
        let services_cancel = CancellationToken::new();
        let governor_task = tokio::spawn(self.governor.clone().run(services_cancel.clone()));
        let flusher_task = tokio::spawn(
            self.publisher
                .clone()
                .run_age_flusher(services_cancel.clone()),
        );
        let reporter_task = tokio::spawn(self.reporter.clone().run(services_cancel.clone()));

        // Stage 1: poller. The consumer owns the only sender; when it
        // stops, channel closure is the drain signal for the workers.
        let (tx, rx) = mpsc::channel::<QueueMessage>(self.config.queue.channel_capacity);
        let consumer = QueueConsumer::new(
            self.queue.clone(),
            self.config.queue.clone(),
            self.metrics.clone(),
        );
        let consumer_task = tokio::spawn(consumer.run(tx, cancel.clone()));

        // Stage 2: worker pool over the shared receiver.
        let rx = Arc::new(Mutex::new(rx));
        let mut worker_tasks = Vec::with_capacity(self.config.queue.workers);
        for index in 0..self.config.queue.workers {
            let rx = rx.clone();
            let worker = self.worker.clone();
            worker_tasks.push(tokio::spawn(async move {
                loop {
                    let message = { rx.lock().await.recv().await };
                    match message {
                        Some(message) => worker.process(message).await,
                        None => break,
                    }
                }
                tracing::debug!(worker = index, "Worker drained");
            }));
        }

        // Wait for the poller to stop (shutdown signal), then for the
        // workers to drain whatever is already in the channel.
        let _ = consumer_task.await;
        for task in worker_tasks {
            let _ = task.await;
        }

        // Stage 3/4: force-flush and await deliveries within the grace.
        self.publisher
            .shutdown(Duration::from_millis(self.config.queue.shutdown_grace_ms))
            .await;

        services_cancel.cancel();
        let _ = governor_task.await;
        let _ = flusher_task.await;
        let _ = reporter_task.await;

        let stats = PipelineStats::from(&self.metrics.snapshot());
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("FINAL STATISTICS");
        info!("   Messages received:   {}", stats.messages_received);
        info!("   Messages acked:      {}", stats.messages_acked);
        info!("   Messages failed:     {}", stats.messages_failed);
        info!("   Records emitted:     {}", stats.records_emitted);
        info!("   Records delivered:   {}", stats.records_delivered);
        info!("   Records lost:        {}", stats.records_lost);
        info!("   Batches submitted:   {}", stats.batches_submitted);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        stats
    }
}

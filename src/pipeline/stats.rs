//! Pipeline run statistics.

use crate::metrics::MetricsSnapshot;

/// Summary of one pipeline run, printed at shutdown.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub messages_received: u64,
    pub messages_acked: u64,
    pub messages_failed: u64,
    pub messages_unparseable: u64,
    pub records_emitted: u64,
    pub records_delivered: u64,
    pub records_lost: u64,
    pub batches_submitted: u64,
    pub delivery_retries: u64,
    pub partial_resubmits: u64,
}

impl From<&MetricsSnapshot> for PipelineStats {
    fn from(snap: &MetricsSnapshot) -> Self {
        Self {
            messages_received: snap.messages_received,
            messages_acked: snap.messages_acked,
            messages_failed: snap.messages_failed,
            messages_unparseable: snap.messages_unparseable,
            records_emitted: snap.records_emitted,
            records_delivered: snap.records_delivered,
            records_lost: snap.records_lost,
            batches_submitted: snap.batches_submitted,
            delivery_retries: snap.delivery_retries,
            partial_resubmits: snap.partial_resubmits,
        }
    }
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline: {} messages ({} acked, {} failed, {} unparseable), {} records emitted ({} delivered, {} lost), {} batches ({} retries, {} resubmits)",
            self.messages_received,
            self.messages_acked,
            self.messages_failed,
            self.messages_unparseable,
            self.records_emitted,
            self.records_delivered,
            self.records_lost,
            self.batches_submitted,
            self.delivery_retries,
            self.partial_resubmits,
        )
    }
}

//! Batch assembly and delivery-stream submission.
//!
//! The publisher accumulates serialized records into size-, byte-, and
//! age-bounded batches; the sink submits them with partial-batch
//! resubmission and classified retry. Failures never propagate upstream:
//! the sink absorbs them, counts losses, and reports terminal outcomes to
//! the ack coordinator.

mod batcher;
mod retry;
mod sink;

pub use batcher::BatchPublisher;
pub use retry::Backoff;
pub use sink::{DeliverySink, DeliveryStream, RecordStatus};

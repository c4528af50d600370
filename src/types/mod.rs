//! Shared domain types for the ingestion pipeline and positioning engine.

mod batch;
mod event;
mod measurement;
mod positioning;

pub use batch::{Batch, BatchRecord};
pub use event::{QueueMessage, UploadEvent};
pub use measurement::{DeliveryRecord, Measurement};
pub use positioning::{ApRecord, ApStatus, Position, ScanObservation};

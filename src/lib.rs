//! WiFi Locate: Measurement Ingestion & Positioning Intelligence
//!
//! Two cooperating cores in one crate:
//!
//! - **Ingestion pipeline**: streams file-upload notifications from a work
//!   queue, reads the referenced blob line by line, filters and normalizes
//!   each WiFi measurement, and publishes batches to a downstream delivery
//!   stream with retry, jitter, and memory-aware throttling.
//! - **Positioning engine**: classifies a scan context by four orthogonal
//!   factors and fuses the outputs of five positioning algorithms
//!   (Proximity, RSSI-Ratio, Weighted Centroid, Trilateration, Maximum
//!   Likelihood) into a single position estimate.
//!
//! External collaborators (object store, work queue, delivery stream, AP
//! reference database) are abstracted as ports; local filesystem adapters
//! ship in [`adapters`] so the full loop runs without cloud SDKs.

pub mod adapters;
pub mod config;
pub mod delivery;
pub mod error;
pub mod health;
pub mod ingest;
pub mod memory;
pub mod metrics;
pub mod pipeline;
pub mod positioning;
pub mod queue;
pub mod transform;
pub mod types;

// Re-export the configuration root
pub use config::PipelineConfig;

// Re-export commonly used types
pub use types::{
    ApRecord, ApStatus, Batch, DeliveryRecord, Measurement, Position, QueueMessage,
    ScanObservation, UploadEvent,
};

// Re-export pipeline entry points
pub use pipeline::{PipelineRuntime, PipelineStats};

// Re-export the positioning engine
pub use positioning::{FactorSet, FusionReport, PositioningEngine};

// Re-export error kinds
pub use error::{
    ConfigError, DeliveryError, EventParseError, ObjectError, PositioningError, QueueError,
};

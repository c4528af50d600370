//! Local filesystem adapters for the three pipeline ports.
//!
//! These back the service in development and integration testing; a
//! production deployment supplies its own cloud-SDK adapters behind the
//! same ports.

mod local;

pub use local::{FileDeliveryStream, FsObjectStore, SpoolQueue};

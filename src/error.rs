//! Typed error surface for the pipeline and positioning engine.
//!
//! Four semantic kinds run through the system: transient errors are retried
//! by the component that owns the retry schedule, permanent errors are
//! counted and absorbed at the boundary that observes them, validation
//! errors drop the offending datum without failing the containing message,
//! and fatal errors exist only at startup (missing or out-of-range
//! configuration, unreachable dependency).

use std::path::PathBuf;
use thiserror::Error;

/// Work-queue errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue is temporarily unreachable; the poll loop backs off and
    /// retries.
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    /// Credentials or policy reject the operation. The poll loop logs and
    /// continues; this is not retried with backoff because no amount of
    /// waiting fixes a policy error.
    #[error("queue permission denied: {0}")]
    PermissionDenied(String),
}

/// Object-store errors.
#[derive(Debug, Error)]
pub enum ObjectError {
    /// The object exceeds the configured size ceiling. Checked before the
    /// object is opened; never retried.
    #[error("object {key} is {size} bytes, exceeding the {limit} byte limit")]
    TooLarge { key: String, size: u64, limit: u64 },

    /// The referenced object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Transport failure while opening or reading the body. The containing
    /// message fails and redelivers.
    #[error("object transport error: {0}")]
    Transport(String),
}

/// Upload-notification parse/validation failures.
///
/// All variants are validation errors: the message body is counted and the
/// message resolved as permanently unprocessable.
#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("body is not valid JSON: {0}")]
    Syntax(String),

    #[error("body matches no known notification shape")]
    UnknownShape,

    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("event time {0} is outside the accepted window")]
    TimeOutOfWindow(String),
}

/// Raw error surface reported by a delivery-stream adapter.
///
/// The sink never branches on this directly; it runs it through
/// [`classify_delivery_error`] and acts on the returned kind.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery stream not found: {0}")]
    StreamNotFound(String),

    #[error("request rejected as invalid: {0}")]
    InvalidArgument(String),

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("network or timeout failure: {0}")]
    Network(String),

    #[error("unclassified delivery failure: {0}")]
    Other(String),
}

/// Classification of a whole-batch delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    /// No retry will succeed: log, count, discard.
    Permanent,
    /// Worth retrying with backoff, bounded by `max_retries`.
    Retriable,
    /// Conservative default for surprises: log, count, discard.
    Unknown,
}

/// Pure classifier over the delivery error surface.
///
/// Exception-as-control-flow is deliberately absent: adapters return the
/// raw error, this function assigns the policy.
pub fn classify_delivery_error(err: &DeliveryError) -> DeliveryErrorKind {
    match err {
        DeliveryError::StreamNotFound(_) | DeliveryError::InvalidArgument(_) => {
            DeliveryErrorKind::Permanent
        }
        DeliveryError::Throttled(_)
        | DeliveryError::ServiceUnavailable(_)
        | DeliveryError::Network(_) => DeliveryErrorKind::Retriable,
        DeliveryError::Other(_) => DeliveryErrorKind::Unknown,
    }
}

/// Positioning engine failures.
#[derive(Debug, Error, PartialEq)]
pub enum PositioningError {
    /// No scanned AP matched an eligible reference record.
    #[error("no scanned AP matched an eligible reference record")]
    NoMatchedAps,

    /// Every algorithm was disabled by the factor weights, or every
    /// eligible algorithm declined to produce a position.
    #[error("no algorithm produced a usable position for this context")]
    Unresolvable,
}

/// Configuration errors. Fatal at startup (process exit code 1).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

//! Upload notification types.
//!
//! A [`QueueMessage`] is the raw unit received from the work queue; an
//! [`UploadEvent`] is the validated, typed notification extracted from its
//! body by the event parser. Events are immutable once parsed and die when
//! the originating message is acknowledged.

use chrono::{DateTime, Utc};

/// Raw message pulled from the work queue.
///
/// `receipt` is the opaque handle required to delete the message; `id` is
/// stable across redeliveries and keys all per-message bookkeeping.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Queue-assigned message id (stable across redeliveries).
    pub id: String,
    /// Opaque deletion handle for this delivery.
    pub receipt: String,
    /// Raw message body (JSON notification).
    pub body: String,
}

/// A validated file-upload notification.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadEvent {
    /// Notification id (from the wrapper, or synthesized from bucket/key).
    pub id: String,
    /// Event timestamp.
    pub time: DateTime<Utc>,
    /// Region the object was written in.
    pub region: String,
    /// Bucket name (DNS-safe, ≤ 63 chars).
    pub bucket: String,
    /// Object key, URL-decoded (≤ 1024 chars, no `..` or `//`).
    pub key: String,
    /// Object size in bytes (≤ 5 GiB).
    pub size: u64,
    /// Entity tag, when the notification carries one.
    pub etag: Option<String>,
    /// Bucket-notification sequencer, when present.
    pub sequencer: Option<String>,
    /// Feed stream name: second-to-last path component of the decoded key,
    /// or `"unknown"` when the key has no directory component.
    pub stream_name: String,
}

impl UploadEvent {
    /// Human-readable object reference for log lines.
    pub fn object_ref(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

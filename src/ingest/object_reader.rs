//! Object-store port and bounded line streaming.
//!
//! The reader never loads a body into memory: it wraps the store's buffered
//! reader and yields one trimmed line at a time. Dropping the stream drops
//! the underlying handle, so release is guaranteed on every exit path of
//! the consuming loop. Transport errors mid-stream surface once and end
//! the sequence; the pipeline treats that as a processing failure for the
//! whole message.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::error::ObjectError;
use crate::types::UploadEvent;

/// Streaming object body.
pub type ObjectBody = Box<dyn AsyncBufRead + Send + Unpin>;

/// Port over the blob store holding uploaded measurement files.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Open an object for streaming reads.
    async fn open(&self, bucket: &str, key: &str) -> Result<ObjectBody, ObjectError>;

    /// Human-readable store name for logging.
    fn store_name(&self) -> &str;
}

/// Opens upload events as line streams, enforcing the size ceiling.
pub struct ObjectReader {
    store: Arc<dyn ObjectStore>,
    max_file_size: u64,
}

impl ObjectReader {
    pub fn new(store: Arc<dyn ObjectStore>, max_file_size: u64) -> Self {
        Self {
            store,
            max_file_size,
        }
    }

    /// Open the referenced object.
    ///
    /// The size guard runs before the store is touched: an oversize object
    /// is a non-retriable rejection, not a transport failure.
    pub async fn open(&self, event: &UploadEvent) -> Result<LineStream, ObjectError> {
        if event.size > self.max_file_size {
            return Err(ObjectError::TooLarge {
                key: event.key.clone(),
                size: event.size,
                limit: self.max_file_size,
            });
        }

        let body = self.store.open(&event.bucket, &event.key).await?;
        debug!(
            object = %event.object_ref(),
            size = event.size,
            store = self.store.store_name(),
            "Object opened for streaming"
        );
        Ok(LineStream::new(body))
    }
}

/// Lazy sequence of trimmed, non-empty UTF-8 lines.
pub struct LineStream {
    reader: ObjectBody,
    buffer: String,
    lines_yielded: u64,
    finished: bool,
}

impl LineStream {
    fn new(reader: ObjectBody) -> Self {
        Self {
            reader,
            buffer: String::with_capacity(2048),
            lines_yielded: 0,
            finished: false,
        }
    }

    /// Next non-empty line, `None` at end of body.
    ///
    /// A transport error ends the stream permanently; subsequent calls
    /// return `None`.
    pub async fn next_line(&mut self) -> Result<Option<String>, ObjectError> {
        if self.finished {
            return Ok(None);
        }
        loop {
            self.buffer.clear();
            let bytes = self
                .reader
                .read_line(&mut self.buffer)
                .await
                .map_err(|e| {
                    self.finished = true;
                    ObjectError::Transport(e.to_string())
                })?;
            if bytes == 0 {
                self.finished = true;
                return Ok(None);
            }
            let line = self.buffer.trim();
            if line.is_empty() {
                continue;
            }
            self.lines_yielded += 1;
            return Ok(Some(line.to_string()));
        }
    }

    /// Lines yielded so far.
    pub fn lines_yielded(&self) -> u64 {
        self.lines_yielded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct StaticStore {
        body: &'static str,
    }

    #[async_trait]
    impl ObjectStore for StaticStore {
        async fn open(&self, _bucket: &str, _key: &str) -> Result<ObjectBody, ObjectError> {
            Ok(Box::new(std::io::Cursor::new(self.body.as_bytes())))
        }

        fn store_name(&self) -> &str {
            "static"
        }
    }

    fn event(size: u64) -> UploadEvent {
        UploadEvent {
            id: "e1".to_string(),
            time: Utc::now(),
            region: "us-west-2".to_string(),
            bucket: "bucket".to_string(),
            key: "feeds/scan-feed/part.jsonl".to_string(),
            size,
            etag: None,
            sequencer: None,
            stream_name: "scan-feed".to_string(),
        }
    }

    #[tokio::test]
    async fn yields_trimmed_non_empty_lines() {
        let store = Arc::new(StaticStore {
            body: "first\n\n  second  \n\nthird",
        });
        let reader = ObjectReader::new(store, 1024);
        let mut lines = reader.open(&event(10)).await.unwrap();

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("third"));
        assert_eq!(lines.next_line().await.unwrap(), None);
        assert_eq!(lines.lines_yielded(), 3);
    }

    #[tokio::test]
    async fn rejects_oversize_before_opening() {
        let store = Arc::new(StaticStore { body: "" });
        let reader = ObjectReader::new(store, 100);
        match reader.open(&event(101)).await {
            Err(err) => assert!(matches!(err, ObjectError::TooLarge { size: 101, .. })),
            Ok(_) => panic!("expected ObjectError::TooLarge"),
        }
    }
}

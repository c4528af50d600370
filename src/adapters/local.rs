//! Filesystem-backed queue, object store, and delivery stream.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::delivery::{DeliveryStream, RecordStatus};
use crate::error::{DeliveryError, ObjectError, QueueError};
use crate::ingest::{ObjectBody, ObjectStore};
use crate::queue::WorkQueue;
use crate::types::{BatchRecord, QueueMessage};

/// Poll granularity inside a long-poll wait.
const SPOOL_POLL_INTERVAL: Duration = Duration::from_millis(250);

// ============================================================================
// Spool Queue
// ============================================================================

/// Directory-spool work queue.
///
/// Notification bodies are dropped as `*.json` files into
/// `<root>/incoming`. A receive claims files by renaming them into
/// `<root>/inflight`; unclaimed expiry (the visibility timeout) renames
/// them back. Files left in `inflight/` by a crash are requeued at
/// startup, which is exactly the at-least-once contract.
pub struct SpoolQueue {
    incoming: PathBuf,
    inflight: PathBuf,
    name: String,
    claims: Mutex<HashMap<String, Claim>>,
}

struct Claim {
    incoming_path: PathBuf,
    inflight_path: PathBuf,
    expires_at: Instant,
}

impl SpoolQueue {
    /// Open (and prepare) a spool rooted at `root`. Fails when the root
    /// does not exist — a missing spool is a deployment error, not
    /// something to silently create at a wrong path.
    pub fn open(root: &Path) -> std::io::Result<Self> {
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("spool root {} does not exist", root.display()),
            ));
        }
        let incoming = root.join("incoming");
        let inflight = root.join("inflight");
        std::fs::create_dir_all(&incoming)?;
        std::fs::create_dir_all(&inflight)?;

        // Crash recovery: anything still in flight belongs back in the queue.
        for entry in std::fs::read_dir(&inflight)? {
            let entry = entry?;
            let target = incoming.join(entry.file_name());
            if let Err(e) = std::fs::rename(entry.path(), &target) {
                warn!(file = %entry.path().display(), error = %e, "Failed to requeue stale in-flight file");
            }
        }

        Ok(Self {
            incoming,
            inflight,
            name: root.display().to_string(),
            claims: Mutex::new(HashMap::new()),
        })
    }

    /// Rename expired claims back into `incoming/`.
    fn requeue_expired(&self) {
        let now = Instant::now();
        let mut claims = match self.claims.lock() {
            Ok(claims) => claims,
            Err(poisoned) => poisoned.into_inner(),
        };
        let expired: Vec<String> = claims
            .iter()
            .filter(|(_, claim)| claim.expires_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();
        for receipt in expired {
            if let Some(claim) = claims.remove(&receipt) {
                debug!(receipt = %receipt, "Visibility timeout expired, requeueing");
                if let Err(e) = std::fs::rename(&claim.inflight_path, &claim.incoming_path) {
                    warn!(receipt = %receipt, error = %e, "Failed to requeue expired claim");
                }
            }
        }
    }

    fn claim_batch(
        &self,
        max_messages: usize,
        visibility: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        self.requeue_expired();

        let mut names: Vec<PathBuf> = std::fs::read_dir(&self.incoming)
            .map_err(|e| QueueError::Unavailable(e.to_string()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        names.sort();

        let mut batch = Vec::new();
        for incoming_path in names.into_iter().take(max_messages) {
            let file_name = match incoming_path.file_name() {
                Some(name) => name.to_owned(),
                None => continue,
            };
            let inflight_path = self.inflight.join(&file_name);
            // The rename is the claim; a concurrent consumer loses the race
            // and simply skips the file.
            if std::fs::rename(&incoming_path, &inflight_path).is_err() {
                continue;
            }
            let body = match std::fs::read_to_string(&inflight_path) {
                Ok(body) => body,
                Err(e) => {
                    warn!(file = %inflight_path.display(), error = %e, "Failed to read claimed file");
                    let _ = std::fs::rename(&inflight_path, &incoming_path);
                    continue;
                }
            };

            let id = file_name.to_string_lossy().trim_end_matches(".json").to_string();
            let receipt = inflight_path.display().to_string();
            let mut claims = match self.claims.lock() {
                Ok(claims) => claims,
                Err(poisoned) => poisoned.into_inner(),
            };
            claims.insert(
                receipt.clone(),
                Claim {
                    incoming_path,
                    inflight_path,
                    expires_at: Instant::now() + visibility,
                },
            );
            batch.push(QueueMessage { id, receipt, body });
        }
        Ok(batch)
    }
}

#[async_trait]
impl WorkQueue for SpoolQueue {
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            let batch = self.claim_batch(max_messages, visibility_timeout)?;
            if !batch.is_empty() || Instant::now() >= deadline {
                return Ok(batch);
            }
            tokio::time::sleep(SPOOL_POLL_INTERVAL).await;
        }
    }

    async fn delete(&self, receipt: &str) -> Result<(), QueueError> {
        let claim = {
            let mut claims = match self.claims.lock() {
                Ok(claims) => claims,
                Err(poisoned) => poisoned.into_inner(),
            };
            claims.remove(receipt)
        };
        match claim {
            Some(claim) => {
                std::fs::remove_file(&claim.inflight_path)
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;
                Ok(())
            }
            // Already requeued by the visibility sweep; at-least-once
            // tolerates the duplicate.
            None => Ok(()),
        }
    }

    fn queue_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Filesystem Object Store
// ============================================================================

/// Objects at `<root>/<bucket>/<key>`.
pub struct FsObjectStore {
    root: PathBuf,
    name: String,
}

impl FsObjectStore {
    pub fn open(root: &Path) -> std::io::Result<Self> {
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("object root {} does not exist", root.display()),
            ));
        }
        Ok(Self {
            root: root.to_path_buf(),
            name: root.display().to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn open(&self, bucket: &str, key: &str) -> Result<ObjectBody, ObjectError> {
        let path = self.root.join(bucket).join(key);
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectError::NotFound(format!("{bucket}/{key}")))
            }
            Err(e) => Err(ObjectError::Transport(e.to_string())),
        }
    }

    fn store_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// File Delivery Stream
// ============================================================================

/// Append-only delivery stream backed by a single file. Every record
/// succeeds unless the filesystem itself fails.
pub struct FileDeliveryStream {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileDeliveryStream {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }
}

#[async_trait]
impl DeliveryStream for FileDeliveryStream {
    async fn put_records(
        &self,
        _stream_name: &str,
        correlation_id: &str,
        records: &[BatchRecord],
    ) -> Result<Vec<RecordStatus>, DeliveryError> {
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| DeliveryError::ServiceUnavailable(e.to_string()))?;

        for record in records {
            file.write_all(&record.payload)
                .await
                .map_err(|e| DeliveryError::Network(e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        debug!(correlation_id = %correlation_id, records = records.len(), "Batch appended");
        Ok(vec![RecordStatus::Delivered; records.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spool_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("incoming")).unwrap();
        std::fs::write(dir.path().join("incoming/msg-1.json"), "{\"a\":1}").unwrap();

        let queue = SpoolQueue::open(dir.path()).unwrap();
        let batch = queue
            .receive(10, Duration::from_secs(60), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, "msg-1");

        // Claimed: a second receive sees nothing.
        let empty = queue
            .receive(10, Duration::from_secs(60), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(empty.is_empty());

        queue.delete(&batch[0].receipt).await.unwrap();
        assert!(!dir.path().join("inflight/msg-1.json").exists());
    }

    #[tokio::test]
    async fn expired_claims_redeliver() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("incoming")).unwrap();
        std::fs::write(dir.path().join("incoming/msg-1.json"), "{}").unwrap();

        let queue = SpoolQueue::open(dir.path()).unwrap();
        let first = queue
            .receive(10, Duration::from_millis(1), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = queue
            .receive(10, Duration::from_secs(60), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(second.len(), 1, "message should redeliver after visibility expiry");
        assert_eq!(second[0].id, "msg-1");
    }

    #[tokio::test]
    async fn object_store_distinguishes_missing_from_broken() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("bucket/feeds")).unwrap();
        std::fs::write(dir.path().join("bucket/feeds/a.jsonl"), "line\n").unwrap();

        let store = FsObjectStore::open(dir.path()).unwrap();
        assert!(store.open("bucket", "feeds/a.jsonl").await.is_ok());
        match store.open("bucket", "feeds/missing.jsonl").await {
            Err(ObjectError::NotFound(_)) => {}
            other => panic!("expected ObjectError::NotFound, got {}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn delivery_file_accumulates_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/records.jsonl");
        let stream = FileDeliveryStream::open(&path).unwrap();

        let records = vec![
            BatchRecord {
                message_id: "m".to_string(),
                payload: b"{\"n\":1}\n".to_vec(),
            },
            BatchRecord {
                message_id: "m".to_string(),
                payload: b"{\"n\":2}\n".to_vec(),
            },
        ];
        let statuses = stream.put_records("s", "c", &records).await.unwrap();
        assert_eq!(statuses, vec![RecordStatus::Delivered; 2]);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}

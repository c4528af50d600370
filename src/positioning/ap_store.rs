//! AP reference store.
//!
//! Readers never block writers: the in-memory store keeps an immutable
//! snapshot behind an atomic pointer, and a reload swaps the whole map in
//! one store. Lookups clone the record out of the current snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::types::ApRecord;

/// Port over the access-point reference database.
pub trait ApStore: Send + Sync {
    /// Look up a reference record by normalized MAC.
    fn lookup(&self, mac: &str) -> Option<ApRecord>;

    /// Number of records currently loaded.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable-snapshot in-memory store.
pub struct InMemoryApStore {
    snapshot: ArcSwap<HashMap<String, ApRecord>>,
}

impl InMemoryApStore {
    pub fn new(records: impl IntoIterator<Item = ApRecord>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Self::index(records)),
        }
    }

    /// Replace the whole snapshot. Readers holding the old map finish
    /// against it; new lookups see the new one.
    pub fn reload(&self, records: impl IntoIterator<Item = ApRecord>) {
        let index = Self::index(records);
        let count = index.len();
        self.snapshot.store(Arc::new(index));
        info!(records = count, "AP store snapshot reloaded");
    }

    fn index(records: impl IntoIterator<Item = ApRecord>) -> HashMap<String, ApRecord> {
        records
            .into_iter()
            .map(|record| (record.mac.clone(), record))
            .collect()
    }
}

impl ApStore for InMemoryApStore {
    fn lookup(&self, mac: &str) -> Option<ApRecord> {
        self.snapshot.load().get(mac).cloned()
    }

    fn len(&self) -> usize {
        self.snapshot.load().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApStatus;

    fn record(mac: &str, lat: f64) -> ApRecord {
        ApRecord {
            mac: mac.to_string(),
            latitude: lat,
            longitude: 0.0,
            altitude_m: None,
            horizontal_accuracy_m: 10.0,
            vertical_accuracy_m: None,
            status: ApStatus::Active,
            confidence: 0.9,
        }
    }

    #[test]
    fn lookup_and_reload() {
        let store = InMemoryApStore::new(vec![record("aa:bb:cc:00:00:01", 1.0)]);
        assert_eq!(store.len(), 1);
        assert!(store.lookup("aa:bb:cc:00:00:01").is_some());
        assert!(store.lookup("aa:bb:cc:00:00:02").is_none());

        store.reload(vec![
            record("aa:bb:cc:00:00:02", 2.0),
            record("aa:bb:cc:00:00:03", 3.0),
        ]);
        assert_eq!(store.len(), 2);
        assert!(store.lookup("aa:bb:cc:00:00:01").is_none());
        assert!((store.lookup("aa:bb:cc:00:00:03").unwrap().latitude - 3.0).abs() < f64::EPSILON);
    }
}

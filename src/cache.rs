use crate::analytics::{AggregationConfig, Period, SiteAnalytics};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of one successful aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub sites: Vec<SiteAnalytics>,
    pub period: Period,
    pub fetched_at: DateTime<Utc>,
}

/// Identifies the inputs a snapshot was produced from without holding the
/// token itself.
pub fn snapshot_key(config: &AggregationConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.account_id.as_bytes());
    hasher.update([0]);
    hasher.update(config.token.as_bytes());
    hasher.update([0]);
    hasher.update(config.period.as_str().as_bytes());
    hasher.update([u8::from(config.exclude_bots)]);
    hex::encode(&hasher.finalize()[..8])
}

/// Thread-safe single-slot cache of the most recent successful aggregation.
#[derive(Clone)]
pub struct SnapshotCache {
    slot: Arc<Mutex<Option<CacheEntry>>>,
    ttl: Duration,
}

struct CacheEntry {
    key: String,
    snapshot: Arc<Snapshot>,
    inserted_at: Instant,
}

impl SnapshotCache {
    /// Create a cache whose entries count as fresh for `ttl_secs`.
    /// A TTL of 0 makes every entry stale immediately, but the last
    /// snapshot is still kept for [`Self::latest`].
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// The cached snapshot for `key` if it is younger than the TTL.
    pub fn fresh(&self, key: &str) -> Option<Arc<Snapshot>> {
        if self.ttl.is_zero() {
            return None;
        }
        self.slot.lock().as_ref().and_then(|entry| {
            (entry.key == key && entry.inserted_at.elapsed() <= self.ttl)
                .then(|| Arc::clone(&entry.snapshot))
        })
    }

    /// The cached snapshot for `key` regardless of age.
    pub fn latest(&self, key: &str) -> Option<Arc<Snapshot>> {
        self.slot
            .lock()
            .as_ref()
            .filter(|entry| entry.key == key)
            .map(|entry| Arc::clone(&entry.snapshot))
    }

    /// Replace the cached snapshot.
    pub fn insert(&self, key: String, snapshot: Arc<Snapshot>) {
        *self.slot.lock() = Some(CacheEntry {
            key,
            snapshot,
            inserted_at: Instant::now(),
        });
    }

    pub fn invalidate(&self) {
        *self.slot.lock() = None;
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Age of the cached snapshot, if any.
    pub fn age(&self) -> Option<Duration> {
        self.slot.lock().as_ref().map(|e| e.inserted_at.elapsed())
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// A snapshot inserted with a positive TTL is immediately fresh.
        #[test]
        fn prop_cache_round_trip(
            key in "[a-f0-9]{16}",
            name in "[a-z]{1,20}",
            ttl in 1u64..3600u64,
        ) {
            let cache = SnapshotCache::new(ttl);
            let snap = Arc::new(Snapshot {
                sites: vec![SiteAnalytics { name: name.clone(), visits: 0, page_views: 0, series: Vec::new() }],
                period: Period::Week,
                fetched_at: Utc::now(),
            });
            cache.insert(key.clone(), snap);
            prop_assert_eq!(&cache.fresh(&key).unwrap().sites[0].name, &name);
        }
    }
}

//! Shared time-bounded cache for computed geo responses.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A map whose entries expire a fixed time after insertion.
///
/// Reads never return an expired value. Expired entries are purged on the
/// next insert.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now()).await
    }

    /// Looks up `key` as of `now`.
    pub async fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    pub async fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now()).await;
    }

    /// Stores `value` as if inserted at `now`, dropping anything already
    /// expired at that instant.
    pub async fn insert_at(&self, key: K, value: V, now: Instant) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        if entries.len() < before {
            log::debug!("insert: purged {} expired entries", before - entries.len());
        }
        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Number of stored entries, expired or not.
    #[allow(clippy::len_without_is_empty)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hit_within_ttl_miss_after() {
        let cache = TtlCache::new(Duration::from_secs(300));
        let start = Instant::now();
        cache.insert_at("facilities", 1_u32, start).await;

        assert_eq!(cache.get_at(&"facilities", start).await, Some(1));
        assert_eq!(
            cache
                .get_at(&"facilities", start + Duration::from_secs(299))
                .await,
            Some(1)
        );
        assert_eq!(
            cache
                .get_at(&"facilities", start + Duration::from_secs(300))
                .await,
            None
        );
    }

    #[tokio::test]
    async fn expired_entries_are_purged_on_insert() {
        let cache = TtlCache::new(Duration::from_secs(10));
        let start = Instant::now();
        cache.insert_at("a", "x".to_string(), start).await;
        cache.insert_at("b", "y".to_string(), start).await;
        assert_eq!(cache.len().await, 2);

        cache
            .insert_at("c", "z".to_string(), start + Duration::from_secs(11))
            .await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(
            cache.get_at(&"c", start + Duration::from_secs(11)).await,
            Some("z".to_string())
        );
    }

    #[tokio::test]
    async fn reinsert_refreshes_expiry() {
        let cache = TtlCache::new(Duration::from_secs(10));
        let start = Instant::now();
        cache.insert_at(1, 1, start).await;
        cache.insert_at(1, 2, start + Duration::from_secs(8)).await;
        assert_eq!(
            cache.get_at(&1, start + Duration::from_secs(15)).await,
            Some(2)
        );
    }
}

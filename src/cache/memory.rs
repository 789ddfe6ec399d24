//! In-process [`CacheStore`] backed by mini-moka.
//!
//! mini-moka bounds memory and evicts by a single cache-wide TTL, but the
//! tiers need per-entry expiry. Each entry therefore carries its own deadline,
//! checked on read; the cache-wide TTL is set to the longest tier so moka
//! still reclaims anything nobody reads again.

use super::{CacheError, CacheStore};
use async_trait::async_trait;
use mini_moka::sync::Cache;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone)]
struct Entry {
    value: String,
    /// `None` when the deadline is past what `Instant` can represent.
    expires_at: Option<Instant>,
}

#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, Entry>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64, longest_ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(longest_ttl)
            .build();
        Self { entries }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = key.to_string();
        match self.entries.get(&key) {
            // An entry is dead from its deadline onwards
            Some(entry) if entry.expires_at.is_some_and(|deadline| Instant::now() >= deadline) => {
                self.entries.invalidate(&key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value)),
            None => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), CacheError> {
        for key in keys {
            self.entries.invalidate(&key.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> MemoryCache {
        MemoryCache::new(128, Duration::from_secs(24 * 60 * 60))
    }

    #[tokio::test]
    async fn test_set_then_get_returns_value() {
        let cache = cache();
        cache.set_raw("session:1", r#"{"a":1}"#.to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get_raw("session:1").await.unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert!(cache.get_raw("session:2").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_its_ttl() {
        let cache = cache();
        cache.set_raw("k", "1".to_string(), Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert_eq!(cache.get_raw("k").await.unwrap().as_deref(), Some("1"));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(cache.get_raw("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttls_are_per_entry() {
        let cache = cache();
        cache.set_raw("short", "s".to_string(), Duration::from_secs(5)).await.unwrap();
        cache.set_raw("long", "l".to_string(), Duration::from_secs(50)).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cache.get_raw("short").await.unwrap().is_none());
        assert_eq!(cache.get_raw("long").await.unwrap().as_deref(), Some("l"));
    }

    #[tokio::test]
    async fn test_delete_removes_before_expiry() {
        let cache = cache();
        cache.set_raw("a", "1".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.set_raw("b", "2".to_string(), Duration::from_secs(60)).await.unwrap();

        cache.delete(&["a", "b", "missing"]).await.unwrap();

        assert!(cache.get_raw("a").await.unwrap().is_none());
        assert!(cache.get_raw("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_kept_until_evicted() {
        let cache = cache();
        cache.set_raw("k", "1".to_string(), Duration::from_secs(u64::MAX)).await.unwrap();
        assert_eq!(cache.get_raw("k").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_overwrite_resets_value() {
        let cache = cache();
        cache.set_raw("k", "old".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.set_raw("k", "new".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get_raw("k").await.unwrap().as_deref(), Some("new"));
    }
}

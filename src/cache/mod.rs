//! # Cache-Aside Store
//!
//! A key/value layer with per-entry TTL that sits in front of the session
//! store and the LLM. Reads check the cache first and fall through to the
//! source of truth on a miss; writes never update the cache, they delete the
//! affected keys instead.
//!
//! ## Failure Policy:
//! - A missing or expired key is a plain miss (`Ok(None)`), never an error.
//! - A transport or serialization failure is a [`CacheError`], but every
//!   caller treats it exactly like a miss. The service keeps working when the
//!   cache is unreachable.
//! - Cache writes and invalidations are best-effort (see [`crate::effect`]).
//!
//! ## Wire Format:
//! Values are stored as JSON text under string keys. The store enforces TTLs.

pub mod memory;

pub use memory::MemoryCache;

use crate::config::CacheConfig;
use crate::effect::non_critical;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a cache operation failed. Always recoverable.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The value could not be encoded or decoded as JSON
    #[error("cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store could not be reached
    #[error("cache transport failed: {0}")]
    Transport(String),
}

/// Raw string-keyed, JSON-valued store with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the JSON text stored under `key`, if present and not expired.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store JSON text under `key` for at most `ttl`.
    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Remove every listed key. Missing keys are ignored.
    async fn delete(&self, keys: &[&str]) -> Result<(), CacheError>;
}

/// Look up and decode a cached value.
pub async fn get<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Result<Option<T>, CacheError> {
    match cache.get_raw(key).await? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Encode and store a value.
pub async fn set<T: Serialize + ?Sized>(
    cache: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let json = serde_json::to_string(value)?;
    cache.set_raw(key, json, ttl).await
}

/// Cache-aside read: serve from the cache, or load from the source of truth
/// and populate the cache on the way out.
///
/// Only the loader's error can fail the call.
pub async fn read_through<T, E, F, Fut>(
    cache: &dyn CacheStore,
    key: &str,
    ttl: Duration,
    load: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match get::<T>(cache, key).await {
        Ok(Some(hit)) => {
            debug!(key = key, "Cache hit");
            return Ok(hit);
        }
        Ok(None) => debug!(key = key, "Cache miss"),
        Err(err) => warn!(key = key, error = %err, "Cache read failed, falling through to store"),
    }

    let value = load().await?;
    populate(cache, key, &value, ttl).await;
    Ok(value)
}

/// Best-effort cache write.
pub async fn populate<T: Serialize + ?Sized>(cache: &dyn CacheStore, key: &str, value: &T, ttl: Duration) {
    non_critical("cache populate", set(cache, key, value, ttl).await);
}

/// Best-effort invalidation of every listed key.
pub async fn invalidate(cache: &dyn CacheStore, keys: &[&str]) {
    non_critical("cache invalidate", cache.delete(keys).await);
}

/// Cache key layout. Keys are a pure function of entity type and ID.
pub mod keys {
    use crate::model::SessionId;

    /// The newest-first list of every session
    pub const SESSIONS_LIST: &str = "sessions:list";

    pub fn session(id: &SessionId) -> String {
        format!("session:{}", id)
    }

    pub fn summary(id: &SessionId) -> String {
        format!("summary:{}", id)
    }

    pub fn vocabulary(id: &SessionId) -> String {
        format!("vocab:{}", id)
    }

    pub fn flashcards(id: &SessionId) -> String {
        format!("flashcards:{}", id)
    }
}

/// TTL tiers, ordered by how volatile the cached data is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// Aggregate list views change on every create/update
    pub list: Duration,
    /// Single-session reads
    pub session: Duration,
    /// LLM-derived artifacts are idempotent once generated
    pub artifact: Duration,
}

impl CacheTtls {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            list: Duration::from_secs(config.list_ttl_secs),
            session: Duration::from_secs(config.session_ttl_secs),
            artifact: Duration::from_secs(config.artifact_ttl_secs),
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

//! Result cache: memoizes expensive lookups under a key with a TTL.
//!
//! Values are stored as JSON text. `serde_json` is built with
//! `arbitrary_precision`, so big integers inside cached payloads come back
//! digit-for-digit rather than squeezed through an `f64`.
//!
//! There is no locking: two concurrent misses for the same key both run
//! `compute`. Callers only cache idempotent lookups.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Key/value storage with per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), AppError>;
}

/// Redis-backed cache using `SET key value EX ttl`.
#[derive(Clone)]
pub struct RedisCache {
    redis: ConnectionManager,
    prefix: String,
}

impl RedisCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            prefix: "ripple:cache:".to_string(),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.redis.clone();
        let value: Option<String> = conn.get(self.namespaced(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(self.namespaced(key), value, ttl_seconds)
            .await?;
        Ok(())
    }
}

/// Process-local cache, used when Redis is not wanted (tests, single-process tools).
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Internal("cache lock poisoned".to_string()))?;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), AppError> {
        let now = Instant::now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Internal("cache lock poisoned".to_string()))?;
        // Expired entries go on every write
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (value, now + Duration::from_secs(ttl_seconds)));
        Ok(())
    }
}

/// Return the cached value for `key`, or run `compute` and cache its result for `ttl_seconds`.
///
/// Cache read/write failures are logged and treated as a miss; only `compute`
/// errors are returned.
pub async fn with_cache<T, E, F, Fut>(
    cache: &dyn CacheBackend,
    key: &str,
    ttl_seconds: u64,
    compute: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                tracing::debug!(key, "Cache hit");
                return Ok(value);
            }
            Err(e) => tracing::warn!(key, error = %e, "Discarding undecodable cache entry"),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!(key, error = %e, "Cache read failed, computing value"),
    }

    let value = compute().await?;

    match serde_json::to_string(&value) {
        Ok(raw) => {
            if let Err(e) = cache.set(key, raw, ttl_seconds).await {
                tracing::warn!(key, error = %e, "Cache write failed");
            }
        }
        Err(e) => tracing::warn!(key, error = %e, "Value not serializable, skipping cache"),
    }

    Ok(value)
}

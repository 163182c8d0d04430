//! Redis caching layer for Tourdesk
//!
//! Implements the `CacheService` trait from tourdesk-core. The booking core
//! uses it to remember gateway webhook deliveries that were already applied,
//! so replays are acknowledged without touching the store.
//!
//! `MemoryCache` offers the same contract in-process for tests and for runs
//! without Redis.
//!
//! ```no_run
//! use tourdesk_cache::{keys, RedisCache};
//! use tourdesk_core::traits::CacheService;
//!
//! # async fn run() -> Result<(), tourdesk_core::AppError> {
//! let cache = RedisCache::new("redis://127.0.0.1:6379").await?;
//! let key = keys::webhook_key("payment.succeeded:pay-1");
//! cache.set(&key, "1", keys::WEBHOOK_TTL_SECS).await?;
//! assert!(cache.exists(&key).await?);
//! # Ok(())
//! # }
//! ```

pub mod keys;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tourdesk_core::error::AppError;
use tourdesk_core::traits::CacheService;
use tracing::{debug, info, warn};

/// Redis-backed [`CacheService`]
///
/// One multiplexed connection is shared by all clones. Failures surface as
/// `AppError::Cache*`; callers treat the cache as advisory and fall back to
/// the store.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to `url`
    ///
    /// # Errors
    ///
    /// `AppError::CacheConnection` for a bad URL or an unreachable server
    pub async fn new(url: &str) -> Result<Self, AppError> {
        let client = Client::open(url)
            .map_err(|e| AppError::CacheConnection(format!("Invalid Redis URL: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::CacheConnection(format!("Connection failed: {}", e)))?;

        info!("Webhook delivery cache connected");
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(cache_error)
    }
}

fn cache_error(err: RedisError) -> AppError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        warn!(error = %err, "Redis connection problem");
        AppError::CacheConnection(err.to_string())
    } else {
        warn!(error = %err, "Redis command failed");
        AppError::Cache(err.to_string())
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(cache_error)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError> {
        debug!("SET {} for {}s", key, ttl_secs);
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(cache_error)
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(cache_error)
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await.map_err(cache_error)?;
        Ok(removed > 0)
    }
}

/// In-process cache with per-entry expiry
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.live_value(key).is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

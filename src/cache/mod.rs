//! Response cache for the weather provider.
//!
//! Entries are keyed by a hash of the request signature and expire after a
//! fixed TTL. The cache only saves round trips; every caller must behave the
//! same with it disabled.

pub mod disk;
pub mod memory;
pub mod redis_cache;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::config::{CacheBackend, CacheConfig};
use crate::error::Result;

pub use disk::DiskCache;
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Cached body for `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, body: &str) -> Result<()>;
}

/// Cache key for a GET request: URL plus query pairs, order-insensitive.
pub fn request_key(url: &str, query: &[(&str, String)]) -> String {
    let mut pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    let signature = format!("GET {url}?{}", pairs.join("&"));
    format!("weather:{}", hex::encode(Sha256::digest(signature.as_bytes())))
}

/// Build the configured cache. `None` means caching is off, either by
/// configuration or because the backend could not be reached.
pub async fn from_config(cfg: &CacheConfig) -> Option<Arc<dyn ResponseCache>> {
    let ttl = cfg.ttl();
    match cfg.backend {
        CacheBackend::None => {
            tracing::info!("Weather response cache disabled");
            None
        }
        CacheBackend::Memory => {
            tracing::info!(ttl_secs = cfg.ttl_seconds, "Using in-memory weather cache");
            Some(Arc::new(MemoryCache::new(ttl)))
        }
        CacheBackend::Disk => match DiskCache::new(cfg.dir.clone(), ttl).await {
            Ok(cache) => {
                tracing::info!(
                    dir = %cfg.dir.display(),
                    ttl_secs = cfg.ttl_seconds,
                    "Using disk weather cache"
                );
                Some(Arc::new(cache))
            }
            Err(e) => {
                tracing::warn!("Disk cache unavailable: {} - continuing without cache", e);
                None
            }
        },
        CacheBackend::Redis => {
            match RedisCache::connect(&cfg.redis_url, cfg.redis_pool_size, ttl).await {
                Ok(cache) => Some(Arc::new(cache)),
                Err(e) => {
                    tracing::warn!("Redis cache unavailable: {} - continuing without cache", e);
                    None
                }
            }
        }
    }
}

use async_trait::async_trait;
use deadpool::managed::QueueMode;
use deadpool_redis::{Config as DeadpoolConfig, Pool, PoolConfig, Runtime, Timeouts};
use redis::AsyncCommands;
use std::time::Duration;

use super::ResponseCache;
use crate::error::{AssistantError, Result};

/// Shared cache for several server instances.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
    ttl: Duration,
}

impl RedisCache {
    pub async fn connect(url: &str, max_size: usize, ttl: Duration) -> Result<Self> {
        tracing::info!("Connecting weather cache to Redis");

        let mut cfg = DeadpoolConfig::from_url(url);
        cfg.pool = Some(PoolConfig {
            max_size,
            timeouts: Timeouts {
                wait: Some(Duration::from_secs(2)),
                create: Some(Duration::from_secs(2)),
                recycle: Some(Duration::from_secs(2)),
            },
            queue_mode: QueueMode::Fifo,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| AssistantError::Cache(format!("Failed to create Redis pool: {e}")))?;

        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        tracing::info!("Redis connection established");

        Ok(Self { pool, ttl })
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.pool.get().await?;
        let body: Option<String> = conn.get(key).await?;
        Ok(body)
    }

    async fn put(&self, key: &str, body: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(key, body, self.ttl.as_secs().max(1))
            .await?;
        Ok(())
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::ResponseCache;
use crate::error::{AssistantError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct CachedEntry {
    stored_at: DateTime<Utc>,
    body: String,
}

/// One JSON file per key under `dir`. Survives restarts.
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
    ttl: Duration,
}

impl DiskCache {
    pub async fn new(dir: PathBuf, ttl: Duration) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AssistantError::Cache(format!(
                "Failed to create cache directory {}: {e}",
                dir.display()
            ))
        })?;
        let cache = Self { dir, ttl };
        cache.sweep().await;
        Ok(cache)
    }

    /// Remove entry files older than the TTL, whether or not anyone asks
    /// for their key again. Judged by file mtime; failures are skipped.
    async fn sweep(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %self.dir.display(), "Cache sweep skipped: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let expired = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified.elapsed().map(|age| age >= self.ttl).unwrap_or(false),
                Err(_) => false,
            };
            if expired && tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "Swept expired weather cache entries");
        }
        removed
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        // Keys are "namespace:hex"; keep file names portable.
        self.dir.join(format!("{}.json", key.replace(':', "_")))
    }

    fn is_fresh(&self, entry: &CachedEntry) -> bool {
        let age = Utc::now().signed_duration_since(entry.stored_at);
        match age.to_std() {
            Ok(age) => age < self.ttl,
            // Stored in the future: clock moved backwards, treat as stale.
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ResponseCache for DiskCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AssistantError::Cache(format!(
                    "Failed to read cache entry {}: {e}",
                    path.display()
                )));
            }
        };

        let entry: CachedEntry = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Discarding corrupt cache entry: {}", e);
                let _ = tokio::fs::remove_file(&path).await;
                return Ok(None);
            }
        };

        if self.is_fresh(&entry) {
            Ok(Some(entry.body))
        } else {
            let _ = tokio::fs::remove_file(&path).await;
            Ok(None)
        }
    }

    async fn put(&self, key: &str, body: &str) -> Result<()> {
        let entry = CachedEntry {
            stored_at: Utc::now(),
            body: body.to_string(),
        };
        let path = self.entry_path(key);
        let tmp = path.with_extension("json.tmp");

        tokio::fs::write(&tmp, serde_json::to_vec(&entry)?)
            .await
            .map_err(|e| AssistantError::Cache(format!("Failed to write cache entry: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AssistantError::Cache(format!("Failed to commit cache entry: {e}")))?;
        self.sweep().await;
        Ok(())
    }
}

//! Per-month statement cache
//!
//! A statement present in the cache is never extracted again, and matches
//! recorded on its transactions are kept across runs. The whole month is
//! loaded once and written back once.

use crate::error::AuditError;
use crate::models::{AuditPeriod, MonthCache};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Trait for month cache persistence
#[async_trait]
pub trait MonthCacheStore: Send + Sync {
    /// Load the cache for a period. A period never saved yields an empty cache.
    async fn load(&self, period: AuditPeriod) -> Result<MonthCache>;

    /// Replace whatever was stored for the period.
    async fn save(&self, period: AuditPeriod, cache: &MonthCache) -> Result<()>;
}

/// One pretty-printed JSON file per month, `<dir>/<YYYY>-<MM>.json`.
pub struct JsonFileCache {
    dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, period: AuditPeriod) -> PathBuf {
        self.dir.join(format!("{}.json", period))
    }
}

#[async_trait]
impl MonthCacheStore for JsonFileCache {
    async fn load(&self, period: AuditPeriod) -> Result<MonthCache> {
        let path = self.path_for(period);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cache yet");
                return Ok(MonthCache::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&raw).map_err(|e| {
            AuditError::Cache(format!("{} is not a valid cache file: {}", path.display(), e))
        })
    }

    async fn save(&self, period: AuditPeriod, cache: &MonthCache) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(period);
        let tmp = temp_sibling(&path);
        let json = serde_json::to_string_pretty(cache)?;

        // Rename over the target so a reader sees either the old or the new file.
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), statements = cache.statements.len(), "Cache saved");
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// In-memory cache for development & testing
pub struct InMemoryCache {
    months: Arc<RwLock<HashMap<AuditPeriod, MonthCache>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            months: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MonthCacheStore for InMemoryCache {
    async fn load(&self, period: AuditPeriod) -> Result<MonthCache> {
        let months = self.months.read().await;
        Ok(months.get(&period).cloned().unwrap_or_default())
    }

    async fn save(&self, period: AuditPeriod, cache: &MonthCache) -> Result<()> {
        let mut months = self.months.write().await;
        months.insert(period, cache.clone());
        Ok(())
    }
}

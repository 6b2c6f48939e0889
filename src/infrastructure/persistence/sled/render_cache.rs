//! Sled-based Render Cache Implementation
//!
//! 条目一旦写入就不再删除，没有过期也没有淘汰。
//! 命中计数的累加走 sled 的单键 CAS，并发命中不丢计数

use async_trait::async_trait;
use chrono::Utc;
use sled::Db;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::application::ports::{CacheError, CacheStats, RenderCachePort, RenderEntry};

const ENTRY_PREFIX: &str = "entry:";

/// Sled 缓存配置
#[derive(Debug, Clone)]
pub struct SledCacheConfig {
    /// 数据库路径
    pub db_path: String,
}

impl Default for SledCacheConfig {
    fn default() -> Self {
        Self {
            db_path: "data/render_cache.sled".to_string(),
        }
    }
}

/// Sled 渲染缓存
pub struct SledRenderCache {
    db: Db,
    current_size: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl SledRenderCache {
    /// 创建新的缓存实例
    pub fn new(config: &SledCacheConfig) -> Result<Self, CacheError> {
        let db = sled::open(&config.db_path)
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;

        // 计算当前登记的音频总大小
        let current_size = Self::calculate_total_size(&db)?;

        tracing::info!(
            db_path = %config.db_path,
            current_size = current_size,
            "SledRenderCache initialized"
        );

        Ok(Self {
            db,
            current_size: AtomicU64::new(current_size),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        })
    }

    /// 打开现有缓存
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let config = SledCacheConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
        };
        Self::new(&config)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 计算数据库中所有条目登记的总大小
    fn calculate_total_size(db: &Db) -> Result<u64, CacheError> {
        let mut total = 0u64;
        for item in db.scan_prefix(ENTRY_PREFIX) {
            let (_, value) = item.map_err(|e| CacheError::DatabaseError(e.to_string()))?;
            if let Ok(entry) = bincode::deserialize::<RenderEntry>(&value) {
                total += entry.size_bytes;
            }
        }
        Ok(total)
    }

    /// 刷新数据库
    pub fn flush(&self) -> Result<(), CacheError> {
        self.db
            .flush()
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    fn entry_key(hash: &str) -> String {
        format!("{}{}", ENTRY_PREFIX, hash)
    }
}

#[async_trait]
impl RenderCachePort for SledRenderCache {
    async fn lookup(&self, hash: &str) -> Result<Option<RenderEntry>, CacheError> {
        let key = Self::entry_key(hash);
        let now = Utc::now().timestamp();

        let updated = self
            .db
            .update_and_fetch(key.as_bytes(), |old| {
                let old = old?;
                match bincode::deserialize::<RenderEntry>(old) {
                    Ok(mut entry) => {
                        entry.access_count += 1;
                        entry.last_accessed_at = now;
                        bincode::serialize(&entry).ok().or_else(|| Some(old.to_vec()))
                    }
                    // 坏条目原样保留，错误在外层上报
                    Err(_) => Some(old.to_vec()),
                }
            })
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;

        match updated {
            Some(bytes) => {
                let entry: RenderEntry = bincode::deserialize(&bytes)
                    .map_err(|e| CacheError::SerializationError(e.to_string()))?;
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    hash = %hash,
                    access_count = entry.access_count,
                    "Render cache hit"
                );
                Ok(Some(entry))
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn store(&self, entry: RenderEntry) -> Result<(), CacheError> {
        let key = Self::entry_key(&entry.hash);
        let size = entry.size_bytes;

        let entry_bytes = bincode::serialize(&entry)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;

        let previous = self
            .db
            .insert(key, entry_bytes)
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;

        // 并发重复产出会覆盖同一 hash，大小统计按替换差额修正
        if let Some(old) = previous {
            if let Ok(old_entry) = bincode::deserialize::<RenderEntry>(&old) {
                self.current_size
                    .fetch_sub(old_entry.size_bytes, Ordering::Relaxed);
            }
        }
        self.current_size.fetch_add(size, Ordering::Relaxed);

        tracing::debug!(
            hash = %entry.hash,
            size_bytes = size,
            voice_tag = %entry.voice_tag,
            "Render cached"
        );

        Ok(())
    }

    async fn peek(&self, hash: &str) -> Result<Option<RenderEntry>, CacheError> {
        let key = Self::entry_key(hash);
        match self.db.get(&key) {
            Ok(Some(data)) => {
                let entry = bincode::deserialize(&data)
                    .map_err(|e| CacheError::SerializationError(e.to_string()))?;
                Ok(Some(entry))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(CacheError::DatabaseError(e.to_string())),
        }
    }

    async fn stats(&self) -> CacheStats {
        let total_entries = self.db.scan_prefix(ENTRY_PREFIX).count();

        CacheStats {
            total_entries,
            total_size_bytes: self.current_size.load(Ordering::Relaxed),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }
}

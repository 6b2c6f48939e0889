//! File Storage - 文件系统音频存储实现
//!
//! 实现 AudioStorePort trait。
//! 对象按 UUID 前两位分桶，location 形如 "ab/abcd....wav"，
//! 只在仓库内部流转，不暴露真实文件路径

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::application::ports::{AudioStoreError, AudioStorePort, StoreStats};

/// 文件系统音频存储
pub struct FileAudioStore {
    /// 存储根目录
    base_dir: PathBuf,
}

impl FileAudioStore {
    /// 创建新的文件存储
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self, AudioStoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();

        // 确保目录存在
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| AudioStoreError::IoError(e.to_string()))?;

        Ok(Self { base_dir })
    }

    /// 获取存储根目录
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// location 映射到磁盘路径，拒绝越出根目录的值
    fn resolve(&self, location: &str) -> Result<PathBuf, AudioStoreError> {
        let relative = Path::new(location);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if location.is_empty() || !safe {
            return Err(AudioStoreError::InvalidLocation(location.to_string()));
        }
        Ok(self.base_dir.join(relative))
    }
}

#[async_trait]
impl AudioStorePort for FileAudioStore {
    async fn put(&self, data: &[u8], extension: &str) -> Result<String, AudioStoreError> {
        let id = Uuid::new_v4().to_string();
        let shard = &id[..2];
        let location = format!("{}/{}.{}", shard, id, extension);

        let path = self.resolve(&location)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AudioStoreError::IoError(e.to_string()))?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| AudioStoreError::IoError(e.to_string()))?;

        tracing::debug!(
            location = %location,
            size = data.len(),
            "Saved audio object"
        );

        Ok(location)
    }

    async fn get(&self, location: &str) -> Result<Vec<u8>, AudioStoreError> {
        let path = self.resolve(location)?;

        if !path.exists() {
            return Err(AudioStoreError::NotFound(location.to_string()));
        }

        fs::read(&path)
            .await
            .map_err(|e| AudioStoreError::IoError(e.to_string()))
    }

    async fn exists(&self, location: &str) -> bool {
        match self.resolve(location) {
            Ok(path) => path.exists(),
            Err(_) => false,
        }
    }

    async fn stats(&self) -> Result<StoreStats, AudioStoreError> {
        let mut stats = StoreStats::default();

        let mut shards = fs::read_dir(&self.base_dir)
            .await
            .map_err(|e| AudioStoreError::IoError(e.to_string()))?;

        while let Some(shard) = shards
            .next_entry()
            .await
            .map_err(|e| AudioStoreError::IoError(e.to_string()))?
        {
            let path = shard.path();
            if !path.is_dir() {
                continue;
            }
            if let Ok(mut entries) = fs::read_dir(&path).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    if let Ok(metadata) = entry.metadata().await {
                        if metadata.is_file() {
                            stats.blob_count += 1;
                            stats.used_bytes += metadata.len();
                        }
                    }
                }
            }
        }

        Ok(stats)
    }
}

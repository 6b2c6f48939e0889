//! Audio Store Port - 出站端口
//!
//! 定义音频对象存储的抽象接口
//!
//! 存储的音频永不由本子系统删除，位置字符串可长期持有

use async_trait::async_trait;
use thiserror::Error;

/// 对象存储错误
#[derive(Debug, Error)]
pub enum AudioStoreError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),
}

/// 存储统计
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// 已使用空间（字节）
    pub used_bytes: u64,
    /// 音频对象数量
    pub blob_count: u64,
}

/// Audio Store Port - 出站端口
///
/// 以不透明位置字符串引用音频对象
#[async_trait]
pub trait AudioStorePort: Send + Sync {
    /// 保存音频，返回可持久引用的位置
    async fn put(&self, data: &[u8], extension: &str) -> Result<String, AudioStoreError>;

    /// 按位置读取音频
    async fn get(&self, location: &str) -> Result<Vec<u8>, AudioStoreError>;

    /// 检查位置是否仍有对应对象
    async fn exists(&self, location: &str) -> bool;

    /// 获取存储统计
    async fn stats(&self) -> Result<StoreStats, AudioStoreError>;
}

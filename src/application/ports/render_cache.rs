//! Render Cache Port - 渲染缓存管理
//!
//! 定义合成结果缓存的抽象接口，具体实现使用 Sled
//!
//! 缓存条目没有过期策略，本子系统也从不删除条目

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Render Cache 错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// 缓存条目
///
/// 音频本体存放在对象存储，条目只记录位置与访问统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderEntry {
    /// 内容寻址 key，见 [`render_cache_key`]
    pub hash: String,
    /// 产出该条目的规范化文本，排查缓存内容时用
    pub text: String,
    /// 音频在对象存储中的位置
    pub audio_location: String,
    /// MIME 类型
    pub content_type: String,
    /// 生成该条目的声音标记
    pub voice_tag: String,
    /// 音频大小（字节）
    pub size_bytes: u64,
    /// 访问次数，产出请求本身计第一次
    pub access_count: u64,
    /// 创建时间（Unix 秒）
    pub created_at: i64,
    /// 最近访问时间（Unix 秒）
    pub last_accessed_at: i64,
}

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// Render Cache Port
///
/// 基于 md5(规范化文本) + 声音标记的内容寻址缓存
#[async_trait]
pub trait RenderCachePort: Send + Sync {
    /// 查找条目
    ///
    /// 命中时原子地累加 access_count 并刷新 last_accessed_at，
    /// 返回更新后的条目
    async fn lookup(&self, hash: &str) -> Result<Option<RenderEntry>, CacheError>;

    /// 写入条目
    ///
    /// 同一 hash 的并发重复写入是允许的，后写覆盖先写，双方都成功
    async fn store(&self, entry: RenderEntry) -> Result<(), CacheError>;

    /// 读取条目但不更新访问统计
    async fn peek(&self, hash: &str) -> Result<Option<RenderEntry>, CacheError>;

    /// 获取缓存统计信息
    async fn stats(&self) -> CacheStats;
}

/// 规范化文本
///
/// 去除首尾空白并把连续空白折叠为单个空格，使哈希对排版噪音稳定
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 生成缓存 key
///
/// 使用 md5(规范化文本) + 声音标记，不含任何进程内随机量，
/// 跨重启对相同输入产生相同 key
pub fn render_cache_key(text: &str, voice_tag: &str) -> String {
    let digest = md5::compute(normalize_text(text).as_bytes());
    format!("{:x}:{}", digest, voice_tag)
}

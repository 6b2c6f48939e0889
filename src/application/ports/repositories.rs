//! Repository Ports - 出站端口
//!
//! 平台侧档案与内容记录的读取及受控写回
//! 具体实现在 infrastructure 层（SQLite）

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::voice::{IdentityId, VoiceIdentity};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// ============================================================================
// Profile Store
// ============================================================================

/// Profile Store Port
///
/// 档案与声音身份的只读视图
#[async_trait]
pub trait ProfileStorePort: Send + Sync {
    /// 档案当前登记的声音身份
    ///
    /// 档案不存在或未登记身份时返回 None
    async fn current_identity(
        &self,
        owner_id: Uuid,
    ) -> Result<Option<VoiceIdentity>, RepositoryError>;

    /// 按 ID 查找声音身份
    async fn find_identity(
        &self,
        id: &IdentityId,
    ) -> Result<Option<VoiceIdentity>, RepositoryError>;
}

// ============================================================================
// Content Store
// ============================================================================

/// 内容记录的声音上下文
#[derive(Debug, Clone)]
pub struct ContentVoiceContext {
    pub content_id: Uuid,
    /// 归属者，匿名内容为 None
    pub owner_id: Option<Uuid>,
    /// 内容创建时登记的身份，可能已过时
    pub identity_id: Option<IdentityId>,
    /// 已写回的渲染位置
    pub audio_location: Option<String>,
}

/// 渲染写回结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// 已写入
    Attached,
    /// 记录已有渲染，保持不变
    SkippedAlreadySet,
    /// 身份不匹配，保持不变
    SkippedIdentityMismatch,
    /// 内容记录不存在
    SkippedMissingRecord,
}

impl PersistOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attached => "attached",
            Self::SkippedAlreadySet => "skipped_already_set",
            Self::SkippedIdentityMismatch => "skipped_identity_mismatch",
            Self::SkippedMissingRecord => "skipped_missing_record",
        }
    }

    pub fn attached(&self) -> bool {
        matches!(self, Self::Attached)
    }
}

/// Content Store Port
#[async_trait]
pub trait ContentStorePort: Send + Sync {
    /// 读取内容的声音上下文
    ///
    /// 内容不存在返回 None，不视为错误
    async fn voice_context(
        &self,
        content_id: Uuid,
    ) -> Result<Option<ContentVoiceContext>, RepositoryError>;

    /// 条件写回渲染位置
    ///
    /// 仅当 audio_location 仍为空、且记录身份等于给定身份或记录无身份时写入。
    /// 判断与更新必须在单条语句内完成，并发请求不会覆盖已有值。
    /// 不满足条件时返回对应的 Skipped 结果，属正常结束而非错误
    async fn attach_rendering(
        &self,
        content_id: Uuid,
        identity_id: Option<&IdentityId>,
        audio_location: &str,
    ) -> Result<PersistOutcome, RepositoryError>;
}

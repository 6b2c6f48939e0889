//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;
use uuid::Uuid;

/// 合成终态失败的类别
///
/// 所有候选后端耗尽后保留最后一次失败的类别，调用方据此区分处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisFailureKind {
    /// 单次尝试超时
    Timeout,
    /// 后端 5xx
    Remote,
    /// 网络/连接故障
    Network,
}

impl SynthesisFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Remote => "remote",
            Self::Network => "network",
        }
    }
}

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: Uuid,
    },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 配置错误（如没有任何可用的合成后端）
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// 后端以不可重试的方式拒绝了请求
    #[error("Synthesis rejected: {0}")]
    SynthesisRejected(String),

    /// 所有候选后端重试耗尽后的终态失败
    #[error("Synthesis failed ({}): {message}", kind.as_str())]
    SynthesisFailed {
        kind: SynthesisFailureKind,
        message: String,
    },

    /// 仓储错误
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// 存储错误
    #[error("Storage error: {0}")]
    StorageError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: Uuid) -> Self {
        Self::NotFound { resource_type, id }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建配置错误
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<crate::application::ports::RepositoryError> for ApplicationError {
    fn from(err: crate::application::ports::RepositoryError) -> Self {
        Self::RepositoryError(err.to_string())
    }
}

impl From<crate::application::ports::AudioStoreError> for ApplicationError {
    fn from(err: crate::application::ports::AudioStoreError) -> Self {
        Self::StorageError(err.to_string())
    }
}

//! Speech Backend Port - 语音合成后端抽象
//!
//! 定义外部合成后端的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::voice::IdentityId;

/// 后端错误
///
/// 按 HTTP 风格的故障类别区分，调度器据此决定是否重试
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Remote error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 合成任务中使用的声音
#[derive(Debug, Clone)]
pub enum JobVoice {
    /// 克隆声音，携带参考音频字节
    Cloned {
        identity_id: IdentityId,
        reference_audio: Vec<u8>,
    },
    /// 预设声音，按名称选择
    Preset { voice: String },
}

impl JobVoice {
    /// 日志里使用的声音标签
    pub fn label(&self) -> String {
        match self {
            Self::Cloned { identity_id, .. } => format!("cloned:{}", identity_id),
            Self::Preset { voice } => format!("preset:{}", voice),
        }
    }
}

/// 合成任务
#[derive(Debug, Clone)]
pub struct SynthesisJob {
    /// 要合成的文本内容
    pub text: String,
    /// 语言代码 (如 "zh-cn", "en")
    pub language: String,
    /// 使用的声音
    pub voice: JobVoice,
}

/// 合成结果
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    /// 原始音频数据
    pub audio: Vec<u8>,
    /// MIME 类型 (如 "audio/wav")
    pub content_type: String,
    /// 音频时长（毫秒）
    pub duration_ms: Option<u64>,
}

/// Speech Backend Port
///
/// 外部合成服务的抽象接口
#[async_trait]
pub trait SpeechBackendPort: Send + Sync {
    /// 执行一次合成
    ///
    /// 单次调用，不含重试。超时与重试由调度器统一控制
    async fn synthesize(&self, job: &SynthesisJob) -> Result<SynthesizedAudio, BackendError>;

    /// 检查后端是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}

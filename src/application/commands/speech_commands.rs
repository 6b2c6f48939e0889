//! Speech Commands - 合成相关命令

use uuid::Uuid;

/// 合成语音命令
#[derive(Debug, Clone)]
pub struct SynthesizeSpeech {
    /// 要合成的文本
    pub text: String,
    /// 显式指定的声音身份（预听/换声合成）
    pub explicit_identity_id: Option<Uuid>,
    /// 归属内容
    pub content_id: Option<Uuid>,
    /// 单独提供的归属者
    pub owner_id: Option<Uuid>,
    /// 解析不到身份时的预设兜底声音
    pub fallback_voice: String,
    /// 语言代码，缺省取配置的默认语言
    pub language: Option<String>,
}

/// 缓存状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

/// 合成语音响应
#[derive(Debug, Clone)]
pub struct SynthesizeSpeechResponse {
    /// 音频数据
    pub audio: Vec<u8>,
    /// MIME 类型
    pub content_type: String,
    /// 本次请求是否命中缓存
    pub cache_status: CacheStatus,
    /// 产出音频的后端名称，缓存命中时为 "cache"
    pub backend_used: String,
    /// 后端尝试次数，缓存命中时为 0
    pub attempts: u32,
}

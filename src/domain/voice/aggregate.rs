//! Voice Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FallbackVoice, IdentityId};

/// 身份来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// 档案默认声音
    ProfileDefault,
    /// 内容专属声音
    ContentSpecific,
    /// 匿名录制声音
    Anonymous,
}

impl IdentitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProfileDefault => "profile_default",
            Self::ContentSpecific => "content_specific",
            Self::Anonymous => "anonymous",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "profile_default" => Some(Self::ProfileDefault),
            "content_specific" => Some(Self::ContentSpecific),
            "anonymous" => Some(Self::Anonymous),
            _ => None,
        }
    }
}

/// VoiceIdentity 聚合根
///
/// 不变量:
/// - profile_default / content_specific 身份必须有归属者
/// - anonymous 身份没有归属者
/// - reference_audio_location 指向对象存储中的参考音频
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceIdentity {
    id: IdentityId,
    owner_id: Option<Uuid>,
    source: IdentitySource,
    reference_audio_location: String,
    created_at: DateTime<Utc>,
}

impl VoiceIdentity {
    /// 创建档案默认身份
    pub fn profile_default(owner_id: Uuid, reference_audio_location: impl Into<String>) -> Self {
        Self {
            id: IdentityId::new(),
            owner_id: Some(owner_id),
            source: IdentitySource::ProfileDefault,
            reference_audio_location: reference_audio_location.into(),
            created_at: Utc::now(),
        }
    }

    /// 创建内容专属身份
    pub fn content_specific(owner_id: Uuid, reference_audio_location: impl Into<String>) -> Self {
        Self {
            id: IdentityId::new(),
            owner_id: Some(owner_id),
            source: IdentitySource::ContentSpecific,
            reference_audio_location: reference_audio_location.into(),
            created_at: Utc::now(),
        }
    }

    /// 创建匿名身份
    pub fn anonymous(reference_audio_location: impl Into<String>) -> Self {
        Self {
            id: IdentityId::new(),
            owner_id: None,
            source: IdentitySource::Anonymous,
            reference_audio_location: reference_audio_location.into(),
            created_at: Utc::now(),
        }
    }

    /// 从持久化记录重建,校验归属不变量
    pub fn from_parts(
        id: IdentityId,
        owner_id: Option<Uuid>,
        source: IdentitySource,
        reference_audio_location: String,
        created_at: DateTime<Utc>,
    ) -> Result<Self, &'static str> {
        match (source, owner_id) {
            (IdentitySource::Anonymous, Some(_)) => Err("匿名身份不能有归属者"),
            (IdentitySource::ProfileDefault | IdentitySource::ContentSpecific, None) => {
                Err("非匿名身份必须有归属者")
            }
            _ => Ok(Self {
                id,
                owner_id,
                source,
                reference_audio_location,
                created_at,
            }),
        }
    }

    // Getters
    pub fn id(&self) -> &IdentityId {
        &self.id
    }

    pub fn owner_id(&self) -> Option<&Uuid> {
        self.owner_id.as_ref()
    }

    pub fn source(&self) -> IdentitySource {
        self.source
    }

    pub fn reference_audio_location(&self) -> &str {
        &self.reference_audio_location
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// 合成请求最终解析出的声音
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedVoice {
    /// 克隆声音,需要具备克隆能力的后端
    Identity(VoiceIdentity),
    /// 预设兜底声音
    Fallback(FallbackVoice),
}

impl ResolvedVoice {
    /// 是否需要声音克隆能力
    pub fn requires_cloning(&self) -> bool {
        matches!(self, Self::Identity(_))
    }

    pub fn identity(&self) -> Option<&VoiceIdentity> {
        match self {
            Self::Identity(identity) => Some(identity),
            Self::Fallback(_) => None,
        }
    }

    /// 缓存 key 中的声音标记
    ///
    /// 同一文本配不同声音必须产生不同的标记,且跨进程重启保持稳定
    pub fn cache_tag(&self) -> String {
        match self {
            Self::Identity(identity) => format!("id:{}", identity.id()),
            Self::Fallback(voice) => format!("fb:{}", voice.as_str()),
        }
    }
}

impl std::fmt::Display for ResolvedVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity(identity) => write!(f, "identity:{}", identity.id()),
            Self::Fallback(voice) => write!(f, "fallback:{}", voice.as_str()),
        }
    }
}

//! Voice Resolver - 声音身份解析
//!
//! 按优先级排列的策略链，逐个求值取第一个命中:
//! 1. 调用方显式指定的身份
//! 2. 内容归属档案的当前身份（优先于内容上登记的旧身份，档案换声后旧登记视为过时）
//! 3. 内容上登记的身份
//! 4. 内容无归属者时，调用方单独提供的归属者档案身份
//!
//! 全部未命中时回落到请求中的预设声音。解析本身不触发合成、不读缓存

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::error::ApplicationError;
use crate::application::ports::{ContentStorePort, ContentVoiceContext, ProfileStorePort};
use crate::domain::voice::{FallbackVoice, IdentityId, ResolvedVoice};

/// 解析请求
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    /// 调用方显式指定的身份（预听/换声合成时使用）
    pub explicit_identity_id: Option<IdentityId>,
    /// 归属内容
    pub content_id: Option<Uuid>,
    /// 单独提供的归属者
    pub owner_id: Option<Uuid>,
    /// 兜底预设声音
    pub fallback_voice: FallbackVoice,
}

/// 单个策略的求值结果
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// 命中，解析结束
    Resolved(ResolvedVoice),
    /// 本策略不适用，继续下一个
    Continue,
}

/// 解析策略
///
/// 每个策略只依赖请求与预取的内容上下文，互相独立，可单独测试
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    /// 日志里使用的策略名
    fn name(&self) -> &'static str;

    async fn evaluate(
        &self,
        request: &ResolveRequest,
        content: Option<&ContentVoiceContext>,
    ) -> Result<StepOutcome, ApplicationError>;
}

/// 策略 1: 显式指定的身份
///
/// 指定了不存在的身份按 NotFound 处理而不是静默落空，
/// 否则调用方拿到的会是别的声音
pub struct ExplicitOverride {
    profiles: Arc<dyn ProfileStorePort>,
}

impl ExplicitOverride {
    pub fn new(profiles: Arc<dyn ProfileStorePort>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl ResolveStrategy for ExplicitOverride {
    fn name(&self) -> &'static str {
        "explicit_override"
    }

    async fn evaluate(
        &self,
        request: &ResolveRequest,
        _content: Option<&ContentVoiceContext>,
    ) -> Result<StepOutcome, ApplicationError> {
        let Some(identity_id) = &request.explicit_identity_id else {
            return Ok(StepOutcome::Continue);
        };
        match self.profiles.find_identity(identity_id).await? {
            Some(identity) => Ok(StepOutcome::Resolved(ResolvedVoice::Identity(identity))),
            None => Err(ApplicationError::not_found(
                "voice identity",
                *identity_id.as_uuid(),
            )),
        }
    }
}

/// 策略 2: 内容归属档案的当前身份
pub struct ContentOwnerProfile {
    profiles: Arc<dyn ProfileStorePort>,
}

impl ContentOwnerProfile {
    pub fn new(profiles: Arc<dyn ProfileStorePort>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl ResolveStrategy for ContentOwnerProfile {
    fn name(&self) -> &'static str {
        "content_owner_profile"
    }

    async fn evaluate(
        &self,
        _request: &ResolveRequest,
        content: Option<&ContentVoiceContext>,
    ) -> Result<StepOutcome, ApplicationError> {
        let Some(owner_id) = content.and_then(|c| c.owner_id) else {
            return Ok(StepOutcome::Continue);
        };
        match self.profiles.current_identity(owner_id).await? {
            Some(identity) => Ok(StepOutcome::Resolved(ResolvedVoice::Identity(identity))),
            None => Ok(StepOutcome::Continue),
        }
    }
}

/// 策略 3: 内容上登记的身份
///
/// 只有归属档案没有当前身份时才会走到这里，登记的身份可能已过时
pub struct ContentRecordedIdentity {
    profiles: Arc<dyn ProfileStorePort>,
}

impl ContentRecordedIdentity {
    pub fn new(profiles: Arc<dyn ProfileStorePort>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl ResolveStrategy for ContentRecordedIdentity {
    fn name(&self) -> &'static str {
        "content_recorded_identity"
    }

    async fn evaluate(
        &self,
        _request: &ResolveRequest,
        content: Option<&ContentVoiceContext>,
    ) -> Result<StepOutcome, ApplicationError> {
        let Some(identity_id) = content.and_then(|c| c.identity_id.as_ref()) else {
            return Ok(StepOutcome::Continue);
        };
        match self.profiles.find_identity(identity_id).await? {
            Some(identity) => Ok(StepOutcome::Resolved(ResolvedVoice::Identity(identity))),
            None => {
                // 内容指向的身份已不存在，继续往下解析
                warn!(identity_id = %identity_id, "content references missing voice identity");
                Ok(StepOutcome::Continue)
            }
        }
    }
}

/// 策略 4: 单独提供的归属者档案身份
///
/// 仅当内容没有归属者（或根本没给内容）时适用，
/// 有归属者的内容已经在策略 2 里查过档案
pub struct SuppliedOwnerProfile {
    profiles: Arc<dyn ProfileStorePort>,
}

impl SuppliedOwnerProfile {
    pub fn new(profiles: Arc<dyn ProfileStorePort>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl ResolveStrategy for SuppliedOwnerProfile {
    fn name(&self) -> &'static str {
        "supplied_owner_profile"
    }

    async fn evaluate(
        &self,
        request: &ResolveRequest,
        content: Option<&ContentVoiceContext>,
    ) -> Result<StepOutcome, ApplicationError> {
        if content.is_some_and(|c| c.owner_id.is_some()) {
            return Ok(StepOutcome::Continue);
        }
        let Some(owner_id) = request.owner_id else {
            return Ok(StepOutcome::Continue);
        };
        match self.profiles.current_identity(owner_id).await? {
            Some(identity) => Ok(StepOutcome::Resolved(ResolvedVoice::Identity(identity))),
            None => Ok(StepOutcome::Continue),
        }
    }
}

/// Voice Resolver
///
/// 持有策略链，内容上下文只预取一次供所有策略共用
pub struct VoiceResolver {
    contents: Arc<dyn ContentStorePort>,
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl VoiceResolver {
    pub fn new(profiles: Arc<dyn ProfileStorePort>, contents: Arc<dyn ContentStorePort>) -> Self {
        let strategies: Vec<Box<dyn ResolveStrategy>> = vec![
            Box::new(ExplicitOverride::new(profiles.clone())),
            Box::new(ContentOwnerProfile::new(profiles.clone())),
            Box::new(ContentRecordedIdentity::new(profiles.clone())),
            Box::new(SuppliedOwnerProfile::new(profiles)),
        ];
        Self {
            contents,
            strategies,
        }
    }

    /// 解析本次请求应使用的声音
    ///
    /// 内容记录不存在不算错误，请求可能先于内容创建到达
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<ResolvedVoice, ApplicationError> {
        let content = match request.content_id {
            Some(content_id) => self.contents.voice_context(content_id).await?,
            None => None,
        };

        for strategy in &self.strategies {
            match strategy.evaluate(request, content.as_ref()).await? {
                StepOutcome::Resolved(voice) => {
                    debug!(strategy = strategy.name(), voice = %voice, "voice resolved");
                    return Ok(voice);
                }
                StepOutcome::Continue => {}
            }
        }

        debug!(fallback = %request.fallback_voice, "no identity resolved, using fallback voice");
        Ok(ResolvedVoice::Fallback(request.fallback_voice.clone()))
    }
}

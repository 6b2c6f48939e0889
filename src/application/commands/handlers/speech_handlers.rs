//! Speech Command Handlers - 合成编排
//!
//! 单次合成请求的完整流水线:
//! 校验 -> 身份解析 -> 缓存查找 -> 后端调度 -> 入库 -> 写回内容记录
//!
//! 缓存与写回的失败只记日志，永远不让请求失败

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::commands::{CacheStatus, SynthesizeSpeech, SynthesizeSpeechResponse};
use crate::application::dispatch::SynthesisDispatcher;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    normalize_text, render_cache_key, AudioStoreError, AudioStorePort, ContentStorePort, JobVoice,
    PersistOutcome, RenderCachePort, RenderEntry, SynthesisJob,
};
use crate::application::resolver::{ResolveRequest, VoiceResolver};
use crate::domain::voice::{FallbackVoice, IdentityId, ResolvedVoice};

/// 合成输入约束
#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    /// 单次合成的最大字符数，超长请求在触达后端前拒绝
    pub max_text_chars: usize,
    /// 允许的语言代码
    pub allowed_languages: Vec<String>,
    /// 未指定语言时的默认值
    pub default_language: String,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            max_text_chars: 4096,
            allowed_languages: vec![
                "en", "es", "fr", "de", "it", "pt", "pl", "tr", "ru", "nl", "cs", "ar", "zh-cn",
                "ja", "hu", "ko", "hi",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            default_language: "en".to_string(),
        }
    }
}

/// SynthesizeSpeech Handler
#[derive(Clone)]
pub struct SynthesizeSpeechHandler {
    settings: SynthesisSettings,
    resolver: Arc<VoiceResolver>,
    dispatcher: Arc<SynthesisDispatcher>,
    render_cache: Arc<dyn RenderCachePort>,
    audio_store: Arc<dyn AudioStorePort>,
    content_store: Arc<dyn ContentStorePort>,
}

impl SynthesizeSpeechHandler {
    pub fn new(
        settings: SynthesisSettings,
        resolver: Arc<VoiceResolver>,
        dispatcher: Arc<SynthesisDispatcher>,
        render_cache: Arc<dyn RenderCachePort>,
        audio_store: Arc<dyn AudioStorePort>,
        content_store: Arc<dyn ContentStorePort>,
    ) -> Self {
        Self {
            settings,
            resolver,
            dispatcher,
            render_cache,
            audio_store,
            content_store,
        }
    }

    /// 处理合成命令
    ///
    /// 流水线跑在独立任务上: 调用方放弃等待时合成继续执行完，
    /// 结果照常进缓存，下次请求直接命中
    pub async fn handle(
        &self,
        command: SynthesizeSpeech,
    ) -> Result<SynthesizeSpeechResponse, ApplicationError> {
        let handler = self.clone();
        match tokio::spawn(async move { handler.run(command).await }).await {
            Ok(result) => result,
            Err(e) => Err(ApplicationError::internal(format!(
                "synthesis task aborted: {}",
                e
            ))),
        }
    }

    async fn run(
        &self,
        command: SynthesizeSpeech,
    ) -> Result<SynthesizeSpeechResponse, ApplicationError> {
        // 1. 校验输入，任何后端/缓存动作之前完成
        let (text, language, fallback_voice) = self.validate(&command)?;

        // 2. 解析声音身份
        let request = ResolveRequest {
            explicit_identity_id: command.explicit_identity_id.map(IdentityId::from_uuid),
            content_id: command.content_id,
            owner_id: command.owner_id,
            fallback_voice,
        };
        let voice = self.resolver.resolve(&request).await?;
        let hash = render_cache_key(&text, &voice.cache_tag());

        // 3. 缓存查找，缓存故障一律降级为未命中。
        //    命中同样补一次写回: 条目可能出自没带 content_id 的早先请求
        if let Some((response, location)) = self.try_cache(&hash).await {
            self.spawn_persist(command.content_id, &voice, location);
            return Ok(response);
        }

        // 4. 构建任务并调度后端
        let job_voice = self.job_voice(&voice).await?;
        let job = SynthesisJob {
            text,
            language,
            voice: job_voice,
        };
        let outcome = self.dispatcher.dispatch(&job).await?;

        // 5. 音频入库 + 写缓存条目，失败只告警，新鲜音频照常返回
        let audio = outcome.audio;
        let stored_location = self.store_result(&hash, &job.text, &voice, &audio).await;

        // 6. 渲染位置写回内容记录，不等待结果
        if let Some(location) = stored_location {
            self.spawn_persist(command.content_id, &voice, location);
        }

        Ok(SynthesizeSpeechResponse {
            audio: audio.audio,
            content_type: audio.content_type,
            cache_status: CacheStatus::Miss,
            backend_used: outcome.backend,
            attempts: outcome.attempts,
        })
    }

    /// 校验并规范化输入
    fn validate(
        &self,
        command: &SynthesizeSpeech,
    ) -> Result<(String, String, FallbackVoice), ApplicationError> {
        let text = normalize_text(&command.text);
        if text.is_empty() {
            return Err(ApplicationError::validation("text must not be empty"));
        }
        let chars = text.chars().count();
        if chars > self.settings.max_text_chars {
            return Err(ApplicationError::validation(format!(
                "text too long: {} chars (max {})",
                chars, self.settings.max_text_chars
            )));
        }

        let language = command
            .language
            .clone()
            .unwrap_or_else(|| self.settings.default_language.clone())
            .to_lowercase();
        if !self.settings.allowed_languages.contains(&language) {
            return Err(ApplicationError::validation(format!(
                "unsupported language: {}",
                language
            )));
        }

        let fallback_voice =
            FallbackVoice::new(command.fallback_voice.clone()).map_err(ApplicationError::validation)?;

        Ok((text, language, fallback_voice))
    }

    /// 缓存命中时取回音频，连同条目登记的存储位置一起返回
    ///
    /// 条目存在但音频对象丢失按未命中处理，重新合成后覆盖
    async fn try_cache(&self, hash: &str) -> Option<(SynthesizeSpeechResponse, String)> {
        let entry = match self.render_cache.lookup(hash).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(hash = %hash, error = %e, "cache lookup failed, treating as miss");
                return None;
            }
        };

        match self.audio_store.get(&entry.audio_location).await {
            Ok(audio) => {
                tracing::info!(
                    hash = %hash,
                    access_count = entry.access_count,
                    "render cache hit"
                );
                let response = SynthesizeSpeechResponse {
                    audio,
                    content_type: entry.content_type,
                    cache_status: CacheStatus::Hit,
                    backend_used: "cache".to_string(),
                    attempts: 0,
                };
                Some((response, entry.audio_location))
            }
            Err(AudioStoreError::NotFound(location)) => {
                tracing::warn!(
                    hash = %hash,
                    location = %location,
                    "cached audio object missing, regenerating"
                );
                None
            }
            Err(e) => {
                tracing::warn!(hash = %hash, error = %e, "audio store read failed, treating as miss");
                None
            }
        }
    }

    /// 克隆声音需要先取回参考音频
    async fn job_voice(&self, voice: &ResolvedVoice) -> Result<JobVoice, ApplicationError> {
        match voice {
            ResolvedVoice::Identity(identity) => {
                let reference_audio = match self
                    .audio_store
                    .get(identity.reference_audio_location())
                    .await
                {
                    Ok(audio) => audio,
                    Err(AudioStoreError::NotFound(location)) => {
                        tracing::error!(
                            identity_id = %identity.id(),
                            location = %location,
                            "reference audio missing"
                        );
                        return Err(ApplicationError::not_found(
                            "reference audio",
                            *identity.id().as_uuid(),
                        ));
                    }
                    Err(e) => return Err(e.into()),
                };
                Ok(JobVoice::Cloned {
                    identity_id: identity.id().clone(),
                    reference_audio,
                })
            }
            ResolvedVoice::Fallback(fallback) => Ok(JobVoice::Preset {
                voice: fallback.as_str().to_string(),
            }),
        }
    }

    /// 音频写入对象存储并登记缓存条目
    ///
    /// 返回成功入库的位置，任一步失败返回 None
    async fn store_result(
        &self,
        hash: &str,
        text: &str,
        voice: &ResolvedVoice,
        audio: &crate::application::ports::SynthesizedAudio,
    ) -> Option<String> {
        let location = match self
            .audio_store
            .put(&audio.audio, extension_for(&audio.content_type))
            .await
        {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!(
                    hash = %hash,
                    error = %e,
                    "failed to store synthesized audio, returning uncached result"
                );
                return None;
            }
        };

        let now = Utc::now().timestamp();
        let entry = RenderEntry {
            hash: hash.to_string(),
            text: text.to_string(),
            audio_location: location.clone(),
            content_type: audio.content_type.clone(),
            voice_tag: voice.cache_tag(),
            size_bytes: audio.audio.len() as u64,
            // 产出请求本身计第一次访问
            access_count: 1,
            created_at: now,
            last_accessed_at: now,
        };
        if let Err(e) = self.render_cache.store(entry).await {
            tracing::warn!(hash = %hash, error = %e, "failed to store render cache entry");
        }

        Some(location)
    }

    /// 渲染位置写回内容记录，跑在独立任务上，调用方不等待
    fn spawn_persist(&self, content_id: Option<Uuid>, voice: &ResolvedVoice, location: String) {
        let Some(content_id) = content_id else {
            return;
        };
        let content_store = self.content_store.clone();
        let identity_id = voice.identity().map(|identity| identity.id().clone());
        tokio::spawn(async move {
            persist_rendering(content_store, content_id, identity_id, location).await;
        });
    }
}

/// 执行写回并记录结果
///
/// 跳过与失败都只记日志，绝不影响已经返回的合成响应
async fn persist_rendering(
    content_store: Arc<dyn ContentStorePort>,
    content_id: Uuid,
    identity_id: Option<IdentityId>,
    location: String,
) {
    match content_store
        .attach_rendering(content_id, identity_id.as_ref(), &location)
        .await
    {
        Ok(PersistOutcome::Attached) => {
            tracing::info!(
                content_id = %content_id,
                location = %location,
                "rendering attached to content"
            );
        }
        Ok(outcome) => {
            tracing::info!(
                content_id = %content_id,
                reason = outcome.as_str(),
                "rendering not attached"
            );
        }
        Err(e) => {
            tracing::warn!(
                content_id = %content_id,
                error = %e,
                "failed to attach rendering"
            );
        }
    }
}

/// 按 MIME 推断存储用扩展名
fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" => "ogg",
        _ => "bin",
    }
}

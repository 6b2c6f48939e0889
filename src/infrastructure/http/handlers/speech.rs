//! Speech Handlers

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::application::{ListBackends, SynthesizeSpeech};
use crate::infrastructure::http::dto::{ApiResponse, BackendStatusDto, SynthesizeSpeechRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// POST /api/speech/synthesize
///
/// 成功时直接返回音频字节，缓存与后端信息放响应头:
/// X-Cache-Status: hit | miss
/// X-Backend-Used: 后端名，命中缓存时为 "cache"
/// X-Synthesis-Attempts: 后端尝试次数，命中缓存时为 0
pub async fn synthesize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SynthesizeSpeechRequest>,
) -> Result<Response, ApiError> {
    let command = SynthesizeSpeech {
        text: req.text,
        explicit_identity_id: req.voice_id,
        content_id: req.content_id,
        owner_id: req.owner_id,
        fallback_voice: req.fallback_voice,
        language: req.language,
    };

    let result = state.synthesize_handler.handle(command).await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, result.content_type)
        .header(header::CONTENT_LENGTH, result.audio.len())
        .header("X-Cache-Status", result.cache_status.as_str())
        .header("X-Backend-Used", result.backend_used)
        .header("X-Synthesis-Attempts", result.attempts.to_string())
        .body(Body::from(result.audio))
        .unwrap())
}

/// GET /api/speech/backends
pub async fn list_backends(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<BackendStatusDto>>>, ApiError> {
    let statuses = state.list_backends_handler.handle(ListBackends).await?;

    let dtos = statuses
        .into_iter()
        .map(|s| BackendStatusDto {
            name: s.name,
            enabled: s.enabled,
            priority: s.priority,
            supports_cloning: s.supports_cloning,
            healthy: s.healthy,
            attempts: s.attempts,
            failures: s.failures,
            last_error: s.last_error,
        })
        .collect();

    Ok(Json(ApiResponse::success(dtos)))
}

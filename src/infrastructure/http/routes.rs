//! HTTP Routes
//!
//! API 路由定义
//!
//! API Endpoints:
//! - /api/ping               GET   健康检查
//! - /api/speech/synthesize  POST  文本合成语音（返回音频字节）
//! - /api/speech/backends    GET   列出已注册后端及其状态
//! - /api/cache/stats        GET   渲染缓存与音频库统计

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/api", api_routes())
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/speech", speech_routes())
        .nest("/cache", cache_routes())
}

/// Speech 路由
fn speech_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/synthesize", post(handlers::synthesize))
        .route("/backends", get(handlers::list_backends))
}

/// Cache 路由
fn cache_routes() -> Router<Arc<AppState>> {
    Router::new().route("/stats", get(handlers::cache_stats))
}

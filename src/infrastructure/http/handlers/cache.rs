//! Cache Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::GetCacheStats;
use crate::infrastructure::http::dto::{ApiResponse, CacheStatsDto};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// GET /api/cache/stats
pub async fn cache_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CacheStatsDto>>, ApiError> {
    let stats = state.cache_stats_handler.handle(GetCacheStats).await?;

    Ok(Json(ApiResponse::success(CacheStatsDto {
        total_entries: stats.total_entries,
        total_size_bytes: stats.total_size_bytes,
        hit_count: stats.hit_count,
        miss_count: stats.miss_count,
        store_used_bytes: stats.store_used_bytes,
        store_blob_count: stats.store_blob_count,
    })))
}

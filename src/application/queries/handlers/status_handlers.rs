//! Status Query Handlers - 后端与缓存的运行状态
//!
//! 只读快照，供运维排查用，不参与合成流水线

use std::sync::Arc;

use crate::application::dispatch::SynthesisDispatcher;
use crate::application::error::ApplicationError;
use crate::application::ports::{AudioStorePort, RenderCachePort};
use crate::application::queries::{GetCacheStats, ListBackends};

// ============================================================================
// Response DTOs
// ============================================================================

/// 单个后端的状态快照
#[derive(Debug, Clone)]
pub struct BackendStatusResponse {
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub supports_cloning: bool,
    pub healthy: bool,
    pub attempts: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

/// 渲染缓存与音频库统计
#[derive(Debug, Clone)]
pub struct CacheStatsResponse {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub store_used_bytes: u64,
    pub store_blob_count: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// ListBackends Handler
pub struct ListBackendsHandler {
    dispatcher: Arc<SynthesisDispatcher>,
}

impl ListBackendsHandler {
    pub fn new(dispatcher: Arc<SynthesisDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub async fn handle(
        &self,
        _query: ListBackends,
    ) -> Result<Vec<BackendStatusResponse>, ApplicationError> {
        let mut statuses = Vec::new();
        for backend in self.dispatcher.registered() {
            let healthy = backend.descriptor.enabled && backend.client.health_check().await;
            let counters = self.dispatcher.counters(&backend.descriptor.name);
            statuses.push(BackendStatusResponse {
                name: backend.descriptor.name.clone(),
                enabled: backend.descriptor.enabled,
                priority: backend.descriptor.priority,
                supports_cloning: backend.descriptor.supports_cloning,
                healthy,
                attempts: counters.attempts,
                failures: counters.failures,
                last_error: counters.last_error,
            });
        }
        Ok(statuses)
    }
}

/// GetCacheStats Handler
pub struct CacheStatsHandler {
    render_cache: Arc<dyn RenderCachePort>,
    audio_store: Arc<dyn AudioStorePort>,
}

impl CacheStatsHandler {
    pub fn new(render_cache: Arc<dyn RenderCachePort>, audio_store: Arc<dyn AudioStorePort>) -> Self {
        Self {
            render_cache,
            audio_store,
        }
    }

    pub async fn handle(&self, _query: GetCacheStats) -> Result<CacheStatsResponse, ApplicationError> {
        let cache = self.render_cache.stats().await;
        let store = self.audio_store.stats().await?;
        Ok(CacheStatsResponse {
            total_entries: cache.total_entries,
            total_size_bytes: cache.total_size_bytes,
            hit_count: cache.hit_count,
            miss_count: cache.miss_count,
            store_used_bytes: store.used_bytes,
            store_blob_count: store.blob_count,
        })
    }
}

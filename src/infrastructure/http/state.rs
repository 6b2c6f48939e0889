//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::{
    // Command handlers
    SynthesizeSpeechHandler,
    // Query handlers
    CacheStatsHandler, ListBackendsHandler,
    // Ports
    AudioStorePort, ContentStorePort, ProfileStorePort, RenderCachePort,
    // 编排组件
    SynthesisDispatcher, SynthesisSettings, VoiceResolver,
};

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub profile_store: Arc<dyn ProfileStorePort>,
    pub content_store: Arc<dyn ContentStorePort>,
    pub render_cache: Arc<dyn RenderCachePort>,
    pub audio_store: Arc<dyn AudioStorePort>,
    pub dispatcher: Arc<SynthesisDispatcher>,

    // ========== Command Handlers ==========
    pub synthesize_handler: SynthesizeSpeechHandler,

    // ========== Query Handlers ==========
    pub list_backends_handler: ListBackendsHandler,
    pub cache_stats_handler: CacheStatsHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        settings: SynthesisSettings,
        profile_store: Arc<dyn ProfileStorePort>,
        content_store: Arc<dyn ContentStorePort>,
        render_cache: Arc<dyn RenderCachePort>,
        audio_store: Arc<dyn AudioStorePort>,
        dispatcher: Arc<SynthesisDispatcher>,
    ) -> Self {
        let resolver = Arc::new(VoiceResolver::new(
            profile_store.clone(),
            content_store.clone(),
        ));

        Self {
            // Ports
            profile_store: profile_store.clone(),
            content_store: content_store.clone(),
            render_cache: render_cache.clone(),
            audio_store: audio_store.clone(),
            dispatcher: dispatcher.clone(),

            // Command handlers
            synthesize_handler: SynthesizeSpeechHandler::new(
                settings,
                resolver,
                dispatcher.clone(),
                render_cache.clone(),
                audio_store.clone(),
                content_store,
            ),

            // Query handlers
            list_backends_handler: ListBackendsHandler::new(dispatcher),
            cache_stats_handler: CacheStatsHandler::new(render_cache, audio_store),
        }
    }
}

//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_store;
mod render_cache;
mod repositories;
mod speech_backend;

pub use audio_store::{AudioStoreError, AudioStorePort, StoreStats};
pub use render_cache::{
    normalize_text, render_cache_key, CacheError, CacheStats, RenderCachePort, RenderEntry,
};
pub use repositories::{
    ContentStorePort, ContentVoiceContext, PersistOutcome, ProfileStorePort, RepositoryError,
};
pub use speech_backend::{
    BackendError, JobVoice, SpeechBackendPort, SynthesisJob, SynthesizedAudio,
};

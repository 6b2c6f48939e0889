//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SpeechBackend、RenderCache、AudioStore、Store 等）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - resolver: 声音身份解析链
//! - dispatch: 合成后端调度
//! - retry: 重试策略
//! - error: 应用层错误定义

pub mod commands;
pub mod dispatch;
pub mod error;
pub mod ports;
pub mod queries;
pub mod resolver;
pub mod retry;

// Re-exports
pub use commands::{
    // Speech commands
    CacheStatus,
    SynthesizeSpeech,
    SynthesizeSpeechResponse,
    // Handlers
    handlers::{SynthesisSettings, SynthesizeSpeechHandler},
};

pub use dispatch::{
    BackendCounters, BackendDescriptor, DispatchOutcome, RegisteredBackend, SynthesisDispatcher,
};

pub use error::{ApplicationError, SynthesisFailureKind};

pub use ports::{
    // Render cache
    normalize_text,
    render_cache_key,
    CacheError,
    CacheStats,
    RenderCachePort,
    RenderEntry,
    // Audio store
    AudioStoreError,
    AudioStorePort,
    StoreStats,
    // Repositories
    ContentStorePort,
    ContentVoiceContext,
    PersistOutcome,
    ProfileStorePort,
    RepositoryError,
    // Speech backend
    BackendError,
    JobVoice,
    SpeechBackendPort,
    SynthesisJob,
    SynthesizedAudio,
};

pub use queries::{
    // Status queries
    GetCacheStats,
    ListBackends,
    // Handlers
    handlers::{BackendStatusResponse, CacheStatsHandler, CacheStatsResponse, ListBackendsHandler},
};

pub use resolver::{ResolveRequest, VoiceResolver};
pub use retry::RetryPolicy;

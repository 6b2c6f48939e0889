//! Voxlog - 语音合成调度与缓存服务
//!
//! 架构分层:
//! - Domain: voice/ (声音身份与档案)
//! - Application: commands, queries, ports, resolver, dispatch
//! - Infrastructure: http, persistence, adapters

use std::sync::Arc;

use voxlog::application::{RegisteredBackend, SpeechBackendPort, SynthesisDispatcher};
use voxlog::config::{load_config, print_config, BackendConfig};
use voxlog::infrastructure::adapters::{
    FileAudioStore, PresetHttpClient, PresetHttpClientConfig, StubClient, StubClientConfig,
    XttsHttpClient, XttsHttpClientConfig,
};
use voxlog::infrastructure::http::{AppState, HttpServer, ServerConfig};
use voxlog::infrastructure::persistence::sled::{SledCacheConfig, SledRenderCache};
use voxlog::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteContentStore, SqliteProfileStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},voxlog={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Voxlog - 语音合成调度与缓存服务");
    print_config(&config);

    // 确保数据目录存在
    tokio::fs::create_dir_all(&config.storage.audio_dir).await?;
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if let Some(parent) = std::path::Path::new(&config.cache.db_path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    };
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;

    // 创建 Repository 适配器
    let profile_store = Arc::new(SqliteProfileStore::new(pool.clone()));
    let content_store = Arc::new(SqliteContentStore::new(pool.clone()));

    // 创建 Sled 渲染缓存
    let cache_config = SledCacheConfig {
        db_path: config.cache.db_path.clone(),
    };
    let render_cache = SledRenderCache::new(&cache_config)?.arc();

    // 创建文件音频存储
    let audio_store = Arc::new(FileAudioStore::new(&config.storage.audio_dir).await?);

    // 按配置构建合成后端
    let mut backends = Vec::with_capacity(config.backends.len());
    for backend in &config.backends {
        backends.push(RegisteredBackend {
            descriptor: backend.descriptor(),
            client: build_backend_client(backend)?,
        });
    }
    if backends.is_empty() {
        tracing::warn!("No synthesis backends configured, all requests will fail");
    }

    // 创建合成调度器
    let dispatcher = Arc::new(SynthesisDispatcher::new(
        backends,
        config.retry.policy(),
        config.synthesis.max_concurrent_requests,
    ));

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let state = AppState::new(
        config.synthesis.settings(),
        profile_store,
        content_store,
        render_cache,
        audio_store,
        dispatcher,
    );

    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for ctrl-c");
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// 按配置类型构建后端客户端
fn build_backend_client(backend: &BackendConfig) -> anyhow::Result<Arc<dyn SpeechBackendPort>> {
    let client: Arc<dyn SpeechBackendPort> = match backend.kind.as_str() {
        "xtts-http" => {
            let endpoint = backend.endpoint.clone().ok_or_else(|| {
                anyhow::anyhow!("Backend '{}' requires an endpoint", backend.name)
            })?;
            let mut client_config =
                XttsHttpClientConfig::new(endpoint).with_timeout(backend.attempt_timeout_secs);
            if let Some(health) = &backend.health_endpoint {
                client_config = client_config.with_health_endpoint(health.clone());
            }
            Arc::new(XttsHttpClient::new(client_config)?)
        }
        "preset-http" => {
            let endpoint = backend.endpoint.clone().ok_or_else(|| {
                anyhow::anyhow!("Backend '{}' requires an endpoint", backend.name)
            })?;
            let mut client_config =
                PresetHttpClientConfig::new(endpoint).with_timeout(backend.attempt_timeout_secs);
            if let Some(key) = &backend.api_key {
                client_config = client_config.with_api_key(key.clone());
            }
            Arc::new(PresetHttpClient::new(client_config)?)
        }
        "stub" => Arc::new(StubClient::new(StubClientConfig::default())),
        other => anyhow::bail!("Backend '{}' has unknown kind '{}'", backend.name, other),
    };
    Ok(client)
}

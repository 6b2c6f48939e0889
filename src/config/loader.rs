//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `VOXLOG_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `VOXLOG_SERVER__HOST=127.0.0.1`
/// - `VOXLOG_SERVER__PORT=8080`
/// - `VOXLOG_DATABASE__PATH=/data/voxlog.db`
/// - `VOXLOG_LOG__LEVEL=debug`
///
/// # 返回
/// - `Ok(AppConfig)` - 成功加载的配置
/// - `Err(ConfigError)` - 加载失败
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    // 后端列表没有默认项，未配置时为空，由验证阶段拦截
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5210)?
        .set_default("synthesis.max_text_chars", 4096)?
        .set_default("synthesis.max_concurrent_requests", 0)?
        .set_default("synthesis.default_language", "en")?
        .set_default("retry.max_attempts", 2)?
        .set_default("retry.server_error_backoff_ms", 500)?
        .set_default("retry.timeout_backoff_ms", 2000)?
        .set_default("cache.db_path", "data/render_cache.sled")?
        .set_default("storage.audio_dir", "data/audio")?
        .set_default("database.path", "data/voxlog.db")?
        .set_default("database.max_connections", 5)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        // 搜索默认配置文件
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: VOXLOG_
    // 层级分隔符: __ (双下划线)
    // 例如: VOXLOG_DATABASE__PATH=/data/voxlog.db
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("VOXLOG")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    // 验证端口范围
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    // 验证合成限制
    if config.synthesis.max_text_chars == 0 {
        return Err(ConfigError::ValidationError(
            "synthesis.max_text_chars cannot be 0".to_string(),
        ));
    }
    if !config
        .synthesis
        .allowed_languages
        .contains(&config.synthesis.default_language)
    {
        return Err(ConfigError::ValidationError(format!(
            "Default language '{}' is not in allowed_languages",
            config.synthesis.default_language
        )));
    }

    // 验证重试策略
    if config.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "retry.max_attempts must be at least 1".to_string(),
        ));
    }
    if config.retry.timeout_backoff_ms <= config.retry.server_error_backoff_ms {
        return Err(ConfigError::ValidationError(
            "retry.timeout_backoff_ms must be greater than retry.server_error_backoff_ms"
                .to_string(),
        ));
    }

    // 验证数据库路径
    if config.database.path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Database path cannot be empty".to_string(),
        ));
    }

    // 验证后端列表
    let mut names = HashSet::new();
    for backend in &config.backends {
        if backend.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "Backend name cannot be empty".to_string(),
            ));
        }
        if !names.insert(backend.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate backend name: {}",
                backend.name
            )));
        }
        match backend.kind.as_str() {
            "xtts-http" | "preset-http" => {
                if backend.endpoint.is_none() {
                    return Err(ConfigError::ValidationError(format!(
                        "Backend '{}' of kind '{}' requires an endpoint",
                        backend.name, backend.kind
                    )));
                }
            }
            "stub" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Backend '{}' has unknown kind '{}'",
                    backend.name, other
                )));
            }
        }
        if backend.attempt_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(format!(
                "Backend '{}' attempt timeout cannot be 0",
                backend.name
            )));
        }
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Max Text Chars: {}", config.synthesis.max_text_chars);
    if config.synthesis.max_concurrent_requests > 0 {
        tracing::info!(
            "Max Concurrent Requests: {}",
            config.synthesis.max_concurrent_requests
        );
    }
    tracing::info!(
        "Retry: {} attempts, backoff {}ms / {}ms (server error / timeout)",
        config.retry.max_attempts,
        config.retry.server_error_backoff_ms,
        config.retry.timeout_backoff_ms
    );
    for backend in &config.backends {
        tracing::info!(
            "Backend: {} (kind={}, priority={}, cloning={}, enabled={})",
            backend.name,
            backend.kind,
            backend.priority,
            backend.supports_cloning,
            backend.enabled
        );
    }
    tracing::info!("Render Cache: {}", config.cache.db_path);
    tracing::info!("Audio Directory: {:?}", config.storage.audio_dir);
    tracing::info!("Database: {}", config.database.path);
    tracing::info!(
        "Database Max Connections: {}",
        config.database.max_connections
    );
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::BackendConfig;

    fn backend(name: &str, kind: &str, endpoint: Option<&str>) -> BackendConfig {
        BackendConfig {
            name: name.to_string(),
            kind: kind.to_string(),
            enabled: true,
            priority: 0,
            supports_cloning: false,
            endpoint: endpoint.map(String::from),
            health_endpoint: None,
            attempt_timeout_secs: 30,
            api_key: None,
        }
    }

    #[test]
    fn test_load_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5210);
    }

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_attempts() {
        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_when_timeout_backoff_not_longer() {
        let mut config = AppConfig::default();
        config.retry.timeout_backoff_ms = config.retry.server_error_backoff_ms;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_default_language_not_allowed() {
        let mut config = AppConfig::default();
        config.synthesis.default_language = "tlh".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_duplicate_backend_names() {
        let mut config = AppConfig::default();
        config.backends.push(backend("main", "stub", None));
        config.backends.push(backend("main", "stub", None));
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_http_backend_without_endpoint() {
        let mut config = AppConfig::default();
        config.backends.push(backend("xtts", "xtts-http", None));
        assert!(validate_config(&config).is_err());

        config.backends[0].endpoint = Some("http://localhost:8000/api/tts".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_unknown_backend_kind() {
        let mut config = AppConfig::default();
        config
            .backends
            .push(backend("mystery", "carrier-pigeon", None));
        assert!(validate_config(&config).is_err());
    }
}

//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::{BackendDescriptor, RetryPolicy, SynthesisSettings};

/// 应用主配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 合成请求配置
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// 重试策略配置
    #[serde(default)]
    pub retry: RetryConfig,

    /// 合成后端列表
    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    /// 渲染缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            synthesis: SynthesisConfig::default(),
            retry: RetryConfig::default(),
            backends: Vec::new(),
            cache: CacheConfig::default(),
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5210
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 合成请求配置
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// 单次请求的最大字符数
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// 全局在途合成上限，0 表示不限制
    #[serde(default)]
    pub max_concurrent_requests: usize,

    /// 允许的语言代码
    #[serde(default = "default_allowed_languages")]
    pub allowed_languages: Vec<String>,

    /// 未指定语言时的默认值
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_max_text_chars() -> usize {
    4096
}

fn default_allowed_languages() -> Vec<String> {
    [
        "en", "es", "fr", "de", "it", "pt", "pl", "tr", "ru", "nl", "cs", "ar", "zh-cn", "ja",
        "hu", "ko", "hi",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_text_chars: default_max_text_chars(),
            max_concurrent_requests: 0,
            allowed_languages: default_allowed_languages(),
            default_language: default_language(),
        }
    }
}

impl SynthesisConfig {
    /// 转换为应用层的合成设置
    pub fn settings(&self) -> SynthesisSettings {
        SynthesisSettings {
            max_text_chars: self.max_text_chars,
            allowed_languages: self.allowed_languages.clone(),
            default_language: self.default_language.clone(),
        }
    }
}

/// 重试策略配置
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// 单个后端的最大尝试次数（含首次）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// 服务端错误的退避基数（毫秒）
    #[serde(default = "default_server_error_backoff_ms")]
    pub server_error_backoff_ms: u64,

    /// 超时的退避基数（毫秒），必须大于服务端错误退避
    #[serde(default = "default_timeout_backoff_ms")]
    pub timeout_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_server_error_backoff_ms() -> u64 {
    500
}

fn default_timeout_backoff_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            server_error_backoff_ms: default_server_error_backoff_ms(),
            timeout_backoff_ms: default_timeout_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// 转换为调度器使用的重试策略
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            server_error_backoff: Duration::from_millis(self.server_error_backoff_ms),
            timeout_backoff: Duration::from_millis(self.timeout_backoff_ms),
        }
    }
}

/// 合成后端配置
///
/// kind 取值：
/// - `xtts-http`: XTTS 声音克隆服务
/// - `preset-http`: 预置音色服务
/// - `stub`: 本地桩后端，开发与测试用
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// 唯一名称，日志与响应头里使用
    pub name: String,

    /// 后端类型
    pub kind: String,

    /// 是否参与调度
    #[serde(default = "default_backend_enabled")]
    pub enabled: bool,

    /// 越大越优先
    #[serde(default)]
    pub priority: i32,

    /// 是否支持声音克隆
    #[serde(default)]
    pub supports_cloning: bool,

    /// 合成接口地址，stub 后端不需要
    #[serde(default)]
    pub endpoint: Option<String>,

    /// 健康检查地址
    #[serde(default)]
    pub health_endpoint: Option<String>,

    /// 单次尝试的超时（秒）
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// 鉴权密钥
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_backend_enabled() -> bool {
    true
}

fn default_attempt_timeout_secs() -> u64 {
    120
}

impl BackendConfig {
    /// 转换为调度器使用的后端描述
    pub fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            name: self.name.clone(),
            enabled: self.enabled,
            priority: self.priority,
            supports_cloning: self.supports_cloning,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}

/// 渲染缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// sled 数据库目录
    #[serde(default = "default_cache_db_path")]
    pub db_path: String,
}

fn default_cache_db_path() -> String {
    "data/render_cache.sled".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: default_cache_db_path(),
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 音频存储目录
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("data/audio")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            audio_dir: default_audio_dir(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/voxlog.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

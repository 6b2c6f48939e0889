//! Voxlog - 语音合成调度与缓存服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Voice Context: 声音身份、来源与档案
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SpeechBackend, RenderCache, AudioStore, Repositories）
//! - Commands: CQRS 命令处理器（语音合成）
//! - Queries: CQRS 查询处理器（后端状态、缓存统计）
//! - Resolver: 声音身份解析链
//! - Dispatch: 后端调度与有界重试
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API
//! - Persistence: SQLite (身份/档案/内容记录) + Sled (渲染缓存)
//! - Adapters: 合成后端客户端、文件音频存储

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};

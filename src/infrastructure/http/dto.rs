//! Data Transfer Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }

    /// 错误响应
    #[allow(dead_code)]
    pub fn error(errno: i32, error: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            errno,
            error: error.into(),
            data: None,
        }
    }
}

// ============================================================================
// Speech DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SynthesizeSpeechRequest {
    /// 要合成的文本
    pub text: String,
    /// 显式指定的声音身份，优先级最高
    pub voice_id: Option<Uuid>,
    /// 关联的内容记录
    pub content_id: Option<Uuid>,
    /// 请求方声称的归属者
    pub owner_id: Option<Uuid>,
    /// 解析不到身份时使用的预设声音
    pub fallback_voice: String,
    /// 语言代码，缺省用配置的默认语言
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BackendStatusDto {
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub supports_cloning: bool,
    pub healthy: bool,
    pub attempts: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsDto {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub store_used_bytes: u64,
    pub store_blob_count: u64,
}

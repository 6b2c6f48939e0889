//! Domain Layer - 领域层
//!
//! 包含一个限界上下文:
//! - Voice Context: 声音身份管理

pub mod voice;

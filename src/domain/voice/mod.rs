//! Voice Context - 声音身份限界上下文
//!
//! 职责:
//! - 声音身份元数据与归属关系
//! - 合成请求最终使用的声音表示

mod aggregate;
mod value_objects;

pub use aggregate::{IdentitySource, ResolvedVoice, VoiceIdentity};
pub use value_objects::{FallbackVoice, IdentityId};

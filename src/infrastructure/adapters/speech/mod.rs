//! 合成后端适配器
//!
//! 每个适配器实现 SpeechBackendPort，差别只在线上协议

mod preset_http_client;
mod stub_client;
mod xtts_http_client;

pub use preset_http_client::{PresetHttpClient, PresetHttpClientConfig};
pub use stub_client::{StubClient, StubClientConfig};
pub use xtts_http_client::{XttsHttpClient, XttsHttpClientConfig};

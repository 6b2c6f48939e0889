//! XTTS HTTP Client - 调用外部 XTTS 声音克隆服务
//!
//! 实现 SpeechBackendPort trait，通过 HTTP 调用支持声音克隆的 XTTS 服务
//!
//! 外部 XTTS API:
//! POST {endpoint}
//! Request: {"text": "...", "voiceAudio": "<base64>", "language": "en"}  (JSON)
//! Response: {"audioBase64": "<base64 wav>", "duration": 1.23}

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{
    BackendError, JobVoice, SpeechBackendPort, SynthesisJob, SynthesizedAudio,
};

/// XTTS 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct XttsHttpRequest {
    /// 要合成的文本
    text: String,
    /// 参考音频，base64 编码
    #[serde(rename = "voiceAudio")]
    voice_audio: String,
    /// 语言代码
    language: String,
}

/// XTTS 合成响应体 (JSON)
#[derive(Debug, Deserialize)]
struct XttsHttpResponse {
    /// 合成音频 (WAV)，base64 编码
    #[serde(rename = "audioBase64")]
    audio_base64: String,
    /// 服务端合成耗时（秒）
    #[serde(default)]
    duration: Option<f64>,
}

/// XTTS HTTP 客户端配置
#[derive(Debug, Clone)]
pub struct XttsHttpClientConfig {
    /// 合成端点完整 URL
    pub endpoint: String,
    /// 健康检查 URL，不配置则视作始终可用
    pub health_endpoint: Option<String>,
    /// 请求超时时间（秒），GPU 冷启动慢，放宽
    pub timeout_secs: u64,
}

impl Default for XttsHttpClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/tts".to_string(),
            health_endpoint: None,
            timeout_secs: 300,
        }
    }
}

impl XttsHttpClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_health_endpoint(mut self, url: impl Into<String>) -> Self {
        self.health_endpoint = Some(url.into());
        self
    }
}

/// XTTS HTTP 客户端
///
/// 参考音频随请求上行，服务端按其克隆音色
pub struct XttsHttpClient {
    client: Client,
    config: XttsHttpClientConfig,
}

impl XttsHttpClient {
    /// 创建新的 XTTS 客户端
    pub fn new(config: XttsHttpClientConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl SpeechBackendPort for XttsHttpClient {
    async fn synthesize(&self, job: &SynthesisJob) -> Result<SynthesizedAudio, BackendError> {
        // 该服务只走参考音频克隆，没有预设音色可用
        let reference_audio = match &job.voice {
            JobVoice::Cloned {
                reference_audio, ..
            } => reference_audio,
            JobVoice::Preset { voice } => {
                return Err(BackendError::Rejected(format!(
                    "preset voice '{}' not supported by cloning backend",
                    voice
                )));
            }
        };

        let http_request = XttsHttpRequest {
            text: job.text.clone(),
            voice_audio: BASE64_STANDARD.encode(reference_audio),
            language: job.language.clone(),
        };

        tracing::debug!(
            url = %self.config.endpoint,
            text_len = http_request.text.len(),
            reference_bytes = reference_audio.len(),
            language = %http_request.language,
            "Sending XTTS synthesis request"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&http_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout
                } else if e.is_connect() {
                    BackendError::Network(format!("Cannot connect to XTTS service: {}", e))
                } else {
                    BackendError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status.is_client_error() {
                return Err(BackendError::Rejected(format!(
                    "HTTP {}: {}",
                    status, error_text
                )));
            }
            return Err(BackendError::Remote {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body: XttsHttpResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let audio = BASE64_STANDARD
            .decode(&body.audio_base64)
            .map_err(|e| BackendError::InvalidResponse(format!("Invalid audio encoding: {}", e)))?;

        if audio.is_empty() {
            return Err(BackendError::InvalidResponse(
                "Service returned empty audio".to_string(),
            ));
        }

        let duration_ms = body.duration.map(|s| (s * 1000.0) as u64);

        tracing::info!(
            audio_size = audio.len(),
            duration_ms = ?duration_ms,
            "XTTS synthesis completed"
        );

        Ok(SynthesizedAudio {
            audio,
            content_type: "audio/wav".to_string(),
            duration_ms,
        })
    }

    async fn health_check(&self) -> bool {
        let Some(url) = &self.config.health_endpoint else {
            return true;
        };
        match self
            .client
            .get(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cloned_job(text: &str) -> SynthesisJob {
        SynthesisJob {
            text: text.to_string(),
            language: "en".to_string(),
            voice: JobVoice::Cloned {
                identity_id: crate::domain::voice::IdentityId::new(),
                reference_audio: vec![1, 2, 3, 4],
            },
        }
    }

    fn client_for(server: &MockServer) -> XttsHttpClient {
        XttsHttpClient::new(XttsHttpClientConfig::new(format!("{}/tts", server.uri())))
            .unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = XttsHttpClientConfig::default();
        assert_eq!(config.timeout_secs, 300);
        assert!(config.health_endpoint.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = XttsHttpClientConfig::new("http://example.com/tts")
            .with_timeout(60)
            .with_health_endpoint("http://example.com/health");
        assert_eq!(config.endpoint, "http://example.com/tts");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(
            config.health_endpoint.as_deref(),
            Some("http://example.com/health")
        );
    }

    #[tokio::test]
    async fn test_synthesize_decodes_audio_and_duration() {
        let server = MockServer::start().await;
        let wav = vec![82u8, 73, 70, 70, 0, 0];

        Mock::given(method("POST"))
            .and(path("/tts"))
            .and(body_partial_json(serde_json::json!({
                "text": "hello",
                "language": "en"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "audioBase64": BASE64_STANDARD.encode(&wav),
                "duration": 1.5,
                "language": "en",
                "textLength": 5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.synthesize(&cloned_job("hello")).await.unwrap();

        assert_eq!(result.audio, wav);
        assert_eq!(result.content_type, "audio/wav");
        assert_eq!(result.duration_ms, Some(1500));
    }

    #[tokio::test]
    async fn test_client_error_maps_to_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tts"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "detail": "Unsupported language: xx"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.synthesize(&cloned_job("hello")).await.unwrap_err();

        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_remote() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tts"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Failed to generate speech"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.synthesize(&cloned_job("hello")).await.unwrap_err();

        match err {
            BackendError::Remote { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("Failed to generate"));
            }
            other => panic!("expected Remote, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_maps_to_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tts"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.synthesize(&cloned_job("hello")).await.unwrap_err();

        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_preset_voice_is_rejected_locally() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let job = SynthesisJob {
            text: "hello".to_string(),
            language: "en".to_string(),
            voice: JobVoice::Preset {
                voice: "narrator".to_string(),
            },
        };
        let err = client.synthesize(&job).await.unwrap_err();

        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_health_check_without_endpoint_is_true() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        assert!(client.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_uses_configured_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "healthy"
            })))
            .mount(&server)
            .await;

        let config = XttsHttpClientConfig::new(format!("{}/tts", server.uri()))
            .with_health_endpoint(format!("{}/health", server.uri()));
        let client = XttsHttpClient::new(config).unwrap();

        assert!(client.health_check().await);
    }
}

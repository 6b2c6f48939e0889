//! Preset HTTP Client - 调用外部预设音色合成服务
//!
//! 实现 SpeechBackendPort trait，面向只提供固定音色库的合成服务
//!
//! 外部 API:
//! POST {base_url}/api/speech
//! Request: {"text": "...", "voice": "narrator", "language": "en"}  (JSON)
//! Response: audio binary, metadata in headers

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{
    BackendError, JobVoice, SpeechBackendPort, SynthesisJob, SynthesizedAudio,
};

/// 预设音色合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct PresetHttpRequest {
    /// 要合成的文本
    text: String,
    /// 预设音色名称
    voice: String,
    /// 语言代码
    language: String,
}

/// 预设音色客户端配置
#[derive(Debug, Clone)]
pub struct PresetHttpClientConfig {
    /// 合成服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// Bearer token，服务不鉴权时不配置
    pub api_key: Option<String>,
}

impl Default for PresetHttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8100".to_string(),
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl PresetHttpClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// 预设音色 HTTP 客户端
pub struct PresetHttpClient {
    client: Client,
    config: PresetHttpClientConfig,
}

impl PresetHttpClient {
    /// 创建新的预设音色客户端
    pub fn new(config: PresetHttpClientConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn speech_url(&self) -> String {
        format!("{}/api/speech", self.config.base_url)
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url)
    }
}

#[async_trait]
impl SpeechBackendPort for PresetHttpClient {
    async fn synthesize(&self, job: &SynthesisJob) -> Result<SynthesizedAudio, BackendError> {
        // 请求体没有参考音频的位置，克隆任务走不了这条线
        let voice = match &job.voice {
            JobVoice::Preset { voice } => voice.clone(),
            JobVoice::Cloned { .. } => {
                return Err(BackendError::Rejected(
                    "voice cloning not supported by preset backend".to_string(),
                ));
            }
        };

        let http_request = PresetHttpRequest {
            text: job.text.clone(),
            voice,
            language: job.language.clone(),
        };

        tracing::debug!(
            url = %self.speech_url(),
            text_len = http_request.text.len(),
            voice = %http_request.voice,
            "Sending preset synthesis request"
        );

        let mut request = self.client.post(self.speech_url()).json(&http_request);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else if e.is_connect() {
                BackendError::Network(format!("Cannot connect to speech service: {}", e))
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

        // 从 headers 提取元数据
        let headers = response.headers();
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/wav")
            .to_string();
        let duration_ms = headers
            .get("X-Duration-Ms")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let audio = response
            .bytes()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("Failed to read audio: {}", e)))?
            .to_vec();

        if audio.is_empty() {
            return Err(BackendError::InvalidResponse(
                "Service returned empty audio".to_string(),
            ));
        }

        tracing::info!(
            audio_size = audio.len(),
            content_type = %content_type,
            duration_ms = ?duration_ms,
            "Preset synthesis completed"
        );

        Ok(SynthesizedAudio {
            audio,
            content_type,
            duration_ms,
        })
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
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
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn preset_job(text: &str, voice: &str) -> SynthesisJob {
        SynthesisJob {
            text: text.to_string(),
            language: "en".to_string(),
            voice: JobVoice::Preset {
                voice: voice.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_synthesize_reads_body_and_headers() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/speech"))
            .and(body_partial_json(serde_json::json!({
                "text": "hello",
                "voice": "narrator"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![5u8; 128])
                    .insert_header("Content-Type", "audio/mpeg")
                    .insert_header("X-Duration-Ms", "2300"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = PresetHttpClient::new(PresetHttpClientConfig::new(server.uri())).unwrap();
        let result = client.synthesize(&preset_job("hello", "narrator")).await.unwrap();

        assert_eq!(result.audio.len(), 128);
        assert_eq!(result.content_type, "audio/mpeg");
        assert_eq!(result.duration_ms, Some(2300));
    }

    #[tokio::test]
    async fn test_api_key_is_sent_as_bearer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/speech"))
            .and(header("authorization", "Bearer secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 16]))
            .expect(1)
            .mount(&server)
            .await;

        let config = PresetHttpClientConfig::new(server.uri()).with_api_key("secret-key");
        let client = PresetHttpClient::new(config).unwrap();

        let result = client.synthesize(&preset_job("hi", "narrator")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cloned_voice_is_rejected_locally() {
        let server = MockServer::start().await;
        let client = PresetHttpClient::new(PresetHttpClientConfig::new(server.uri())).unwrap();

        let job = SynthesisJob {
            text: "hello".to_string(),
            language: "en".to_string(),
            voice: JobVoice::Cloned {
                identity_id: crate::domain::voice::IdentityId::new(),
                reference_audio: vec![1, 2, 3],
            },
        };
        let err = client.synthesize(&job).await.unwrap_err();

        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_remote() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/speech"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = PresetHttpClient::new(PresetHttpClientConfig::new(server.uri())).unwrap();
        let err = client
            .synthesize(&preset_job("hello", "narrator"))
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Remote { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_empty_body_maps_to_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/speech"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(Vec::<u8>::new()))
            .mount(&server)
            .await;

        let client = PresetHttpClient::new(PresetHttpClientConfig::new(server.uri())).unwrap();
        let err = client
            .synthesize(&preset_job("hello", "narrator"))
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }
}

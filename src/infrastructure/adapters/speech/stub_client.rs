//! Stub Client - 本地开发用的合成后端
//!
//! 不调用任何外部服务，按输入确定性地生成一段 PCM WAV。
//! 同样的文本和音色永远得到同样的字节，方便验证缓存行为

use async_trait::async_trait;
use std::time::Duration;

use crate::application::ports::{
    BackendError, SpeechBackendPort, SynthesisJob, SynthesizedAudio,
};

const SAMPLE_RATE: u32 = 22050;
const MS_PER_CHAR: u64 = 40;
const MIN_DURATION_MS: u64 = 200;
const MAX_DURATION_MS: u64 = 4000;

/// Stub 客户端配置
#[derive(Debug, Clone)]
pub struct StubClientConfig {
    /// 模拟的合成延迟（毫秒）
    pub latency_ms: u64,
}

impl Default for StubClientConfig {
    fn default() -> Self {
        Self { latency_ms: 50 }
    }
}

/// Stub 合成客户端
pub struct StubClient {
    config: StubClientConfig,
}

impl StubClient {
    pub fn new(config: StubClientConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(StubClientConfig::default())
    }
}

#[async_trait]
impl SpeechBackendPort for StubClient {
    async fn synthesize(&self, job: &SynthesisJob) -> Result<SynthesizedAudio, BackendError> {
        tracing::debug!(
            text_len = job.text.len(),
            voice = %job.voice.label(),
            "StubClient: generating deterministic audio"
        );

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        let duration_ms = (job.text.chars().count() as u64 * MS_PER_CHAR)
            .clamp(MIN_DURATION_MS, MAX_DURATION_MS);
        let audio = synthesize_wav(&job.text, &job.voice.label(), duration_ms);

        Ok(SynthesizedAudio {
            audio,
            content_type: "audio/wav".to_string(),
            duration_ms: Some(duration_ms),
        })
    }
}

/// 生成一段 16-bit 单声道 PCM WAV，内容由文本和音色决定
fn synthesize_wav(text: &str, voice_label: &str, duration_ms: u64) -> Vec<u8> {
    let digest = md5::compute(format!("{}\u{0}{}", text, voice_label).as_bytes());
    let mut state = u64::from_le_bytes(digest.0[..8].try_into().unwrap_or([1; 8])).max(1);

    let sample_count = (SAMPLE_RATE as u64 * duration_ms / 1000) as usize;
    let data_len = sample_count * 2;

    let mut wav = Vec::with_capacity(44 + data_len);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_len as u32).to_le_bytes());

    // xorshift 噪声，幅度压低避免刺耳
    for _ in 0..sample_count {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let sample = (state as i16) / 8;
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

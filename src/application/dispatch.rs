//! Synthesis Dispatcher - 合成调度
//!
//! 在已配置的后端之间按优先级与能力选路，并驱动带分类退避的有界重试。
//! 后端列表在构造时注入，调度过程中不读任何全局配置

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use crate::application::error::{ApplicationError, SynthesisFailureKind};
use crate::application::ports::{
    BackendError, JobVoice, SpeechBackendPort, SynthesisJob, SynthesizedAudio,
};
use crate::application::retry::{FailureClass, RetryPolicy};

/// 后端描述
///
/// 来自配置层，构造后不再变化
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    /// 唯一名称，日志与响应头里使用
    pub name: String,
    /// 是否参与调度
    pub enabled: bool,
    /// 越大越优先
    pub priority: i32,
    /// 是否支持声音克隆
    pub supports_cloning: bool,
    /// 单次尝试的超时
    pub attempt_timeout: Duration,
}

/// 注册到调度器的后端
pub struct RegisteredBackend {
    pub descriptor: BackendDescriptor,
    pub client: Arc<dyn SpeechBackendPort>,
}

/// 单后端运行计数
#[derive(Debug, Clone, Default)]
pub struct BackendCounters {
    /// 发起的尝试次数
    pub attempts: u64,
    /// 失败的尝试次数
    pub failures: u64,
    /// 最近一次失败信息
    pub last_error: Option<String>,
}

/// 调度成功的结果
#[derive(Debug)]
pub struct DispatchOutcome {
    pub audio: SynthesizedAudio,
    /// 产出音频的后端名称
    pub backend: String,
    /// 本次请求的总尝试次数（跨后端累计）
    pub attempts: u32,
}

/// Synthesis Dispatcher
pub struct SynthesisDispatcher {
    /// 按优先级降序排列
    backends: Vec<RegisteredBackend>,
    policy: RetryPolicy,
    /// 全局在途请求上限，None 表示不限
    limiter: Option<Arc<Semaphore>>,
    counters: DashMap<String, BackendCounters>,
}

impl SynthesisDispatcher {
    /// 创建调度器
    ///
    /// max_concurrent 为 0 表示不限制并发
    pub fn new(
        mut backends: Vec<RegisteredBackend>,
        policy: RetryPolicy,
        max_concurrent: usize,
    ) -> Self {
        backends.sort_by(|a, b| b.descriptor.priority.cmp(&a.descriptor.priority));
        let limiter = if max_concurrent > 0 {
            Some(Arc::new(Semaphore::new(max_concurrent)))
        } else {
            None
        };
        Self {
            backends,
            policy,
            limiter,
            counters: DashMap::new(),
        }
    }

    /// 注册的全部后端，按优先级降序
    pub fn registered(&self) -> &[RegisteredBackend] {
        &self.backends
    }

    /// 读取后端计数快照
    pub fn counters(&self, name: &str) -> BackendCounters {
        self.counters
            .get(name)
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }

    /// 符合条件的后端，按优先级降序
    fn eligible(&self, needs_cloning: bool) -> Vec<&RegisteredBackend> {
        self.backends
            .iter()
            .filter(|b| b.descriptor.enabled)
            .filter(|b| !needs_cloning || b.descriptor.supports_cloning)
            .collect()
    }

    /// 执行一次调度
    ///
    /// 克隆请求只允许具备克隆能力的后端参与；没有任何候选时
    /// 立即返回配置错误，不发起网络调用。
    /// 不可重试的失败立即终止；可重试的失败在退避后重试，
    /// 单后端尝试耗尽后切换到下一个候选
    pub async fn dispatch(&self, job: &SynthesisJob) -> Result<DispatchOutcome, ApplicationError> {
        let needs_cloning = matches!(job.voice, JobVoice::Cloned { .. });
        let eligible = self.eligible(needs_cloning);
        if eligible.is_empty() {
            return Err(ApplicationError::configuration(if needs_cloning {
                "no enabled backend supports voice cloning"
            } else {
                "no synthesis backend enabled"
            }));
        }

        let mut total_attempts = 0u32;
        let mut last_failure: Option<(SynthesisFailureKind, String)> = None;

        for backend in eligible {
            let name = backend.descriptor.name.as_str();
            let mut attempt = 1u32;

            loop {
                total_attempts += 1;
                self.note_attempt(name);
                tracing::debug!(
                    backend = %name,
                    attempt,
                    voice = %job.voice.label(),
                    "dispatching synthesis attempt"
                );

                match self.attempt(backend, job).await {
                    Ok(audio) => {
                        tracing::info!(
                            backend = %name,
                            attempts = total_attempts,
                            audio_bytes = audio.audio.len(),
                            "synthesis succeeded"
                        );
                        return Ok(DispatchOutcome {
                            audio,
                            backend: name.to_string(),
                            attempts: total_attempts,
                        });
                    }
                    Err(error) => {
                        self.note_failure(name, &error);
                        let class = RetryPolicy::classify(&error);

                        if class == FailureClass::Fatal {
                            tracing::warn!(
                                backend = %name,
                                error = %error,
                                "backend rejected request, aborting dispatch"
                            );
                            return Err(match error {
                                BackendError::Rejected(message) => {
                                    ApplicationError::SynthesisRejected(message)
                                }
                                other => ApplicationError::SynthesisRejected(other.to_string()),
                            });
                        }

                        tracing::warn!(
                            backend = %name,
                            attempt,
                            error = %error,
                            "synthesis attempt failed"
                        );
                        last_failure =
                            Some((terminal_kind(&error), format!("{}: {}", name, error)));

                        attempt += 1;
                        if !self.policy.allows(attempt) {
                            break;
                        }
                        let delay = self.policy.backoff(class, attempt - 1);
                        tracing::debug!(
                            backend = %name,
                            delay_ms = delay.as_millis() as u64,
                            "backing off before retry"
                        );
                        sleep(delay).await;
                    }
                }
            }

            tracing::info!(backend = %name, "backend attempts exhausted, trying next candidate");
        }

        match last_failure {
            Some((kind, message)) => Err(ApplicationError::SynthesisFailed { kind, message }),
            None => Err(ApplicationError::internal("dispatch ended without outcome")),
        }
    }

    /// 单次尝试: 并发许可 + 每次尝试的超时
    async fn attempt(
        &self,
        backend: &RegisteredBackend,
        job: &SynthesisJob,
    ) -> Result<SynthesizedAudio, BackendError> {
        let _permit = match &self.limiter {
            Some(semaphore) => match semaphore.acquire().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    return Err(BackendError::InvalidResponse(
                        "concurrency limiter closed".to_string(),
                    ))
                }
            },
            None => None,
        };

        match timeout(backend.descriptor.attempt_timeout, backend.client.synthesize(job)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        }
    }

    fn note_attempt(&self, name: &str) {
        self.counters.entry(name.to_string()).or_default().attempts += 1;
    }

    fn note_failure(&self, name: &str, error: &BackendError) {
        let mut counters = self.counters.entry(name.to_string()).or_default();
        counters.failures += 1;
        counters.last_error = Some(error.to_string());
    }
}

/// 终态失败类别，取最后一次失败的种类
fn terminal_kind(error: &BackendError) -> SynthesisFailureKind {
    match error {
        BackendError::Timeout => SynthesisFailureKind::Timeout,
        BackendError::Network(_) => SynthesisFailureKind::Network,
        _ => SynthesisFailureKind::Remote,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::domain::voice::IdentityId;

    /// 按脚本依次返回结果的后端
    struct ScriptedBackend {
        calls: AtomicUsize,
        script: Mutex<Vec<Result<SynthesizedAudio, BackendError>>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<SynthesizedAudio, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpeechBackendPort for ScriptedBackend {
        async fn synthesize(&self, _job: &SynthesisJob) -> Result<SynthesizedAudio, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Ok(audio());
            }
            script.remove(0)
        }
    }

    /// 永远不返回的后端，用于触发调度器的尝试超时
    struct HangingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechBackendPort for HangingBackend {
        async fn synthesize(&self, _job: &SynthesisJob) -> Result<SynthesizedAudio, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    fn audio() -> SynthesizedAudio {
        SynthesizedAudio {
            audio: vec![1, 2, 3, 4],
            content_type: "audio/wav".to_string(),
            duration_ms: Some(120),
        }
    }

    fn descriptor(name: &str, priority: i32, supports_cloning: bool) -> BackendDescriptor {
        BackendDescriptor {
            name: name.to_string(),
            enabled: true,
            priority,
            supports_cloning,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    fn cloning_job() -> SynthesisJob {
        SynthesisJob {
            text: "你好".to_string(),
            language: "zh-cn".to_string(),
            voice: JobVoice::Cloned {
                identity_id: IdentityId::new(),
                reference_audio: vec![0; 16],
            },
        }
    }

    fn preset_job() -> SynthesisJob {
        SynthesisJob {
            text: "hello".to_string(),
            language: "en".to_string(),
            voice: JobVoice::Preset {
                voice: "narrator".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_cloning_needs_capable_backend() {
        let plain = ScriptedBackend::new(vec![]);
        let dispatcher = SynthesisDispatcher::new(
            vec![RegisteredBackend {
                descriptor: descriptor("plain", 10, false),
                client: plain.clone(),
            }],
            RetryPolicy::fast(),
            0,
        );

        let err = dispatcher.dispatch(&cloning_job()).await.unwrap_err();
        assert!(matches!(err, ApplicationError::ConfigurationError(_)));
        assert_eq!(plain.calls(), 0);
    }

    #[tokio::test]
    async fn test_disabled_backends_are_skipped() {
        let capable = ScriptedBackend::new(vec![]);
        let mut disabled = descriptor("capable", 10, true);
        disabled.enabled = false;

        let dispatcher = SynthesisDispatcher::new(
            vec![RegisteredBackend {
                descriptor: disabled,
                client: capable.clone(),
            }],
            RetryPolicy::fast(),
            0,
        );

        let err = dispatcher.dispatch(&cloning_job()).await.unwrap_err();
        assert!(matches!(err, ApplicationError::ConfigurationError(_)));
        assert_eq!(capable.calls(), 0);
    }

    #[tokio::test]
    async fn test_priority_order_wins() {
        let low = ScriptedBackend::new(vec![]);
        let high = ScriptedBackend::new(vec![]);
        let dispatcher = SynthesisDispatcher::new(
            vec![
                RegisteredBackend {
                    descriptor: descriptor("low", 1, true),
                    client: low.clone(),
                },
                RegisteredBackend {
                    descriptor: descriptor("high", 99, true),
                    client: high.clone(),
                },
            ],
            RetryPolicy::fast(),
            0,
        );

        let outcome = dispatcher.dispatch(&cloning_job()).await.unwrap();
        assert_eq!(outcome.backend, "high");
        assert_eq!(high.calls(), 1);
        assert_eq!(low.calls(), 0);
    }

    #[tokio::test]
    async fn test_retry_once_after_transient_failure() {
        let flaky = ScriptedBackend::new(vec![
            Err(BackendError::Remote {
                status: 503,
                message: "overloaded".into(),
            }),
            Ok(audio()),
        ]);
        let dispatcher = SynthesisDispatcher::new(
            vec![RegisteredBackend {
                descriptor: descriptor("flaky", 10, true),
                client: flaky.clone(),
            }],
            RetryPolicy::fast(),
            0,
        );

        let outcome = dispatcher.dispatch(&cloning_job()).await.unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(flaky.calls(), 2);
    }

    #[tokio::test]
    async fn test_first_attempt_times_out_second_succeeds() {
        /// 第一次调用拖到超时，之后立即返回
        struct FlakySlowBackend {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl SpeechBackendPort for FlakySlowBackend {
            async fn synthesize(
                &self,
                _job: &SynthesisJob,
            ) -> Result<SynthesizedAudio, BackendError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    sleep(Duration::from_millis(200)).await;
                }
                Ok(audio())
            }
        }

        let flaky = Arc::new(FlakySlowBackend {
            calls: AtomicUsize::new(0),
        });
        let mut desc = descriptor("flaky", 10, true);
        desc.attempt_timeout = Duration::from_millis(30);

        let dispatcher = SynthesisDispatcher::new(
            vec![RegisteredBackend {
                descriptor: desc,
                client: flaky.clone(),
            }],
            RetryPolicy::fast(),
            0,
        );

        let outcome = dispatcher.dispatch(&cloning_job()).await.unwrap();
        assert_eq!(outcome.backend, "flaky");
        assert_eq!(outcome.attempts, 2);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_fails_over_to_next_backend() {
        let hanging = Arc::new(HangingBackend {
            calls: AtomicUsize::new(0),
        });
        let healthy = ScriptedBackend::new(vec![]);

        let mut hang_desc = descriptor("hanging", 10, true);
        hang_desc.attempt_timeout = Duration::from_millis(20);
        // 让挂起后端只有一次尝试机会
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::fast()
        };

        let dispatcher = SynthesisDispatcher::new(
            vec![
                RegisteredBackend {
                    descriptor: hang_desc,
                    client: hanging.clone(),
                },
                RegisteredBackend {
                    descriptor: descriptor("healthy", 1, true),
                    client: healthy.clone(),
                },
            ],
            policy,
            0,
        );

        let outcome = dispatcher.dispatch(&cloning_job()).await.unwrap();
        assert_eq!(outcome.backend, "healthy");
        assert_eq!(outcome.attempts, 2);
        assert_eq!(hanging.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_without_retry() {
        let rejecting = ScriptedBackend::new(vec![Err(BackendError::Rejected(
            "unsupported language: xx".into(),
        ))]);
        let next = ScriptedBackend::new(vec![]);
        let dispatcher = SynthesisDispatcher::new(
            vec![
                RegisteredBackend {
                    descriptor: descriptor("rejecting", 10, true),
                    client: rejecting.clone(),
                },
                RegisteredBackend {
                    descriptor: descriptor("next", 1, true),
                    client: next.clone(),
                },
            ],
            RetryPolicy::fast(),
            0,
        );

        let err = dispatcher.dispatch(&cloning_job()).await.unwrap_err();
        assert!(matches!(err, ApplicationError::SynthesisRejected(_)));
        assert_eq!(rejecting.calls(), 1);
        assert_eq!(next.calls(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_preserves_last_failure_kind() {
        let timing_out = Arc::new(HangingBackend {
            calls: AtomicUsize::new(0),
        });
        let mut desc = descriptor("slow", 10, true);
        desc.attempt_timeout = Duration::from_millis(10);

        let dispatcher = SynthesisDispatcher::new(
            vec![RegisteredBackend {
                descriptor: desc,
                client: timing_out.clone(),
            }],
            RetryPolicy::fast(),
            0,
        );

        let err = dispatcher.dispatch(&cloning_job()).await.unwrap_err();
        match err {
            ApplicationError::SynthesisFailed { kind, .. } => {
                assert_eq!(kind, SynthesisFailureKind::Timeout);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(timing_out.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fallback_voice_can_use_any_enabled_backend() {
        let plain = ScriptedBackend::new(vec![]);
        let dispatcher = SynthesisDispatcher::new(
            vec![RegisteredBackend {
                descriptor: descriptor("plain", 10, false),
                client: plain.clone(),
            }],
            RetryPolicy::fast(),
            0,
        );

        let outcome = dispatcher.dispatch(&preset_job()).await.unwrap();
        assert_eq!(outcome.backend, "plain");
    }

    #[tokio::test]
    async fn test_eligibility_over_all_flag_combinations() {
        // 三个后端 enabled/supports_cloning 的全部组合:
        // 克隆请求有候选当且仅当存在 enabled 且 supports_cloning 的后端
        for mask in 0u32..64 {
            let mut backends = Vec::new();
            let mut any_capable = false;
            for i in 0..3 {
                let enabled = mask & (1 << (i * 2)) != 0;
                let cloning = mask & (1 << (i * 2 + 1)) != 0;
                any_capable |= enabled && cloning;
                let mut desc = descriptor(&format!("b{i}"), i, cloning);
                desc.enabled = enabled;
                backends.push(RegisteredBackend {
                    descriptor: desc,
                    client: ScriptedBackend::new(vec![]),
                });
            }
            let dispatcher = SynthesisDispatcher::new(backends, RetryPolicy::fast(), 0);
            let result = dispatcher.dispatch(&cloning_job()).await;
            if any_capable {
                assert!(result.is_ok(), "mask {mask} should dispatch");
            } else {
                assert!(
                    matches!(result, Err(ApplicationError::ConfigurationError(_))),
                    "mask {mask} should be a configuration error"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_concurrency_cap_serializes_calls() {
        use tokio::time::Instant;

        /// 每次调用固定耗时的后端
        struct SlowBackend;

        #[async_trait]
        impl SpeechBackendPort for SlowBackend {
            async fn synthesize(
                &self,
                _job: &SynthesisJob,
            ) -> Result<SynthesizedAudio, BackendError> {
                sleep(Duration::from_millis(50)).await;
                Ok(audio())
            }
        }

        let dispatcher = Arc::new(SynthesisDispatcher::new(
            vec![RegisteredBackend {
                descriptor: descriptor("slow", 10, true),
                client: Arc::new(SlowBackend),
            }],
            RetryPolicy::fast(),
            1,
        ));

        let start = Instant::now();
        let a = {
            let d = dispatcher.clone();
            tokio::spawn(async move { d.dispatch(&cloning_job()).await })
        };
        let b = {
            let d = dispatcher.clone();
            tokio::spawn(async move { d.dispatch(&cloning_job()).await })
        };
        assert!(a.await.unwrap().is_ok());
        assert!(b.await.unwrap().is_ok());
        // 上限为 1 时两次调用只能串行
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}

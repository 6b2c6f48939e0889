//! Retry Policy - 合成重试策略
//!
//! 可复用的重试策略对象：尝试上限、按故障类别区分的退避基数、
//! 错误可否重试的判定。调度器持有一份策略驱动所有后端尝试

use std::time::Duration;

use crate::application::ports::BackendError;

/// 故障类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// 超时，可重试。退避更长，后端可能正在冷启动
    RetryableTimeout,
    /// 后端 5xx 或网络故障，可重试，退避较短
    RetryableRemote,
    /// 不可重试，立即终止整个调度
    Fatal,
}

impl FailureClass {
    pub fn retryable(&self) -> bool {
        !matches!(self, Self::Fatal)
    }
}

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 单个后端的最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 服务端错误的退避基数
    pub server_error_backoff: Duration,
    /// 超时的退避基数，必须大于服务端错误退避
    pub timeout_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            server_error_backoff: Duration::from_millis(500),
            timeout_backoff: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// 近乎零退避的策略
    pub fn fast() -> Self {
        Self {
            max_attempts: 2,
            server_error_backoff: Duration::from_millis(1),
            timeout_backoff: Duration::from_millis(2),
        }
    }

    /// 判定后端错误的故障类别
    pub fn classify(error: &BackendError) -> FailureClass {
        match error {
            BackendError::Timeout => FailureClass::RetryableTimeout,
            BackendError::Network(_) => FailureClass::RetryableRemote,
            BackendError::Remote { status, .. } if *status >= 500 => FailureClass::RetryableRemote,
            BackendError::Remote { .. } => FailureClass::Fatal,
            BackendError::Rejected(_) => FailureClass::Fatal,
            BackendError::InvalidResponse(_) => FailureClass::Fatal,
        }
    }

    /// 是否允许发起第 attempt 次尝试（从 1 计）
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// 第 attempt 次尝试失败后的退避时长
    ///
    /// 按故障类别取基数，随失败次数倍增，指数封顶
    pub fn backoff(&self, class: FailureClass, attempt: u32) -> Duration {
        let base = match class {
            FailureClass::RetryableTimeout => self.timeout_backoff,
            FailureClass::RetryableRemote => self.server_error_backoff,
            FailureClass::Fatal => return Duration::ZERO,
        };
        base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1).min(6)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_retryable_errors() {
        assert_eq!(
            RetryPolicy::classify(&BackendError::Timeout),
            FailureClass::RetryableTimeout
        );
        assert_eq!(
            RetryPolicy::classify(&BackendError::Network("connection refused".into())),
            FailureClass::RetryableRemote
        );
        assert_eq!(
            RetryPolicy::classify(&BackendError::Remote {
                status: 503,
                message: "overloaded".into()
            }),
            FailureClass::RetryableRemote
        );
    }

    #[test]
    fn test_classify_fatal_errors() {
        assert_eq!(
            RetryPolicy::classify(&BackendError::Rejected("text too long".into())),
            FailureClass::Fatal
        );
        assert_eq!(
            RetryPolicy::classify(&BackendError::Remote {
                status: 422,
                message: "bad language".into()
            }),
            FailureClass::Fatal
        );
        assert_eq!(
            RetryPolicy::classify(&BackendError::InvalidResponse("not json".into())),
            FailureClass::Fatal
        );
    }

    #[test]
    fn test_timeout_backoff_longer_than_server_error() {
        let policy = RetryPolicy::default();
        for attempt in 1..=4 {
            assert!(
                policy.backoff(FailureClass::RetryableTimeout, attempt)
                    > policy.backoff(FailureClass::RetryableRemote, attempt)
            );
        }
    }

    #[test]
    fn test_backoff_grows_per_attempt() {
        let policy = RetryPolicy::default();
        let first = policy.backoff(FailureClass::RetryableRemote, 1);
        let second = policy.backoff(FailureClass::RetryableRemote, 2);
        assert_eq!(second, first * 2);
    }

    #[test]
    fn test_fatal_has_no_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(FailureClass::Fatal, 1), Duration::ZERO);
    }

    #[test]
    fn test_attempt_budget() {
        let policy = RetryPolicy::default();
        assert!(policy.allows(1));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }
}

//! 제한된 횟수의 재시도.
//!
//! 사이트 검증 경로에서만 쓰이며, 일시적 에러(`EtfError::is_transient`)만 재시도합니다.

use etf_core::{EtfResult, ProbeConfig};
use std::future::Future;
use std::time::Duration;

/// 재시도 정책. 시도 사이에는 고정 시간만큼 기다립니다.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// 첫 시도를 포함한 최대 시도 횟수
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ProbeConfig::default())
    }
}

impl From<&ProbeConfig> for RetryPolicy {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.retry_delay(),
        }
    }
}

impl RetryPolicy {
    /// 재시도 없이 한 번만 시도
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// 일시적 에러가 나면 정책이 허용하는 만큼 다시 시도합니다.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> EtfResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EtfResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::debug!(label, attempt, error = %e, "일시적 에러, 재시도");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

//! Retry policy and async retry helper for registry calls.
//!
//! Adapted from the runtime's generic retry machinery: same
//! `RetryPolicy`/`RetryConfig` shape, specialized to `PipelineError` and
//! to the registry client's own notion of what is retryable (network and
//! timeout failures, never a 4xx-shaped validation failure).

use std::future::Future;
use std::time::Duration;

use infer_kernel::PipelineError;
use rand::Rng;

/// Delay strategy between retry attempts.
#[derive(Debug, Clone)]
pub enum RetryPolicy {
    Fixed {
        delay_ms: u64,
    },
    ExponentialBackoff {
        base_ms: u64,
        max_ms: u64,
        jitter: bool,
    },
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let ms = match self {
            RetryPolicy::Fixed { delay_ms } => *delay_ms,
            RetryPolicy::ExponentialBackoff {
                base_ms,
                max_ms,
                jitter,
            } => {
                let exp = 1u64
                    .checked_shl(attempt as u32)
                    .and_then(|s| base_ms.checked_mul(s))
                    .unwrap_or(*max_ms);
                let capped = exp.min(*max_ms);
                if *jitter {
                    let lower = capped.saturating_mul(3) / 4;
                    rand::thread_rng().gen_range(lower..=capped).min(*max_ms)
                } else {
                    capped
                }
            }
        };
        Duration::from_millis(ms)
    }
}

/// How many attempts to make and which [`RetryPolicy`] to use.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub policy: RetryPolicy,
}

impl RetryConfig {
    /// 5 attempts, 0.5s/1s/2s/4s/8s capped exponential backoff with jitter —
    /// the registry client's default.
    pub fn exponential(max_attempts: usize, base_ms: u64, max_ms: u64) -> Self {
        Self {
            max_attempts,
            policy: RetryPolicy::ExponentialBackoff {
                base_ms,
                max_ms,
                jitter: true,
            },
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::exponential(5, 500, 8_000)
    }
}

/// Retry `f` up to `config.max_attempts` times, sleeping between attempts
/// according to `config.policy`. Stops immediately on a non-retryable
/// error.
pub async fn retry_with_policy<F, Fut, T>(
    config: &RetryConfig,
    is_retryable: impl Fn(&PipelineError) -> bool,
    mut f: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 0..max_attempts {
        if attempt > 0 {
            tokio::time::sleep(config.policy.delay_for(attempt - 1)).await;
        }
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(e);
                }
                tracing::warn!(attempt, error = %e, "registry call failed, retrying");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| PipelineError::FeatureStore("no attempts made".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn exponential_delay_is_capped() {
        let p = RetryPolicy::ExponentialBackoff {
            base_ms: 500,
            max_ms: 8_000,
            jitter: false,
        };
        assert_eq!(p.delay_for(0), Duration::from_millis(500));
        assert_eq!(p.delay_for(1), Duration::from_millis(1_000));
        assert_eq!(p.delay_for(4), Duration::from_millis(8_000));
        assert_eq!(p.delay_for(10), Duration::from_millis(8_000));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let config = RetryConfig {
            max_attempts: 3,
            policy: RetryPolicy::Fixed { delay_ms: 0 },
        };
        let result = retry_with_policy(
            &config,
            |_| true,
            || {
                let c = c.clone();
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(PipelineError::FeatureStore("transient".into()))
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let config = RetryConfig {
            max_attempts: 5,
            policy: RetryPolicy::Fixed { delay_ms: 0 },
        };
        let result: Result<u32, _> = retry_with_policy(
            &config,
            |_| false,
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(PipelineError::Validation("bad".into()))
                }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

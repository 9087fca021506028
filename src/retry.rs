//! Classified retry-with-backoff wrapper.
//!
//! Used by fetcher-adjacent operations (the fetcher itself, asset downloads
//! inside the resolver). The scheduler does not wrap the pipeline stages in
//! retries themselves — each stage runs at most once per URL per visit.

use std::time::Duration;

use rand::Rng;

use crate::clock::{CancelSignal, Clock, SleepOutcome};
use crate::errors::{ClassifiedError, Severity};

#[derive(Debug, Clone, Copy)]
pub struct RetryParams {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: Duration,
}

impl Default for RetryParams {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            jitter: Duration::from_millis(100),
        }
    }
}

/// Runs `op` up to `params.max_attempts` times. Retries only on
/// `Severity::Recoverable` errors whose `is_retryable()` is true; a
/// `Fatal` error or attempt exhaustion returns the last error immediately.
pub async fn retry<F, Fut, T, E>(
    params: RetryParams,
    clock: &dyn Clock,
    cancel: &CancelSignal,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: ClassifiedError,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let exhausted = attempt >= params.max_attempts;
                if err.severity() == Severity::Fatal || !err.is_retryable() || exhausted {
                    return Err(err);
                }
                let exp = params.base_backoff.saturating_mul(1u32 << (attempt - 1).min(16));
                let backoff = exp.min(params.max_backoff);
                let jitter_sample = if params.jitter.is_zero() {
                    Duration::ZERO
                } else {
                    let millis = rand::rng().random_range(0..=params.jitter.as_millis() as u64);
                    Duration::from_millis(millis)
                };
                if clock.sleep(backoff + jitter_sample, cancel).await == SleepOutcome::Cancelled {
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FakeClock;
    use std::cell::Cell;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Recoverable;
    impl ClassifiedError for Recoverable {
        fn severity(&self) -> Severity {
            Severity::Recoverable
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Fatal;
    impl ClassifiedError for Fatal {
        fn severity(&self) -> Severity {
            Severity::Fatal
        }
    }

    #[tokio::test]
    async fn retries_recoverable_errors_until_success() {
        let clock = FakeClock::default();
        let cancel = CancelSignal::new();
        let calls = Cell::new(0);
        let result: Result<u32, Recoverable> = retry(RetryParams::default(), &clock, &cancel, || {
            calls.set(calls.get() + 1);
            async move {
                if calls.get() < 3 {
                    Err(Recoverable)
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn fatal_errors_abort_immediately() {
        let clock = FakeClock::default();
        let cancel = CancelSignal::new();
        let calls = Cell::new(0);
        let result: Result<u32, Fatal> = retry(RetryParams::default(), &clock, &cancel, || {
            calls.set(calls.get() + 1);
            async move { Err(Fatal) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn exhausting_attempts_returns_last_error() {
        let clock = FakeClock::default();
        let cancel = CancelSignal::new();
        let calls = Cell::new(0);
        let params = RetryParams {
            max_attempts: 2,
            ..RetryParams::default()
        };
        let result: Result<u32, Recoverable> = retry(params, &clock, &cancel, || {
            calls.set(calls.get() + 1);
            async move { Err(Recoverable) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }
}

//! Monotonic time source and cooperative sleep.
//!
//! This is the single point of testable time: every other component
//! (rate limiter, retry policy, scheduler) depends on a `Clock` by
//! injection rather than calling `Instant::now()`/`tokio::time::sleep`
//! directly, so tests can run a full crawl without real wall-clock waits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a cooperative sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    Completed,
    Cancelled,
}

/// Run-scoped cancellation signal, cloneable and cheap to check.
///
/// A per-run deadline is implemented by spawning a timer that calls
/// [`CancelSignal::cancel`] once the deadline elapses, so the rest of the
/// system only ever has to check one flag.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Abstraction over `Instant::now()` and `tokio::time::sleep`, injectable
/// for deterministic tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Sleep for `duration`, returning early if `cancel` fires. Must not
    /// busy-loop: implementations race the sleep against cancellation.
    fn sleep<'a>(
        &'a self,
        duration: Duration,
        cancel: &'a CancelSignal,
    ) -> futures::future::BoxFuture<'a, SleepOutcome>;
}

/// Production clock backed by `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep<'a>(
        &'a self,
        duration: Duration,
        cancel: &'a CancelSignal,
    ) -> futures::future::BoxFuture<'a, SleepOutcome> {
        Box::pin(async move {
            if duration.is_zero() {
                return if cancel.is_cancelled() {
                    SleepOutcome::Cancelled
                } else {
                    SleepOutcome::Completed
                };
            }
            // Poll cancellation at a fine enough grain that a cancel fired
            // mid-sleep is observed promptly without busy-spinning.
            const POLL: Duration = Duration::from_millis(25);
            let mut remaining = duration;
            loop {
                if cancel.is_cancelled() {
                    return SleepOutcome::Cancelled;
                }
                let step = remaining.min(POLL);
                tokio::time::sleep(step).await;
                remaining = remaining.saturating_sub(step);
                if remaining.is_zero() {
                    return if cancel.is_cancelled() {
                        SleepOutcome::Cancelled
                    } else {
                        SleepOutcome::Completed
                    };
                }
            }
        })
    }
}

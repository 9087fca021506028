//! Per-host politeness bookkeeping.
//!
//! A plain `HashMap` behind `&mut self` is enough here: the scheduler owns
//! this value exclusively and runs single-threaded, so there is nothing to
//! synchronize and no need for a concurrent map or atomics.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DEFAULT_BACKOFF_CAP: u32 = 64;

struct HostTiming {
    last_fetch_at: Option<Instant>,
    crawl_delay: Duration,
    backoff_multiplier: u32,
}

impl HostTiming {
    fn new(base_delay: Duration) -> Self {
        Self {
            last_fetch_at: None,
            crawl_delay: base_delay,
            backoff_multiplier: 1,
        }
    }
}

/// Per-host delay bookkeeping, jittered base delay, `Crawl-Delay`
/// override, exponential backoff.
pub struct RateLimiter {
    hosts: HashMap<String, HostTiming>,
    base_delay: Duration,
    jitter_window: Duration,
    rng: StdRng,
    backoff_cap: u32,
}

impl RateLimiter {
    #[must_use]
    pub fn new(base_delay: Duration, jitter_window: Duration) -> Self {
        Self {
            hosts: HashMap::new(),
            base_delay,
            jitter_window,
            rng: StdRng::from_rng(&mut rand::rng()),
            backoff_cap: DEFAULT_BACKOFF_CAP,
        }
    }

    /// Reproducible jitter when a seed is supplied, for deterministic
    /// tests and replay.
    #[must_use]
    pub fn with_seed(base_delay: Duration, jitter_window: Duration, seed: u64) -> Self {
        Self {
            hosts: HashMap::new(),
            base_delay,
            jitter_window,
            rng: StdRng::seed_from_u64(seed),
            backoff_cap: DEFAULT_BACKOFF_CAP,
        }
    }

    pub fn set_base_delay(&mut self, d: Duration) {
        self.base_delay = d;
    }

    pub fn set_jitter(&mut self, window: Duration) {
        self.jitter_window = window;
    }

    fn entry(&mut self, host: &str) -> &mut HostTiming {
        self.hosts
            .entry(host.to_string())
            .or_insert_with(|| HostTiming::new(self.base_delay))
    }

    /// Robots-declared `Crawl-Delay`, applied once per host the first time
    /// a non-zero value is observed. The effective delay is always
    /// `max(base_delay, robots_delay)`.
    pub fn set_crawl_delay(&mut self, host: &str, d: Duration) {
        let base = self.base_delay;
        let timing = self.entry(host);
        timing.crawl_delay = base.max(d);
    }

    /// Duration the scheduler must still wait before fetching `host`,
    /// relative to `now`. Never negative.
    pub fn resolve_delay(&mut self, host: &str, now: Instant) -> Duration {
        let jitter_window = self.jitter_window;
        let rng_sample: f64 = self.rng.random_range(0.0..=1.0);
        let timing = self.entry(host);
        let Some(last) = timing.last_fetch_at else {
            return Duration::ZERO;
        };
        let jitter = jitter_window.mul_f64(rng_sample);
        let effective = (timing.crawl_delay + jitter)
            .mul_f64(f64::from(timing.backoff_multiplier));
        let ready_at = last + effective;
        ready_at.saturating_duration_since(now)
    }

    /// Must be called after a fetch attempt completes (success or
    /// failure), before the next dequeue.
    pub fn mark_last_fetch(&mut self, host: &str, now: Instant) {
        self.entry(host).last_fetch_at = Some(now);
    }

    /// Doubles the backoff multiplier up to the cap.
    pub fn backoff(&mut self, host: &str) {
        let cap = self.backoff_cap;
        let timing = self.entry(host);
        timing.backoff_multiplier = (timing.backoff_multiplier * 2).min(cap);
    }

    /// Restores the backoff multiplier to 1.
    pub fn reset_backoff(&mut self, host: &str) {
        self.entry(host).backoff_multiplier = 1;
    }

    #[cfg(test)]
    pub(crate) fn backoff_multiplier(&self, host: &str) -> u32 {
        self.hosts.get(host).map_or(1, |t| t.backoff_multiplier)
    }
}

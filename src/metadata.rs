//! Metadata sink: the narrow interface the scheduler core calls out to for
//! diagnostics and final statistics, independent of where they end up
//! (structured logs by default, an in-memory recorder in tests).

use std::time::Duration;

/// One recorded error: which component raised it, what it was doing, and
/// why.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub component: &'static str,
    pub action: &'static str,
    pub cause: String,
    pub details: String,
}

/// Final statistics, recorded exactly once at the end of a run.
#[derive(Debug, Clone, Copy)]
pub struct FinalCrawlStats {
    pub total_pages: usize,
    pub total_errors: usize,
    pub total_assets: usize,
    pub duration: Duration,
}

/// The scheduler's view of wherever diagnostics go. A sink implementation
/// must make `record_error` and `record_final_crawl_stats` calls observably
/// ordered with the operation that triggered them — trivially true here
/// since the scheduler is single-threaded and calls are synchronous.
pub trait MetadataSink: Send {
    fn record_error(&mut self, record: ErrorRecord);
    fn record_policy_event(&mut self, url: &str, reason: &str);
    fn record_final_crawl_stats(&mut self, stats: FinalCrawlStats);
}

/// Default sink: structured `tracing` events.
#[derive(Debug, Default)]
pub struct TracingMetadataSink {
    error_count: usize,
    finalized: bool,
}

impl MetadataSink for TracingMetadataSink {
    fn record_error(&mut self, record: ErrorRecord) {
        self.error_count += 1;
        tracing::warn!(
            component = record.component,
            action = record.action,
            cause = %record.cause,
            details = %record.details,
            "recoverable error recorded"
        );
    }

    fn record_policy_event(&mut self, url: &str, reason: &str) {
        tracing::debug!(url, reason, "policy event: url dropped");
    }

    fn record_final_crawl_stats(&mut self, stats: FinalCrawlStats) {
        debug_assert!(!self.finalized, "record_final_crawl_stats called more than once");
        self.finalized = true;
        tracing::info!(
            total_pages = stats.total_pages,
            total_errors = stats.total_errors,
            total_assets = stats.total_assets,
            duration_ms = stats.duration.as_millis() as u64,
            "crawl finished"
        );
    }
}

#[cfg(test)]
pub mod test_support {
    use super::{ErrorRecord, FinalCrawlStats, MetadataSink};

    #[derive(Default)]
    pub struct RecordingSink {
        pub errors: Vec<ErrorRecord>,
        pub policy_events: Vec<(String, String)>,
        pub finalized_count: usize,
        pub last_stats: Option<FinalCrawlStats>,
    }

    impl MetadataSink for RecordingSink {
        fn record_error(&mut self, record: ErrorRecord) {
            self.errors.push(record);
        }

        fn record_policy_event(&mut self, url: &str, reason: &str) {
            self.policy_events.push((url.to_string(), reason.to_string()));
        }

        fn record_final_crawl_stats(&mut self, stats: FinalCrawlStats) {
            self.finalized_count += 1;
            self.last_stats = Some(stats);
        }
    }
}

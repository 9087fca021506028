//! A polite, single-host documentation crawler.
//!
//! A single-threaded scheduler drains a FIFO frontier, running each
//! admitted URL through a seven-stage pipeline (fetch, extract, sanitize,
//! convert, resolve assets, normalize, write) while a rate limiter and a
//! `robots.txt` gate keep the crawl inside the target host's stated
//! limits. See [`scheduler::Scheduler`] for the entry point.

pub mod clock;
pub mod config;
pub mod errors;
pub mod frontier;
pub mod metadata;
pub mod pipeline;
pub mod rate_limiter;
pub mod retry;
pub mod robots;
pub mod scheduler;

pub use clock::{CancelSignal, Clock, SleepOutcome, SystemClock};
pub use config::{Config, ConfigBuilder, HashAlgo, RawConfig};
pub use errors::{ClassifiedError, Severity, StageError};
pub use frontier::{AdmissionCandidate, CandidateSource, CrawlToken, Frontier, FrontierLimits};
pub use metadata::{ErrorRecord, FinalCrawlStats, MetadataSink, TracingMetadataSink};
pub use pipeline::{PipelineDriver, PipelineOutcome, PipelineParams, PipelineSuccess};
pub use rate_limiter::RateLimiter;
pub use robots::RobotsGate;
pub use scheduler::{CrawlInitialization, CrawlingExecution, Scheduler};

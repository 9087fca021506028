//! Shared error classification for the crawl scheduler.
//!
//! Every stage of the pipeline owns its own error enum, but the scheduler
//! never branches on the concrete type — it only reads [`Severity`] through
//! the [`ClassifiedError`] trait, so new stages can be added without
//! touching the scheduler's control flow.

use std::fmt;

/// Whether an error should abort the run or just be counted and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged, counted, the current URL is skipped, the loop continues.
    Recoverable,
    /// The run terminates and the error is returned to the caller.
    Fatal,
}

/// Uniform interface the `PipelineDriver` and `Scheduler` use to decide
/// what to do with a stage failure, without knowing the stage's concrete
/// error type.
pub trait ClassifiedError: std::error::Error + Send + Sync + 'static {
    fn severity(&self) -> Severity;

    /// Whether a `RetryPolicy` wrapping this operation should retry.
    fn is_retryable(&self) -> bool {
        matches!(self.severity(), Severity::Recoverable)
    }
}

/// Configuration loading failed. Always fatal, always pre-loop.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ClassifiedError for ConfigError {
    fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

/// Errors raised while fetching and evaluating `robots.txt` for a host.
#[derive(Debug, thiserror::Error)]
pub enum RobotsError {
    #[error("network error fetching robots.txt for {host}: {source}")]
    Network {
        host: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("robots.txt fetch for {host} was cancelled")]
    Cancelled { host: String },
}

impl ClassifiedError for RobotsError {
    fn severity(&self) -> Severity {
        match self {
            // A robots.txt that cannot be reached does not justify aborting
            // the whole run; the scheduler records it and moves on to the
            // next URL.
            RobotsError::Network { .. } => Severity::Recoverable,
            // Cancellation is fatal by convention: the run has nothing left
            // to skip past (spec.md's cancellation semantics).
            RobotsError::Cancelled { .. } => Severity::Fatal,
        }
    }
}

/// Errors raised by the fetcher. `HttpStatus` carries the observed status
/// code so the driver/metadata sink can log it without re-parsing.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network failure fetching {url}: {source}")]
    NetworkFailure {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("timed out fetching {url}")]
    Timeout { url: String },
    #[error("invalid scheme for {url}: only http/https are supported")]
    InvalidScheme { url: String },
    #[error("unexpected HTTP status {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("fetch of {url} was cancelled")]
    Cancelled { url: String },
}

impl ClassifiedError for FetchError {
    fn severity(&self) -> Severity {
        match self {
            FetchError::InvalidScheme { .. } | FetchError::Cancelled { .. } => Severity::Fatal,
            FetchError::NetworkFailure { .. } | FetchError::Timeout { .. } => {
                Severity::Recoverable
            }
            // 4xx/5xx: the page is unusable but the host/run is not; 5xx in
            // particular should still trigger backoff via the driver.
            FetchError::HttpStatus { .. } => Severity::Recoverable,
        }
    }
}

/// Errors raised while pulling the main-content node out of the parsed DOM.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("no content found in {url}")]
    NoContentFound { url: String },
    #[error("HTML parser panicked on {url}: {message}")]
    ParserCrash { url: String, message: String },
}

impl ClassifiedError for ExtractionError {
    fn severity(&self) -> Severity {
        match self {
            ExtractionError::NoContentFound { .. } => Severity::Recoverable,
            ExtractionError::ParserCrash { .. } => Severity::Fatal,
        }
    }
}

/// Errors raised while sanitizing the extracted content node.
#[derive(Debug, thiserror::Error)]
pub enum SanitizationError {
    #[error("{url} has more than one candidate content root after cleaning")]
    CompetingRoots { url: String },
    #[error("sanitizer produced empty output for {url}")]
    EmptyResult { url: String },
}

impl ClassifiedError for SanitizationError {
    fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

/// Errors raised while converting sanitized HTML to Markdown.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("partial conversion of {url}: {message}")]
    Partial { url: String, message: String },
    #[error("conversion of {url} violated a rule: {message}")]
    RuleViolation { url: String, message: String },
}

impl ClassifiedError for ConversionError {
    fn severity(&self) -> Severity {
        match self {
            ConversionError::Partial { .. } => Severity::Recoverable,
            ConversionError::RuleViolation { .. } => Severity::Fatal,
        }
    }
}

/// Errors raised while resolving and rewriting asset references.
#[derive(Debug, thiserror::Error)]
pub enum AssetsError {
    #[error("disk full while writing asset for {url}")]
    DiskFull { url: String },
    #[error("network failure fetching asset {asset_url} referenced from {url}: {source}")]
    NetworkFailure {
        url: String,
        asset_url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ClassifiedError for AssetsError {
    fn severity(&self) -> Severity {
        match self {
            AssetsError::DiskFull { .. } => Severity::Fatal,
            AssetsError::NetworkFailure { .. } => Severity::Recoverable,
        }
    }
}

/// Errors raised while generating frontmatter and normalizing the document.
#[derive(Debug, thiserror::Error)]
pub enum NormalizationError {
    #[error("{url} has no H1 or more than one H1 after conversion")]
    BrokenH1Invariant { url: String },
}

impl ClassifiedError for NormalizationError {
    fn severity(&self) -> Severity {
        match self {
            NormalizationError::BrokenH1Invariant { .. } => Severity::Fatal,
        }
    }
}

/// Errors raised while writing the final artifact to disk.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to write {path}: {source}")]
    WriteFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("disk full writing {path}")]
    DiskFull { path: String },
}

impl ClassifiedError for StorageError {
    fn severity(&self) -> Severity {
        match self {
            StorageError::WriteFailure { .. } => Severity::Fatal,
            StorageError::DiskFull { .. } => Severity::Recoverable,
        }
    }
}

/// Run-scoped cancellation. Always fatal: a cancelled run has nothing left
/// to skip past.
#[derive(Debug, Clone, thiserror::Error)]
#[error("crawl was cancelled")]
pub struct Cancelled;

impl ClassifiedError for Cancelled {
    fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

/// Type-erased stage error flowing out of the `PipelineDriver`. Keeps the
/// concrete `thiserror` enum for logging while letting the driver and
/// scheduler branch only on `severity()`.
#[derive(Debug)]
pub struct StageError {
    pub stage: &'static str,
    pub severity: Severity,
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl StageError {
    pub fn new<E>(stage: &'static str, err: E) -> Self
    where
        E: ClassifiedError,
    {
        let severity = err.severity();
        Self {
            stage,
            severity,
            source: Box::new(err),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.source)
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

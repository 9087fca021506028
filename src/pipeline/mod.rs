//! Per-URL orchestration of the seven pipeline stages with uniform error
//! classification and metadata recording.
//!
//! Each stage is modeled as an abstract capability (one trait, one method)
//! injected into the driver, so the driver itself stays generic over
//! concrete stage implementations and tests can substitute fakes at any
//! seam without runtime type tricks.

pub mod convert;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod resolve;
pub mod sanitize;
pub mod write;

use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use url::Url;

use crate::clock::{CancelSignal, Clock};
use crate::config::HashAlgo;
use crate::errors::{ClassifiedError, StageError};
use crate::frontier::{canonicalize, CrawlToken};
use crate::metadata::{ErrorRecord, MetadataSink};
use crate::rate_limiter::RateLimiter;

use convert::Converter;
use extract::Extractor;
use fetch::Fetcher;
use normalize::{NormalizeParams, Normalizer};
use resolve::Resolver;
use sanitize::Sanitizer;
use write::{Storage, WriteResult};

/// What survives a fully successful run of the seven stages for one token.
#[derive(Debug, Clone)]
pub struct PipelineSuccess {
    pub write_result: WriteResult,
    pub discovered: Vec<Url>,
    pub asset_count: usize,
}

/// The driver's verdict for one dequeued token. `Continue` covers both a
/// full success and an absorbed recoverable error — in both cases the
/// scheduler loop proceeds to the next token. `Abort` carries the fatal
/// error the scheduler returns from `execute_crawling_with_state`.
#[derive(Debug)]
pub enum PipelineOutcome {
    Continue { success: Option<PipelineSuccess> },
    Abort { error: StageError },
}

#[derive(Clone)]
pub struct PipelineParams {
    pub output_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub hash_algo: HashAlgo,
    pub app_version: String,
    pub category: String,
}

/// Wires one concrete implementation of each of the seven collaborators
/// behind their trait seam.
pub struct PipelineDriver {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    sanitizer: Arc<dyn Sanitizer>,
    converter: Arc<dyn Converter>,
    resolver: Arc<dyn Resolver>,
    normalizer: Arc<dyn Normalizer>,
    storage: Arc<dyn Storage>,
    params: PipelineParams,
}

impl PipelineDriver {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        sanitizer: Arc<dyn Sanitizer>,
        converter: Arc<dyn Converter>,
        resolver: Arc<dyn Resolver>,
        normalizer: Arc<dyn Normalizer>,
        storage: Arc<dyn Storage>,
        params: PipelineParams,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            sanitizer,
            converter,
            resolver,
            normalizer,
            storage,
            params,
        }
    }

    /// Runs Fetch through Write, in strict order, for one token. Stage *k*
    /// only runs if stages `1..k-1` all succeeded (P1). Fetch is called
    /// exactly once per call (P2); Write is called at most once, and
    /// exactly once iff every prior stage succeeded (P3).
    pub async fn run(
        &self,
        token: &CrawlToken,
        host: &str,
        rate_limiter: &mut RateLimiter,
        metadata: &mut dyn MetadataSink,
        clock: &dyn Clock,
        cancel: &CancelSignal,
    ) -> PipelineOutcome {
        macro_rules! stage_or_classify {
            ($stage:expr, $result:expr) => {
                match $result {
                    Ok(value) => value,
                    Err(err) => return self.classify(host, $stage, err, rate_limiter, metadata),
                }
            };
        }

        let fetch_result = stage_or_classify!(
            "fetch",
            self.fetcher.fetch(&token.url, clock, cancel).await
        );

        let extracted = stage_or_classify!(
            "extract",
            self.extractor.extract(
                token.url.as_str(),
                &String::from_utf8_lossy(&fetch_result.body_bytes),
            )
        );

        let sanitized = stage_or_classify!(
            "sanitize",
            self.sanitizer
                .sanitize(token.url.as_str(), &extracted.container_html)
        );

        let converted = stage_or_classify!(
            "convert",
            self.converter.convert(
                &fetch_result.final_url,
                &sanitized.html,
                &sanitized.discovered_links,
            )
        );

        let assetful = stage_or_classify!(
            "resolve",
            self.resolver
                .resolve(
                    &fetch_result.final_url,
                    &converted.markdown,
                    &self.params.assets_dir,
                    clock,
                    cancel,
                )
                .await
        );

        let canonical = canonicalize(&fetch_result.final_url);
        let url_hash = hex_sha256(canonical.as_bytes());
        let normalize_params = NormalizeParams {
            hash_algo: self.params.hash_algo,
            app_version: self.params.app_version.clone(),
            category: self.params.category.clone(),
        };
        let normalized = stage_or_classify!(
            "normalize",
            self.normalizer.normalize(
                &fetch_result.final_url,
                &token.url,
                token.depth,
                extracted.title.as_deref(),
                &url_hash,
                &assetful.markdown,
                &normalize_params,
            )
        );

        let write_result = stage_or_classify!(
            "write",
            self.storage
                .write(
                    &self.params.output_dir,
                    &url_hash,
                    &normalized.content_hash,
                    &normalized.content,
                )
                .await
        );

        rate_limiter.reset_backoff(host);
        metadata.record_policy_event(token.url.as_str(), "written");

        PipelineOutcome::Continue {
            success: Some(PipelineSuccess {
                write_result,
                discovered: converted.link_refs,
                asset_count: assetful.asset_count,
            }),
        }
    }

    fn classify<E: ClassifiedError>(
        &self,
        host: &str,
        stage: &'static str,
        err: E,
        rate_limiter: &mut RateLimiter,
        metadata: &mut dyn MetadataSink,
    ) -> PipelineOutcome {
        let stage_error = StageError::new(stage, err);
        metadata.record_error(ErrorRecord {
            component: stage,
            action: "run",
            cause: stage_error.source.to_string(),
            details: stage_error.to_string(),
        });

        match stage_error.severity {
            crate::errors::Severity::Recoverable => {
                rate_limiter.backoff(host);
                PipelineOutcome::Continue { success: None }
            }
            crate::errors::Severity::Fatal => PipelineOutcome::Abort {
                error: stage_error,
            },
        }
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

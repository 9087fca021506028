//! Two-phase lifecycle: build everything a crawl needs
//! (`initialize_crawling`), then drain the frontier
//! (`execute_crawling_with_state`).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::clock::{CancelSignal, Clock, SystemClock};
use crate::config::Config;
use crate::errors::{ClassifiedError, ConfigError, StageError};
use crate::frontier::{AdmissionCandidate, CandidateSource, Frontier, FrontierLimits};
use crate::metadata::{FinalCrawlStats, MetadataSink, TracingMetadataSink};
use crate::pipeline::convert::HtmdConverter;
use crate::pipeline::extract::ScraperExtractor;
use crate::pipeline::fetch::{Fetcher, HttpFetcher};
use crate::pipeline::normalize::FrontmatterNormalizer;
use crate::pipeline::resolve::HttpResolver;
use crate::pipeline::sanitize::ScraperSanitizer;
use crate::pipeline::write::{FileSystemStorage, WriteResult};
use crate::pipeline::{PipelineDriver, PipelineOutcome, PipelineParams};
use crate::rate_limiter::RateLimiter;
use crate::robots::RobotsGate;

/// Immutable bundle produced by phase 1, consumed by phase 2. Holding onto
/// it after `execute_crawling_with_state` is called is a logic error the
/// type system prevents: `execute_crawling_with_state` takes it by value.
pub struct CrawlInitialization {
    config: Config,
    current_host: String,
    seed_scheme: String,
    initial_delay_applied: bool,
    frontier: Frontier,
    rate_limiter: RateLimiter,
    robots: RobotsGate,
    http_client: reqwest::Client,
}

/// Produced by phase 2.
#[derive(Debug, Clone)]
pub struct CrawlingExecution {
    pub write_results: Vec<WriteResult>,
    pub total_assets: usize,
}

pub struct Scheduler {
    clock: Arc<dyn Clock>,
    cancel: CancelSignal,
    metadata: Box<dyn MetadataSink>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            cancel: CancelSignal::new(),
            metadata: Box::new(TracingMetadataSink::default()),
        }
    }
}

impl Scheduler {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, cancel: CancelSignal, metadata: Box<dyn MetadataSink>) -> Self {
        Self {
            clock,
            cancel,
            metadata,
        }
    }

    #[must_use]
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Phase 1. Any failure here is a `ConfigError`: fatal, pre-loop.
    pub fn initialize_crawling(&self, config: Config) -> Result<CrawlInitialization, ConfigError> {
        let current_host = config
            .seed_url
            .host_str()
            .ok_or_else(|| ConfigError::Invalid("seed URL has no host".to_string()))?
            .to_ascii_lowercase();
        let seed_scheme = config.seed_url.scheme().to_string();

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout.unwrap_or(std::time::Duration::from_secs(30)))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        let robots = RobotsGate::new(config.user_agent.clone(), http_client.clone());

        let rate_limiter = match config.random_seed {
            Some(seed) => RateLimiter::with_seed(config.base_delay, config.jitter, seed),
            None => RateLimiter::new(config.base_delay, config.jitter),
        };

        let mut frontier = Frontier::new(
            &config.seed_url,
            FrontierLimits {
                max_depth: config.max_depth,
                max_pages: config.max_pages,
                allowed_path_prefixes: config.allowed_path_prefixes.clone(),
            },
        );
        frontier.submit(AdmissionCandidate {
            target_url: config.seed_url.clone(),
            source: CandidateSource::Seed,
            depth: 0,
            parent_url: None,
        });

        Ok(CrawlInitialization {
            config,
            current_host,
            seed_scheme,
            initial_delay_applied: false,
            frontier,
            rate_limiter,
            robots,
            http_client,
        })
    }

    /// Phase 2. Drains the frontier until empty, depth/budget exhausted, or
    /// a fatal error is hit. Always finalizes exactly once, including when
    /// cancellation cuts the run short.
    pub async fn execute_crawling_with_state(
        &mut self,
        init: CrawlInitialization,
    ) -> Result<CrawlingExecution, StageError> {
        let CrawlInitialization {
            config,
            current_host,
            seed_scheme: _seed_scheme,
            mut initial_delay_applied,
            mut frontier,
            mut rate_limiter,
            mut robots,
            http_client,
        } = init;

        let output_dir = config.output_dir.clone();
        let assets_dir = output_dir.join("assets");

        let fetcher: Arc<dyn Fetcher> =
            Arc::new(HttpFetcher::new(http_client.clone(), config.user_agent.clone()));
        let driver = PipelineDriver::new(
            fetcher,
            Arc::new(ScraperExtractor),
            Arc::new(ScraperSanitizer),
            Arc::new(HtmdConverter::default()),
            Arc::new(HttpResolver::new(http_client.clone())),
            Arc::new(FrontmatterNormalizer),
            Arc::new(FileSystemStorage),
            PipelineParams {
                output_dir,
                assets_dir,
                hash_algo: config.hash_algo,
                app_version: env!("CARGO_PKG_VERSION").to_string(),
                category: "docs".to_string(),
            },
        );

        let run_started_at = Instant::now();
        let mut write_results = Vec::new();
        let mut total_assets = 0usize;
        let mut total_errors = 0usize;
        let mut crawl_delay_applied_hosts: HashSet<String> = HashSet::new();

        let fatal = loop {
            if self.cancel.is_cancelled() {
                break Some(StageError::new("scheduler", crate::errors::Cancelled));
            }

            let Some(token) = frontier.dequeue() else {
                break None;
            };

            let decision = match robots.decide(&token.url).await {
                Ok(d) => d,
                Err(err) => {
                    total_errors += 1;
                    let severity = err.severity();
                    self.metadata.record_error(crate::metadata::ErrorRecord {
                        component: "robots",
                        action: "decide",
                        cause: err.to_string(),
                        details: token.url.to_string(),
                    });
                    if severity == crate::errors::Severity::Fatal {
                        break Some(StageError::new("robots", err));
                    }
                    continue;
                }
            };

            if !decision.allowed {
                self.metadata.record_policy_event(token.url.as_str(), "robots_disallow");
                continue;
            }

            if let Some(crawl_delay) = decision.crawl_delay {
                if !crawl_delay_applied_hosts.contains(&current_host) {
                    rate_limiter.set_crawl_delay(&current_host, crawl_delay);
                    crawl_delay_applied_hosts.insert(current_host.clone());
                }
            }
            if !initial_delay_applied {
                initial_delay_applied = true;
            }

            let wait = rate_limiter.resolve_delay(&current_host, self.clock.now());
            if self.clock.sleep(wait, &self.cancel).await
                == crate::clock::SleepOutcome::Cancelled
            {
                break Some(StageError::new("scheduler", crate::errors::Cancelled));
            }
            rate_limiter.mark_last_fetch(&current_host, self.clock.now());

            let outcome = driver
                .run(
                    &token,
                    &current_host,
                    &mut rate_limiter,
                    self.metadata.as_mut(),
                    self.clock.as_ref(),
                    &self.cancel,
                )
                .await;

            match outcome {
                PipelineOutcome::Continue { success } => {
                    if let Some(success) = success {
                        total_assets += success.asset_count;
                        write_results.push(success.write_result);
                        for link in success.discovered {
                            frontier.submit(AdmissionCandidate {
                                target_url: link,
                                source: CandidateSource::Discovered,
                                depth: token.depth + 1,
                                parent_url: Some(token.url.clone()),
                            });
                        }
                    } else {
                        total_errors += 1;
                    }
                }
                PipelineOutcome::Abort { error } => break Some(error),
            }
        };

        self.metadata.record_final_crawl_stats(FinalCrawlStats {
            total_pages: write_results.len(),
            total_errors,
            total_assets,
            duration: run_started_at.elapsed(),
        });

        if let Some(error) = fatal {
            return Err(error);
        }

        Ok(CrawlingExecution {
            write_results,
            total_assets,
        })
    }
}

//! FIFO crawl frontier: admission, deduplication, depth/budget enforcement.
//!
//! Backed by a plain `VecDeque` + `HashSet` rather than a concurrent
//! structure, since the scheduler is the sole owner and sole mutator.

use std::collections::{HashSet, VecDeque};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use url::Url;

/// Unit of work carrying `(url, depth)`. Two tokens are equal iff their
/// canonicalized URLs match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlToken {
    pub url: Url,
    pub depth: u32,
}

/// Where an admission candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Seed,
    Discovered,
}

/// A URL proposed for admission, not yet a `CrawlToken`.
#[derive(Debug, Clone)]
pub struct AdmissionCandidate {
    pub target_url: Url,
    pub source: CandidateSource,
    pub depth: u32,
    pub parent_url: Option<Url>,
}

/// Canonicalize a URL for deduplication: lowercase host, normalized path,
/// fragment stripped.
#[must_use]
pub fn canonicalize(url: &Url) -> String {
    let mut canon = url.clone();
    canon.set_fragment(None);
    let host = canon.host_str().unwrap_or("").to_ascii_lowercase();
    let path = if canon.path().is_empty() {
        "/"
    } else {
        canon.path()
    };
    format!(
        "{}://{}{}{}{}",
        canon.scheme(),
        host,
        path,
        if canon.query().is_some() { "?" } else { "" },
        canon.query().unwrap_or("")
    )
}

fn hash_of(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Admission policy configuration the frontier enforces on every submit.
#[derive(Debug, Clone)]
pub struct FrontierLimits {
    pub max_depth: u32,
    pub max_pages: Option<usize>,
    pub allowed_path_prefixes: Vec<String>,
}

/// FIFO queue of tokens, a visited set for dedup, and depth accounting.
pub struct Frontier {
    queue: VecDeque<CrawlToken>,
    visited: HashSet<u64>,
    visited_count: usize,
    depth_counts: std::collections::HashMap<u32, usize>,
    seed_scheme: String,
    seed_host: String,
    limits: FrontierLimits,
}

impl Frontier {
    #[must_use]
    pub fn new(seed: &Url, limits: FrontierLimits) -> Self {
        Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            visited_count: 0,
            depth_counts: std::collections::HashMap::new(),
            seed_scheme: seed.scheme().to_string(),
            seed_host: seed.host_str().unwrap_or("").to_ascii_lowercase(),
            limits,
        }
    }

    /// Idempotent admission. Returns `true` if the candidate was admitted.
    /// Rejections are silent — the caller has no hook beyond observing
    /// `visited_count`.
    pub fn submit(&mut self, candidate: AdmissionCandidate) -> bool {
        if candidate.target_url.scheme() != self.seed_scheme {
            return false;
        }
        let host = candidate
            .target_url
            .host_str()
            .unwrap_or("")
            .to_ascii_lowercase();
        if host != self.seed_host {
            return false;
        }
        if !self.limits.allowed_path_prefixes.is_empty() {
            let path = candidate.target_url.path();
            if !self
                .limits
                .allowed_path_prefixes
                .iter()
                .any(|p| path.starts_with(p.as_str()))
            {
                return false;
            }
        }
        if candidate.depth > self.limits.max_depth {
            return false;
        }
        if let Some(max_pages) = self.limits.max_pages {
            if self.visited_count >= max_pages {
                return false;
            }
        }
        let key = hash_of(&canonicalize(&candidate.target_url));
        if !self.visited.insert(key) {
            return false;
        }
        self.visited_count += 1;
        self.enqueue(CrawlToken {
            url: candidate.target_url,
            depth: candidate.depth,
        });
        true
    }

    /// Lower-level primitive used by the retry path to push a token back
    /// onto the queue without re-running admission checks.
    pub fn enqueue(&mut self, token: CrawlToken) {
        *self.depth_counts.entry(token.depth).or_insert(0) += 1;
        self.queue.push_back(token);
    }

    /// Strict FIFO dequeue. Dequeued tokens are never re-enqueued by the
    /// frontier itself.
    pub fn dequeue(&mut self) -> Option<CrawlToken> {
        let token = self.queue.pop_front()?;
        if let Some(count) = self.depth_counts.get_mut(&token.depth) {
            *count = count.saturating_sub(1);
        }
        Some(token)
    }

    #[must_use]
    pub fn is_depth_exhausted(&self, depth: u32) -> bool {
        !self
            .depth_counts
            .iter()
            .any(|(&d, &count)| d <= depth && count > 0)
    }

    #[must_use]
    pub fn current_min_depth(&self) -> Option<u32> {
        self.depth_counts
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(&d, _)| d)
            .min()
    }

    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

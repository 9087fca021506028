//! Stage 6: synthesize frontmatter and compute the content hash.
//!
//! Enforces the single-H1 invariant: a converted document must contain
//! exactly one top-level heading once frontmatter is excluded.

use std::time::SystemTime;

use sha2::{Digest, Sha256};
use url::Url;

use crate::config::HashAlgo;
use crate::errors::NormalizationError;

#[derive(Debug, Clone)]
pub struct NormalizeParams {
    pub hash_algo: HashAlgo,
    pub app_version: String,
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct NormalizedMarkdownDoc {
    pub content: String,
    pub content_hash: String,
}

pub trait Normalizer: Send + Sync {
    fn normalize(
        &self,
        fetched_url: &Url,
        canonical_url: &Url,
        depth: u32,
        title: Option<&str>,
        doc_id: &str,
        markdown: &str,
        params: &NormalizeParams,
    ) -> Result<NormalizedMarkdownDoc, NormalizationError>;
}

#[derive(Debug, Default)]
pub struct FrontmatterNormalizer;

fn count_h1(markdown: &str) -> usize {
    markdown
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            trimmed.starts_with("# ") || trimmed == "#"
        })
        .count()
}

impl Normalizer for FrontmatterNormalizer {
    fn normalize(
        &self,
        fetched_url: &Url,
        canonical_url: &Url,
        depth: u32,
        title: Option<&str>,
        doc_id: &str,
        markdown: &str,
        params: &NormalizeParams,
    ) -> Result<NormalizedMarkdownDoc, NormalizationError> {
        let h1_count = count_h1(markdown);
        if h1_count != 1 {
            return Err(NormalizationError::BrokenH1Invariant {
                url: fetched_url.to_string(),
            });
        }

        let hash = match params.hash_algo {
            HashAlgo::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(markdown.as_bytes());
                hex::encode(hasher.finalize())
            }
        };
        let content_hash = format!("{}:{}", params.hash_algo, hash);

        let fetched_at = rfc3339_now();

        let title = title.unwrap_or("Untitled");
        let frontmatter = format!(
            "---\ntitle: {title}\ncanonical_url: {canonical_url}\nfetched_url: {fetched_url}\ncrawl_depth: {depth}\ncategory: {category}\ndoc_id: {doc_id}\ncontent_hash: {content_hash}\nfetched_at: {fetched_at}\napp_version: {app_version}\n---\n\n",
            category = params.category,
            app_version = params.app_version,
        );

        Ok(NormalizedMarkdownDoc {
            content: format!("{frontmatter}{markdown}"),
            content_hash,
        })
    }
}

fn rfc3339_now() -> String {
    let now = SystemTime::now();
    let datetime: chrono::DateTime<chrono::Utc> = now.into();
    datetime.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NormalizeParams {
        NormalizeParams {
            hash_algo: HashAlgo::Sha256,
            app_version: "0.1.0".to_string(),
            category: "docs".to_string(),
        }
    }

    #[test]
    fn accepts_a_single_h1() {
        let url = Url::parse("https://example.com/a").unwrap();
        let out = FrontmatterNormalizer
            .normalize(&url, &url, 0, Some("Title"), "abc123", "# Title\n\nbody", &params())
            .unwrap();
        assert!(out.content.starts_with("---\n"));
        assert!(out.content.contains("title: Title"));
        assert!(out.content_hash.starts_with("sha256:"));
    }

    #[test]
    fn rejects_zero_h1s() {
        let url = Url::parse("https://example.com/a").unwrap();
        let err = FrontmatterNormalizer
            .normalize(&url, &url, 0, None, "abc123", "no heading here", &params())
            .unwrap_err();
        assert!(matches!(err, NormalizationError::BrokenH1Invariant { .. }));
    }

    #[test]
    fn rejects_multiple_h1s() {
        let url = Url::parse("https://example.com/a").unwrap();
        let err = FrontmatterNormalizer
            .normalize(&url, &url, 0, None, "abc123", "# One\n# Two", &params())
            .unwrap_err();
        assert!(matches!(err, NormalizationError::BrokenH1Invariant { .. }));
    }

    #[test]
    fn hash_is_deterministic_for_identical_content() {
        let url = Url::parse("https://example.com/a").unwrap();
        let a = FrontmatterNormalizer
            .normalize(&url, &url, 0, None, "id", "# T\nbody", &params())
            .unwrap();
        let b = FrontmatterNormalizer
            .normalize(&url, &url, 0, None, "id", "# T\nbody", &params())
            .unwrap();
        assert_eq!(a.content_hash, b.content_hash);
    }
}

//! Stage 5: discover and rewrite asset references (images) inside the
//! converted Markdown, downloading each asset and pointing the Markdown at
//! its local path.
//!
//! A recoverable failure downloading one asset only drops that asset's
//! reference; it never aborts the page.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use crate::clock::{CancelSignal, Clock};
use crate::errors::AssetsError;
use crate::retry::{retry, RetryParams};

static MARKDOWN_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct AssetfulMarkdownDoc {
    pub markdown: String,
    pub asset_count: usize,
}

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        page_url: &Url,
        markdown: &str,
        assets_dir: &Path,
        clock: &dyn Clock,
        cancel: &CancelSignal,
    ) -> Result<AssetfulMarkdownDoc, AssetsError>;
}

/// Downloads referenced images next to the page's eventual output file and
/// rewrites Markdown image references to the local relative path.
pub struct HttpResolver {
    client: reqwest::Client,
    retry_params: RetryParams,
}

impl HttpResolver {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            retry_params: RetryParams::default(),
        }
    }

    #[cfg(test)]
    #[must_use]
    fn with_fast_retries(mut self) -> Self {
        self.retry_params = RetryParams {
            max_attempts: 1,
            base_backoff: std::time::Duration::from_millis(1),
            max_backoff: std::time::Duration::from_millis(1),
            jitter: std::time::Duration::ZERO,
        };
        self
    }

    async fn fetch_asset(&self, asset_url: &Url) -> Result<Vec<u8>, AssetsError> {
        let response = self
            .client
            .get(asset_url.clone())
            .send()
            .await
            .map_err(|e| AssetsError::NetworkFailure {
                url: asset_url.to_string(),
                asset_url: asset_url.to_string(),
                source: e,
            })?
            .error_for_status()
            .map_err(|e| AssetsError::NetworkFailure {
                url: asset_url.to_string(),
                asset_url: asset_url.to_string(),
                source: e,
            })?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AssetsError::NetworkFailure {
                url: asset_url.to_string(),
                asset_url: asset_url.to_string(),
                source: e,
            })?;
        Ok(bytes.to_vec())
    }

    fn asset_file_name(asset_url: &Url, index: usize) -> String {
        let ext = Path::new(asset_url.path())
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        format!("asset-{index}.{ext}")
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    async fn resolve(
        &self,
        page_url: &Url,
        markdown: &str,
        assets_dir: &Path,
        clock: &dyn Clock,
        cancel: &CancelSignal,
    ) -> Result<AssetfulMarkdownDoc, AssetsError> {
        let mut out = markdown.to_string();
        let mut asset_count = 0usize;

        let matches: Vec<(String, String)> = MARKDOWN_IMAGE
            .captures_iter(markdown)
            .map(|c| (c[0].to_string(), c[2].to_string()))
            .collect();

        for (whole_match, raw_href) in matches {
            let Ok(asset_url) = page_url.join(&raw_href) else {
                continue;
            };
            if asset_url.scheme() != "http" && asset_url.scheme() != "https" {
                continue;
            }

            let bytes = match retry(self.retry_params, clock, cancel, || {
                self.fetch_asset(&asset_url)
            })
            .await
            {
                Ok(bytes) => bytes,
                Err(_recoverable) => continue,
            };

            let file_name = Self::asset_file_name(&asset_url, asset_count);
            let dest: PathBuf = assets_dir.join(&file_name);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|_| AssetsError::DiskFull {
                        url: page_url.to_string(),
                    })?;
            }
            tokio::fs::write(&dest, &bytes)
                .await
                .map_err(|_| AssetsError::DiskFull {
                    url: page_url.to_string(),
                })?;

            asset_count += 1;
            let replacement = local_ref_replacement(&whole_match, &file_name);
            out = out.replacen(&whole_match, &replacement, 1);
        }

        Ok(AssetfulMarkdownDoc {
            markdown: out,
            asset_count,
        })
    }
}

fn local_ref_replacement(whole_match: &str, file_name: &str) -> String {
    // `whole_match` is `![alt](href)`; keep the alt text, swap the href.
    let alt_end = whole_match.find(']').unwrap_or(0);
    let alt = &whole_match[..=alt_end];
    format!("{alt}({file_name})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FakeClock;

    #[tokio::test]
    async fn downloads_and_rewrites_a_single_image() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/img.png")
            .with_status(200)
            .with_body(vec![1, 2, 3, 4])
            .create_async()
            .await;

        let page_url = Url::parse(&format!("{}/docs/guide", server.url())).unwrap();
        let markdown = "![alt text](/img.png)\nsome text";
        let dir = tempfile::tempdir().unwrap();

        let resolver = HttpResolver::new(reqwest::Client::new());
        let clock = FakeClock::default();
        let cancel = CancelSignal::new();
        let out = resolver
            .resolve(&page_url, markdown, dir.path(), &clock, &cancel)
            .await
            .unwrap();

        assert_eq!(out.asset_count, 1);
        assert!(out.markdown.contains("asset-0.png"));
        assert!(dir.path().join("asset-0.png").exists());
    }

    #[tokio::test]
    async fn markdown_with_no_images_is_a_noop() {
        let page_url = Url::parse("https://example.com/page").unwrap();
        let markdown = "# Title\n\nNo images here.";
        let dir = tempfile::tempdir().unwrap();

        let resolver = HttpResolver::new(reqwest::Client::new());
        let clock = FakeClock::default();
        let cancel = CancelSignal::new();
        let out = resolver
            .resolve(&page_url, markdown, dir.path(), &clock, &cancel)
            .await
            .unwrap();

        assert_eq!(out.asset_count, 0);
        assert_eq!(out.markdown, markdown);
    }

    #[tokio::test]
    async fn a_failing_asset_download_is_skipped_not_fatal() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/broken.png")
            .with_status(500)
            .create_async()
            .await;

        let page_url = Url::parse(&format!("{}/docs/guide", server.url())).unwrap();
        let markdown = "![alt](/broken.png)";
        let dir = tempfile::tempdir().unwrap();

        let resolver = HttpResolver::new(reqwest::Client::new()).with_fast_retries();
        let clock = FakeClock::default();
        let cancel = CancelSignal::new();
        let out = resolver
            .resolve(&page_url, markdown, dir.path(), &clock, &cancel)
            .await
            .unwrap();

        assert_eq!(out.asset_count, 0);
        assert_eq!(out.markdown, markdown);
    }
}

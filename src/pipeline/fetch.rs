//! Stage 1: fetch a URL over HTTP.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use url::Url;

use crate::clock::{CancelSignal, Clock};
use crate::errors::FetchError;
use crate::retry::{retry, RetryParams};

/// What the fetcher returns on success. `final_url` can differ from the
/// requested URL if the server redirected.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub final_url: Url,
    pub body_bytes: Vec<u8>,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub headers: reqwest::header::HeaderMap,
    pub fetched_at: SystemTime,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &Url,
        clock: &dyn Clock,
        cancel: &CancelSignal,
    ) -> Result<FetchResult, FetchError>;
}

/// `reqwest`-backed fetcher. A single shared client is reused across the
/// whole run for connection pooling.
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
    retry_params: RetryParams,
}

impl HttpFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            retry_params: RetryParams::default(),
        }
    }

    #[must_use]
    pub fn with_retry_params(mut self, params: RetryParams) -> Self {
        self.retry_params = params;
        self
    }

    async fn fetch_once(&self, url: &Url) -> Result<FetchResult, FetchError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::InvalidScheme {
                url: url.to_string(),
            });
        }

        let response = self
            .client
            .get(url.clone())
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::NetworkFailure {
                        url: url.to_string(),
                        source: e,
                    }
                }
            })?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body_bytes = response.bytes().await.map_err(|e| FetchError::NetworkFailure {
            url: url.to_string(),
            source: e,
        })?;

        Ok(FetchResult {
            final_url,
            body_bytes: body_bytes.to_vec(),
            status_code: status.as_u16(),
            content_type,
            headers,
            fetched_at: SystemTime::now(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &Url,
        clock: &dyn Clock,
        cancel: &CancelSignal,
    ) -> Result<FetchResult, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_string(),
            });
        }
        retry(self.retry_params, clock, cancel, || self.fetch_once(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FakeClock;

    #[tokio::test]
    async fn fetches_a_small_page_successfully() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/page")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>hi</body></html>")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(reqwest::Client::new(), "TestBot");
        let clock = FakeClock::default();
        let cancel = CancelSignal::new();
        let url = Url::parse(&format!("{}/page", server.url())).unwrap();
        let result = fetcher.fetch(&url, &clock, &cancel).await.unwrap();
        assert_eq!(result.status_code, 200);
        assert_eq!(result.content_type.as_deref(), Some("text/html"));
        assert!(String::from_utf8_lossy(&result.body_bytes).contains("hi"));
    }

    #[tokio::test]
    async fn non_http_scheme_is_rejected_before_any_request() {
        let fetcher = HttpFetcher::new(reqwest::Client::new(), "TestBot");
        let clock = FakeClock::default();
        let cancel = CancelSignal::new();
        let url = Url::parse("ftp://example.com/file").unwrap();
        let err = fetcher.fetch(&url, &clock, &cancel).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidScheme { .. }));
    }

    #[tokio::test]
    async fn server_error_retries_then_surfaces_as_recoverable() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(reqwest::Client::new(), "TestBot")
            .with_retry_params(RetryParams {
                max_attempts: 3,
                base_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
                jitter: Duration::ZERO,
            });
        let clock = FakeClock::default();
        let cancel = CancelSignal::new();
        let url = Url::parse(&format!("{}/flaky", server.url())).unwrap();
        let err = fetcher.fetch(&url, &clock, &cancel).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 503, .. }));
    }
}

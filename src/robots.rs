//! `robots.txt` fetch, cache, and evaluation.
//!
//! Caches one parsed ruleset per host in an `IndexMap` and evaluates
//! allow/deny with the `robotstxt` crate's `DefaultMatcher`.

use indexmap::IndexMap;
use robotstxt::DefaultMatcher;
use url::Url;

use crate::errors::RobotsError;

use std::time::Duration;

/// Closed enum explaining why a decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    EmptyRuleSet,
    ExplicitAllow,
    ExplicitDisallow,
    MalformedRobots,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub url: Url,
    pub allowed: bool,
    pub reason: Reason,
    pub crawl_delay: Option<Duration>,
}

struct CachedRobots {
    body: String,
    crawl_delay: Option<Duration>,
    malformed: bool,
}

/// Caches one parsed ruleset per host for the process lifetime of the run.
pub struct RobotsGate {
    user_agent: String,
    cache: IndexMap<String, CachedRobots>,
    client: reqwest::Client,
}

impl RobotsGate {
    #[must_use]
    pub fn new(user_agent: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            user_agent: user_agent.into(),
            cache: IndexMap::new(),
            client,
        }
    }

    fn parse_crawl_delay(body: &str) -> Option<Duration> {
        body.lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                if key.trim().eq_ignore_ascii_case("crawl-delay") {
                    value.trim().parse::<f64>().ok()
                } else {
                    None
                }
            })
            .next()
            .map(Duration::from_secs_f64)
    }

    /// Fetch (if not cached) and evaluate `target_url` against the host's
    /// `robots.txt`. 404/403 are treated as an empty ruleset (allow all);
    /// 5xx or a network error is a recoverable `RobotsError`; malformed
    /// content defaults to allow-all but is flagged via `Reason`.
    pub async fn decide(&mut self, target_url: &Url) -> Result<Decision, RobotsError> {
        let host = target_url.host_str().unwrap_or("").to_ascii_lowercase();

        if !self.cache.contains_key(&host) {
            let robots_url = format!("{}://{}/robots.txt", target_url.scheme(), host);
            let fetched = self.client.get(&robots_url).send().await.map_err(|e| {
                RobotsError::Network {
                    host: host.clone(),
                    source: e,
                }
            })?;

            let status = fetched.status();
            let cached = if status.is_success() {
                let body = fetched.text().await.map_err(|e| RobotsError::Network {
                    host: host.clone(),
                    source: e,
                })?;
                let crawl_delay = Self::parse_crawl_delay(&body);
                CachedRobots {
                    body,
                    crawl_delay,
                    malformed: false,
                }
            } else if status.as_u16() == 404 || status.as_u16() == 403 {
                CachedRobots {
                    body: String::new(),
                    crawl_delay: None,
                    malformed: false,
                }
            } else if status.is_server_error() {
                return Err(RobotsError::Network {
                    host: host.clone(),
                    source: fetched.error_for_status().unwrap_err(),
                });
            } else {
                CachedRobots {
                    body: String::new(),
                    crawl_delay: None,
                    malformed: true,
                }
            };
            self.cache.insert(host.clone(), cached);
        }

        let cached = self.cache.get(&host).expect("just inserted above");

        if cached.malformed {
            return Ok(Decision {
                url: target_url.clone(),
                allowed: true,
                reason: Reason::MalformedRobots,
                crawl_delay: cached.crawl_delay,
            });
        }

        if cached.body.is_empty() {
            return Ok(Decision {
                url: target_url.clone(),
                allowed: true,
                reason: Reason::EmptyRuleSet,
                crawl_delay: None,
            });
        }

        let allowed = DefaultMatcher::default().one_agent_allowed_by_robots(
            &cached.body,
            &self.user_agent,
            target_url.as_str(),
        );

        Ok(Decision {
            url: target_url.clone(),
            allowed,
            reason: if allowed {
                Reason::ExplicitAllow
            } else {
                Reason::ExplicitDisallow
            },
            crawl_delay: cached.crawl_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_404_robots_txt_allows_everything() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/robots.txt")
            .with_status(404)
            .create_async()
            .await;

        let mut gate = RobotsGate::new("TestBot", reqwest::Client::new());
        let url = Url::parse(&format!("{}/page", server.url())).unwrap();
        let decision = gate.decide(&url).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.reason, Reason::EmptyRuleSet);
    }

    #[tokio::test]
    async fn explicit_disallow_is_honored() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_body("User-agent: *\nDisallow: /private\n")
            .create_async()
            .await;

        let mut gate = RobotsGate::new("TestBot", reqwest::Client::new());
        let url = Url::parse(&format!("{}/private/page", server.url())).unwrap();
        let decision = gate.decide(&url).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Reason::ExplicitDisallow);
    }

    #[tokio::test]
    async fn crawl_delay_is_parsed_and_cached_across_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_body("User-agent: *\nAllow: /\nCrawl-delay: 10\n")
            .expect(1)
            .create_async()
            .await;

        let mut gate = RobotsGate::new("TestBot", reqwest::Client::new());
        let url_a = Url::parse(&format!("{}/a", server.url())).unwrap();
        let url_b = Url::parse(&format!("{}/b", server.url())).unwrap();

        let d1 = gate.decide(&url_a).await.unwrap();
        assert_eq!(d1.crawl_delay, Some(Duration::from_secs(10)));
        let d2 = gate.decide(&url_b).await.unwrap();
        assert_eq!(d2.crawl_delay, Some(Duration::from_secs(10)));

        mock.assert_async().await;
    }
}

//! News collection: feeds, URL clean-up, article bodies and ticker matching

pub mod article;
pub mod rss;
pub mod universe;
pub mod urls;

pub use article::{ArticleFetcher, extract_text};
pub use rss::{RssCollector, google_news_feed, parse_feed};
pub use universe::{Universe, UniverseEntry};
pub use urls::{resolve_redirect, resolve_url};

use crate::config::SwingConfig;
use crate::error::Result;
use chrono::{DateTime, Utc};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Indian market feeds polled by default
pub const DEFAULT_FEEDS: &[&str] = &[
    "https://economictimes.indiatimes.com/markets/rssfeeds/1977021501.cms",
    "https://www.moneycontrol.com/rss/business.xml",
    "https://www.livemint.com/rss/markets",
    "https://www.business-standard.com/rss/markets-106.rss",
];

/// A headline with whatever metadata the feed carried
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published: Option<DateTime<Utc>>,
    pub summary: String,
    /// Extracted article text, when fetched
    pub body: Option<String>,
    /// Universe symbols the article mentions
    pub tickers: Vec<String>,
}

impl NewsArticle {
    /// Title and summary, the text used for matching and scoring
    pub fn headline_text(&self) -> String {
        if self.summary.is_empty() {
            self.title.clone()
        } else {
            format!("{}. {}", self.title, self.summary)
        }
    }
}

/// Lowercase alphanumerics only, for duplicate detection across outlets
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Shared HTTP client for news and search requests
pub fn http_client(config: &SwingConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(config.request_timeout())
        .user_agent(config.network.user_agent.clone())
        .build()?)
}

/// Request budget per host
#[derive(Clone)]
pub struct HostLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl HostLimiter {
    pub fn per_minute(requests: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Wait until `url`'s host may be hit again
    pub async fn wait(&self, url: &str) {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        self.limiter.until_key_ready(&host).await;
    }

    /// Forget hosts whose budget has fully replenished
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Hosts currently tracked
    pub fn tracked_hosts(&self) -> usize {
        self.limiter.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("Sensex jumps 500 pts; Nifty at 24,000!"),
            "sensexjumps500ptsniftyat24000"
        );
        assert_eq!(
            normalize_title("SENSEX jumps 500 pts, Nifty at 24000"),
            normalize_title("Sensex Jumps 500 Pts - Nifty At 24,000")
        );
    }

    #[test]
    fn test_headline_text() {
        let mut article = NewsArticle {
            title: "TCS wins deal".into(),
            url: String::new(),
            source: String::new(),
            published: None,
            summary: String::new(),
            body: None,
            tickers: Vec::new(),
        };
        assert_eq!(article.headline_text(), "TCS wins deal");
        article.summary = "Five-year contract".into();
        assert_eq!(article.headline_text(), "TCS wins deal. Five-year contract");
    }

    #[tokio::test]
    async fn test_host_limiter_allows_first_request() {
        let limiter = HostLimiter::per_minute(60);
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            limiter.wait("https://example.com/a"),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_host_limiter_prunes_idle_hosts() {
        let limiter = HostLimiter::per_minute(600_000);
        limiter.wait("https://economictimes.indiatimes.com/a").await;
        limiter.wait("https://www.livemint.com/b").await;
        assert_eq!(limiter.tracked_hosts(), 2);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        limiter.prune();
        assert_eq!(limiter.tracked_hosts(), 0);
    }
}

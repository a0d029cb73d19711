//! Web-search verification of news claims
//!
//! Concrete claims (rupee amounts, percentages, catalyst keywords) are pulled
//! out of the news summary and headlines, searched for, and checked against
//! the result snippets.

use crate::analysis::{Catalyst, NewsScore, detect_catalysts};
use crate::config::SwingConfig;
use crate::error::{Result, StockError};
use crate::news::resolve_url;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument, warn};

const DUCKDUCKGO_URL: &str = "https://html.duckduckgo.com/html/";

const CONTRADICTION_WORDS: &[&str] = &["denies", "fake", "rumour", "rumor", "clarifies", "no such"];

/// Relative tolerance when matching amounts
const AMOUNT_TOLERANCE: f64 = 0.05;
/// Absolute tolerance in percentage points
const PERCENT_TOLERANCE: f64 = 0.5;

static MONEY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:₹|\brs\.?|\binr)\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*(crores?|cr\b|lakhs?|billion|bn\b|million|mn\b)?",
    )
    .ok()
});

static PERCENT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*(?:%|per ?cent\b)").ok());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Scrapes the DuckDuckGo HTML endpoint
pub struct DuckDuckGoSearch {
    client: Client,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl DuckDuckGoSearch {
    pub fn new(client: Client, requests_per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            client,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

/// Result links point at a DuckDuckGo redirect carrying the target in `uddg`
fn unwrap_result_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    url::Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .map_or_else(|| resolve_url(&absolute), |target| resolve_url(&target))
}

/// Parse a DuckDuckGo HTML results page
pub fn parse_results(html: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let selector = |s: &str| {
        Selector::parse(s).map_err(|e| StockError::SearchError(format!("bad selector {s}: {e}")))
    };
    let result_sel = selector(".result")?;
    let link_sel = selector(".result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let document = Html::parse_document(html);
    let squash = |parts: Vec<&str>| parts.concat().split_whitespace().collect::<Vec<_>>().join(" ");

    let hits = document
        .select(&result_sel)
        .filter_map(|result| {
            let link = result.select(&link_sel).next()?;
            let href = link.value().attr("href")?;
            Some(SearchHit {
                title: squash(link.text().collect()),
                url: unwrap_result_link(href),
                snippet: result
                    .select(&snippet_sel)
                    .next()
                    .map(|s| squash(s.text().collect()))
                    .unwrap_or_default(),
            })
        })
        .take(limit)
        .collect();
    Ok(hits)
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.limiter.until_ready().await;
        let html = self
            .client
            .get(DUCKDUCKGO_URL)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let hits = parse_results(&html, limit)?;
        debug!(hits = hits.len(), "search done");
        Ok(hits)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClaimKind {
    /// Rupee amount in crore
    Amount { crore: f64 },
    Percent { value: f64 },
    Keyword { catalyst: Catalyst },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Text used in the search query
    pub text: String,
    pub kind: ClaimKind,
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

fn to_crore(value: f64, unit: Option<&str>) -> f64 {
    let unit = unit.map(str::to_ascii_lowercase);
    match unit.as_deref() {
        Some(u) if u.starts_with("cr") => value,
        Some(u) if u.starts_with("lakh") => value / 100.0,
        Some("billion" | "bn") => value * 100.0,
        Some("million" | "mn") => value / 10.0,
        _ => value / 1e7,
    }
}

/// Rupee amounts in `text`, in crore
pub fn amounts_in(text: &str) -> Vec<f64> {
    let Some(re) = MONEY_RE.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|c| {
            let value = parse_number(c.get(1)?.as_str())?;
            Some(to_crore(value, c.get(2).map(|m| m.as_str())))
        })
        .collect()
}

pub fn percents_in(text: &str) -> Vec<f64> {
    let Some(re) = PERCENT_RE.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|c| parse_number(c.get(1)?.as_str()))
        .collect()
}

/// Checkable claims in `text`, amounts first
pub fn extract_claims(text: &str) -> Vec<Claim> {
    let mut claims = Vec::new();

    if let Some(re) = MONEY_RE.as_ref() {
        for m in re.find_iter(text) {
            if let Some(&crore) = amounts_in(m.as_str()).first() {
                claims.push(Claim {
                    text: m.as_str().trim().to_string(),
                    kind: ClaimKind::Amount { crore },
                });
            }
        }
    }
    if let Some(re) = PERCENT_RE.as_ref() {
        for m in re.find_iter(text) {
            if let Some(&value) = percents_in(m.as_str()).first() {
                claims.push(Claim {
                    text: m.as_str().trim().to_string(),
                    kind: ClaimKind::Percent { value },
                });
            }
        }
    }
    for catalyst in detect_catalysts(text) {
        claims.push(Claim {
            text: catalyst.as_str().replace('_', " "),
            kind: ClaimKind::Keyword { catalyst },
        });
    }
    claims
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceOutcome {
    Verified,
    Contradicted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub claim: String,
    pub outcome: EvidenceOutcome,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Claims whose search succeeded
    pub checked: usize,
    pub verified: usize,
    pub contradicted: usize,
    /// `verified / checked`, 0 when nothing was checked
    pub ratio: f64,
    pub evidence: Vec<Evidence>,
}

/// Checks claims against web search results
pub struct WebVerifier {
    search: Arc<dyn SearchProvider>,
    max_results: usize,
    max_claims: usize,
}

impl WebVerifier {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self {
            search,
            max_results: 5,
            max_claims: 4,
        }
    }

    pub fn from_config(search: Arc<dyn SearchProvider>, config: &SwingConfig) -> Self {
        Self {
            search,
            max_results: config.verification.max_results.max(1),
            max_claims: config.verification.max_claims.max(1),
        }
    }

    /// Claims worth checking for a scored ticker, deduplicated
    pub fn claims_for(&self, news: &NewsScore, headlines: &[String]) -> Vec<Claim> {
        let mut claims: Vec<Claim> = Vec::new();
        for text in std::iter::once(&news.summary).chain(headlines) {
            for claim in extract_claims(text) {
                if !claims.iter().any(|c| c.kind == claim.kind) {
                    claims.push(claim);
                }
            }
        }
        claims.truncate(self.max_claims);
        claims
    }

    #[instrument(skip(self, claims), fields(claims = claims.len()))]
    pub async fn verify(&self, ticker: &str, company: &str, claims: &[Claim]) -> VerificationReport {
        let mut report = VerificationReport::default();
        let names = subject_names(ticker, company);

        for claim in claims {
            let query = format!("{company} {}", claim.text);
            let hits = match self.search.search(&query, self.max_results).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(ticker = %ticker, query = %query, error = %e, "Verification search failed");
                    continue;
                }
            };
            report.checked += 1;

            if let Some(evidence) = judge(claim, &names, &hits) {
                match evidence.outcome {
                    EvidenceOutcome::Verified => report.verified += 1,
                    EvidenceOutcome::Contradicted => report.contradicted += 1,
                }
                report.evidence.push(evidence);
            }
        }

        if report.checked > 0 {
            report.ratio = report.verified as f64 / report.checked as f64;
        }
        debug!(
            ticker = %ticker,
            checked = report.checked,
            verified = report.verified,
            contradicted = report.contradicted,
            "Verification finished"
        );
        report
    }
}

fn subject_names(ticker: &str, company: &str) -> Vec<String> {
    let mut names = vec![company.trim().to_lowercase()];
    let bare = crate::market::base_symbol(ticker).to_lowercase();
    if bare.len() >= 3 && !names.contains(&bare) {
        names.push(bare);
    }
    names.retain(|n| !n.is_empty());
    names
}

fn claim_supported(claim: &Claim, text: &str, mentions_subject: bool) -> bool {
    match &claim.kind {
        ClaimKind::Amount { crore } => amounts_in(text)
            .iter()
            .any(|a| (a - crore).abs() <= crore.abs() * AMOUNT_TOLERANCE),
        ClaimKind::Percent { value } => percents_in(text)
            .iter()
            .any(|p| (p - value).abs() <= PERCENT_TOLERANCE),
        ClaimKind::Keyword { catalyst } => mentions_subject && detect_catalysts(text).contains(catalyst),
    }
}

/// Contradictions outrank support within one claim's results
fn judge(claim: &Claim, names: &[String], hits: &[SearchHit]) -> Option<Evidence> {
    let mut support = None;
    for hit in hits {
        let text = format!("{} {}", hit.title, hit.snippet);
        let lower = text.to_lowercase();
        let mentions_subject = names.iter().any(|n| lower.contains(n.as_str()));

        if mentions_subject && CONTRADICTION_WORDS.iter().any(|w| lower.contains(w)) {
            return Some(Evidence {
                claim: claim.text.clone(),
                outcome: EvidenceOutcome::Contradicted,
                url: hit.url.clone(),
                snippet: hit.snippet.clone(),
            });
        }
        if support.is_none() && claim_supported(claim, &text, mentions_subject) {
            support = Some(Evidence {
                claim: claim.text.clone(),
                outcome: EvidenceOutcome::Verified,
                url: hit.url.clone(),
                snippet: hit.snippet.clone(),
            });
        }
    }
    support
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ScoreSource;
    use mockall::predicate::{always, eq};

    fn hit(title: &str, snippet: &str) -> SearchHit {
        SearchHit {
            title: title.into(),
            url: "https://news.example/a".into(),
            snippet: snippet.into(),
        }
    }

    #[test]
    fn test_amounts_normalised_to_crore() {
        let amounts = amounts_in("Order worth ₹2,500 crore, Rs. 75 lakh fine, INR 1.2 billion, Rs 30 mn");
        assert_eq!(amounts.len(), 4);
        assert!((amounts[0] - 2500.0).abs() < 1e-9);
        assert!((amounts[1] - 0.75).abs() < 1e-9);
        assert!((amounts[2] - 120.0).abs() < 1e-9);
        assert!((amounts[3] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_extract_claims() {
        let claims = extract_claims("L&T bags ₹2,500 crore order; Q4 profit jumps 18.5%");
        let kinds: Vec<&ClaimKind> = claims.iter().map(|c| &c.kind).collect();
        assert!(kinds.contains(&&ClaimKind::Amount { crore: 2500.0 }));
        assert!(kinds.contains(&&ClaimKind::Percent { value: 18.5 }));
        assert!(kinds.contains(&&ClaimKind::Keyword { catalyst: Catalyst::OrderWin }));
        assert_eq!(claims[0].text, "₹2,500 crore");
    }

    #[test]
    fn test_parse_results() {
        let html = r#"
            <div class="result">
              <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.livemint.com%2Fmarket%2Fstory.html&rut=x">L&amp;T   wins order</a>
              <a class="result__snippet">Larsen &amp; Toubro bagged a ₹2,500 crore order</a>
            </div>
            <div class="result">
              <a class="result__a" href="https://example.com/b">Second</a>
            </div>
            <div class="result"><a class="result__a" href="https://example.com/c">Third</a></div>"#;
        let hits = parse_results(html, 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "L&T wins order");
        assert_eq!(hits[0].url, "https://www.livemint.com/market/story.html");
        assert!(hits[0].snippet.contains("₹2,500 crore"));
        assert_eq!(hits[1].snippet, "");
    }

    #[tokio::test]
    async fn test_verify_counts_outcomes() {
        let mut search = MockSearchProvider::new();
        search
            .expect_search()
            .with(always(), eq(5))
            .returning(|query, _| {
                if query.contains("crore") {
                    Ok(vec![hit("L&T order", "Larsen & Toubro secures order worth Rs 2,450 cr")])
                } else if query.contains('%') {
                    Ok(vec![hit("Larsen & Toubro clarifies", "Larsen & Toubro clarifies report is speculative")])
                } else {
                    Err(StockError::SearchError("blocked".into()))
                }
            });

        let verifier = WebVerifier::new(Arc::new(search));
        let claims = extract_claims("L&T bags ₹2,500 crore order, profit up 18%");
        let report = verifier.verify("LT.NS", "Larsen & Toubro", &claims).await;

        // keyword search errored and is not counted
        assert_eq!(report.checked, 2);
        assert_eq!(report.verified, 1);
        assert_eq!(report.contradicted, 1);
        assert!((report.ratio - 0.5).abs() < 1e-9);
        assert_eq!(report.evidence.len(), 2);
    }

    #[tokio::test]
    async fn test_keyword_needs_company() {
        let mut search = MockSearchProvider::new();
        search
            .expect_search()
            .returning(|_, _| Ok(vec![hit("Peer bags order", "Some other firm wins order worth big")]));
        let verifier = WebVerifier::new(Arc::new(search));
        let claims = vec![Claim {
            text: "order win".into(),
            kind: ClaimKind::Keyword { catalyst: Catalyst::OrderWin },
        }];
        let report = verifier.verify("LT.NS", "Larsen & Toubro", &claims).await;
        assert_eq!(report.checked, 1);
        assert_eq!(report.verified, 0);
        assert!(report.ratio.abs() < f64::EPSILON);
    }

    #[test]
    fn test_claims_for_dedupes_and_caps() {
        let search = MockSearchProvider::new();
        let verifier = WebVerifier::new(Arc::new(search));
        let news = NewsScore {
            ticker: "LT.NS".into(),
            sentiment: 0.5,
            score: 70.0,
            catalysts: vec![],
            confidence: 70.0,
            summary: "Won ₹2,500 crore order".into(),
            source: ScoreSource::Ai("stub".into()),
            headline_count: 2,
        };
        let claims = verifier.claims_for(
            &news,
            &["L&T bags Rs 2500 crore order".into(), "Shares up 4%, buyback next; dividend too".into()],
        );
        assert_eq!(claims.len(), 4);
        assert_eq!(
            claims.iter().filter(|c| matches!(c.kind, ClaimKind::Amount { .. })).count(),
            1
        );
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_duckduckgo_live() {
        let search = DuckDuckGoSearch::new(Client::new(), 10);
        let hits = search.search("Reliance Industries results", 3).await.unwrap();
        assert!(!hits.is_empty());
    }
}

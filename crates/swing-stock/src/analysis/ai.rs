//! Model-backed news scoring
//!
//! Headlines (and a short excerpt of each fetched article) are sent through
//! the provider chain. Any failure, including an unparseable reply, falls
//! back to [`HeuristicScorer`] so a ticker always gets a score.

use super::catalyst::{merge_catalysts, parse_catalyst};
use super::{Catalyst, HeuristicScorer, NewsScore, ScoreSource};
use crate::error::{Result, StockError};
use crate::news::NewsArticle;
use crate::news::article::truncate_chars;
use crate::prompts::{NEWS_ANALYSIS, PromptSet};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use swing_llm::{ProviderChain, extract_json};
use tracing::{debug, instrument, warn};

const EXCERPT_CHARS: usize = 600;

#[derive(Serialize)]
struct ArticleVars<'a> {
    title: &'a str,
    source: &'a str,
    published: Option<String>,
    excerpt: &'a str,
}

#[derive(Serialize)]
struct NewsPromptVars<'a> {
    ticker: &'a str,
    company: Option<&'a str>,
    articles: Vec<ArticleVars<'a>>,
    catalysts: Vec<&'static str>,
}

/// Read a number the model may have sent as a JSON number or a string
pub(crate) fn number_field(value: &Value, key: &str) -> Option<f64> {
    let number = match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Scores a ticker's news with a model when one is configured
pub struct AiNewsAnalyzer {
    chain: Option<Arc<ProviderChain>>,
    heuristic: HeuristicScorer,
    prompts: Arc<PromptSet>,
    max_articles: usize,
}

impl AiNewsAnalyzer {
    pub fn new(chain: Option<Arc<ProviderChain>>, prompts: Arc<PromptSet>) -> Self {
        Self {
            chain: chain.filter(|c| !c.is_empty()),
            heuristic: HeuristicScorer::new(),
            prompts,
            max_articles: 8,
        }
    }

    /// Cap on articles included in a prompt
    pub fn with_max_articles(mut self, max_articles: usize) -> Self {
        self.max_articles = max_articles.max(1);
        self
    }

    pub fn has_ai(&self) -> bool {
        self.chain.is_some()
    }

    /// Score `articles` for `ticker`
    #[instrument(skip(self, company, articles), fields(articles = articles.len()))]
    pub async fn analyze(&self, ticker: &str, company: Option<&str>, articles: &[NewsArticle]) -> NewsScore {
        let articles = &articles[..articles.len().min(self.max_articles)];
        let headlines: Vec<String> = articles.iter().map(NewsArticle::headline_text).collect();

        let Some(chain) = &self.chain else {
            return self.heuristic.score(ticker, &headlines);
        };
        if articles.is_empty() {
            return self.heuristic.score(ticker, &headlines);
        }

        match self.ask(chain, ticker, company, articles).await {
            Ok(score) => score,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "AI news scoring failed, using heuristic");
                self.heuristic.score(ticker, &headlines)
            }
        }
    }

    async fn ask(
        &self,
        chain: &ProviderChain,
        ticker: &str,
        company: Option<&str>,
        articles: &[NewsArticle],
    ) -> Result<NewsScore> {
        let vars = NewsPromptVars {
            ticker,
            company,
            articles: articles
                .iter()
                .map(|a| ArticleVars {
                    title: &a.title,
                    source: &a.source,
                    published: a.published.map(|p| p.format("%Y-%m-%d %H:%M").to_string()),
                    excerpt: truncate_chars(a.body.as_deref().unwrap_or(&a.summary), EXCERPT_CHARS),
                })
                .collect(),
            catalysts: Catalyst::ALL.iter().map(Catalyst::as_str).collect(),
        };
        let prompt = self.prompts.render(NEWS_ANALYSIS, &vars)?;
        let reply = chain.complete_text(&prompt.system, &prompt.user).await?;
        debug!(ticker = %ticker, provider = %reply.provider, "AI reply received");

        parse_news_reply(ticker, &reply.text, &reply.provider, articles.len())
    }
}

/// Turn a model reply into a [`NewsScore`]
pub fn parse_news_reply(ticker: &str, text: &str, provider: &str, headline_count: usize) -> Result<NewsScore> {
    let json = extract_json(text)
        .ok_or_else(|| StockError::DataUnavailable {
            symbol: ticker.to_string(),
            reason: "model reply contained no JSON object".to_string(),
        })?;

    let score = number_field(&json, "score").ok_or_else(|| StockError::DataUnavailable {
        symbol: ticker.to_string(),
        reason: "model reply has no numeric score".to_string(),
    })?;
    let sentiment = number_field(&json, "sentiment").unwrap_or((score - 50.0) / 50.0);
    let confidence = number_field(&json, "confidence").unwrap_or(50.0);

    let mut catalysts = Vec::new();
    if let Some(labels) = json.get("catalysts").and_then(Value::as_array) {
        merge_catalysts(
            &mut catalysts,
            labels.iter().filter_map(Value::as_str).filter_map(parse_catalyst),
        );
    }

    Ok(NewsScore {
        ticker: ticker.to_string(),
        sentiment: sentiment.clamp(-1.0, 1.0),
        score: score.clamp(0.0, 100.0),
        catalysts,
        confidence: confidence.clamp(0.0, 100.0),
        summary: json
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        source: ScoreSource::Ai(provider.to_string()),
        headline_count,
    })
}

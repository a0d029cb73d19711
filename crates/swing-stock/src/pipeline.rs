//! End-to-end swing runs
//!
//! A run collects news once, evaluates every universe ticker once (prices,
//! indicators, news score, optional verification) and then ranks the
//! evaluations for each requested [`SwingPath`].

use crate::analysis::{
    AiNewsAnalyzer, ExitAnalyzer, ExitRecommendation, NewsScore, load_positions,
};
use crate::cache::CacheManager;
use crate::config::SwingConfig;
use crate::correction::{
    CorrectionAnalyzer, CorrectionDecision, CorrectionInput, CorrectionLevel, Fundamentals,
    MarketContext,
};
use crate::error::{Result, StockError};
use crate::indicators::{TechnicalSnapshot, technical_score};
use crate::learning::{FeedbackOutcome, LearningDb, NewRecommendation};
use crate::market::{MarketDataClient, PriceSource, base_symbol, normalize_symbol};
use crate::news::{
    ArticleFetcher, NewsArticle, RssCollector, Universe, UniverseEntry, google_news_feed,
    http_client,
};
use crate::prompts::PromptSet;
use crate::report::{Recommendation, ReportWriter};
use crate::verdict::{Verdict, VerdictEngine};
use crate::verify::{DuckDuckGoSearch, SearchProvider, WebVerifier};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use swing_llm::ProviderChain;
use tracing::{debug, info, instrument, warn};

/// Ranking strategy of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwingPath {
    /// Buy corrections that show reversal signs
    Rebound,
    /// Ride strength, skipping crashed names
    Momentum,
}

impl SwingPath {
    pub const ALL: [SwingPath; 2] = [SwingPath::Rebound, SwingPath::Momentum];

    pub fn as_str(&self) -> &'static str {
        match self {
            SwingPath::Rebound => "rebound",
            SwingPath::Momentum => "momentum",
        }
    }

    /// `(ai, technical)` blend weights
    pub fn weights(&self) -> (f64, f64) {
        match self {
            SwingPath::Rebound => (0.5, 0.5),
            SwingPath::Momentum => (0.4, 0.6),
        }
    }

    pub fn base_score(&self, ai_score: f64, technical_score: f64) -> f64 {
        let (w_ai, w_tech) = self.weights();
        (w_ai * ai_score + w_tech * technical_score).clamp(0.0, 100.0)
    }
}

impl fmt::Display for SwingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwingPath {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rebound" => Ok(SwingPath::Rebound),
            "momentum" => Ok(SwingPath::Momentum),
            other => Err(StockError::ConfigError(format!("unknown swing path '{other}'"))),
        }
    }
}

/// Path-independent findings for one ticker
#[derive(Debug, Clone, Serialize)]
pub struct TickerEvaluation {
    pub ticker: String,
    pub company: String,
    pub snapshot: TechnicalSnapshot,
    pub technical_score: f64,
    /// News score after any verdict adjustment
    pub news: NewsScore,
    pub verdict: Option<Verdict>,
    pub fundamentals: Fundamentals,
    pub headlines: Vec<String>,
}

/// A ticker scored for one path
#[derive(Debug, Clone, Serialize)]
pub struct TickerAnalysis {
    pub path: SwingPath,
    pub evaluation: TickerEvaluation,
    pub base_score: f64,
    pub correction: CorrectionDecision,
    pub learning_adjustment: f64,
    pub final_score: f64,
}

impl TickerAnalysis {
    fn to_row(&self, rank: usize) -> Recommendation {
        let eval = &self.evaluation;
        Recommendation {
            rank,
            ticker: eval.ticker.clone(),
            final_score: self.final_score,
            decision: self.correction.decision.as_str().to_string(),
            ai_score: eval.news.score,
            technical_score: eval.technical_score,
            correction_confidence: self.correction.adjusted_confidence,
            boost: self.correction.boost,
            learning_adjustment: self.learning_adjustment,
            verdict: eval
                .verdict
                .as_ref()
                .map_or_else(|| "-".to_string(), |v| v.status.to_string()),
            close: eval.snapshot.close,
            rsi: eval.snapshot.rsi,
            depth_pct: self.correction.depth_pct,
            catalysts: eval.news.catalyst_list(),
            source: eval.news.source.to_string(),
            summary: eval.news.summary.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub path: SwingPath,
    pub run_id: Option<i64>,
    pub analyzed: usize,
    pub skipped: usize,
    pub recommendations: Vec<Recommendation>,
    pub report: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExitSummary {
    pub recommendations: Vec<ExitRecommendation>,
    pub skipped: usize,
    pub report: PathBuf,
}

struct NewsCollectors {
    rss: RssCollector,
    articles: ArticleFetcher,
}

/// Builder for [`SwingPipeline`]
pub struct SwingPipelineBuilder {
    config: SwingConfig,
    universe: Universe,
    prices: Option<Arc<dyn PriceSource>>,
    chain: Option<Arc<ProviderChain>>,
    search: Option<Arc<dyn SearchProvider>>,
    learning: Option<LearningDb>,
    offline: bool,
}

impl SwingPipelineBuilder {
    /// Price source; defaults to Yahoo Finance
    pub fn prices(mut self, prices: Arc<dyn PriceSource>) -> Self {
        self.prices = Some(prices);
        self
    }

    pub fn provider_chain(mut self, chain: Option<ProviderChain>) -> Self {
        self.chain = chain.map(Arc::new);
        self
    }

    /// Search backend for verification; defaults to DuckDuckGo
    pub fn search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    /// Use an already opened learning database
    pub fn learning(mut self, db: LearningDb) -> Self {
        self.learning = Some(db);
        self
    }

    /// Skip all news fetching
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub async fn build(self) -> Result<SwingPipeline> {
        let config = self.config;
        config.validate()?;
        let caches = CacheManager::from_config(&config.cache);

        let prices = self
            .prices
            .unwrap_or_else(|| Arc::new(MarketDataClient::new(caches.prices.clone(), &config)));

        let client = if self.offline { None } else { Some(http_client(&config)?) };
        let news = client.as_ref().map(|client| NewsCollectors {
            rss: RssCollector::new(client.clone(), caches.news.clone(), &config),
            articles: ArticleFetcher::new(client.clone(), caches.articles.clone(), &config),
        });

        let verifier = if config.verification.enabled {
            let search = self.search.or_else(|| {
                client.as_ref().map(|c| {
                    Arc::new(DuckDuckGoSearch::new(c.clone(), config.verification.requests_per_minute))
                        as Arc<dyn SearchProvider>
                })
            });
            search.map(|s| WebVerifier::from_config(s, &config))
        } else {
            None
        };

        let learning = match self.learning {
            Some(db) => Some(db),
            None if config.learning.enabled => Some(LearningDb::open(&config.learning.db_url).await?),
            None => None,
        };

        let chain = if config.ai.enabled { self.chain } else { None };
        let provider_label = chain.as_ref().map(|c| c.provider_names().join(","));
        let prompts = Arc::new(PromptSet::new()?);

        info!(
            tickers = self.universe.len(),
            ai = provider_label.as_deref().unwrap_or("heuristic"),
            verification = verifier.is_some(),
            learning = learning.is_some(),
            "Pipeline ready"
        );

        Ok(SwingPipeline {
            analyzer: AiNewsAnalyzer::new(chain.clone(), prompts.clone())
                .with_max_articles(config.ai.max_articles),
            exits: ExitAnalyzer::new(chain, prompts),
            correction: CorrectionAnalyzer::new(config.correction.clone()),
            reports: ReportWriter::new(config.output.dir.clone()),
            verdicts: VerdictEngine::new(),
            universe: self.universe,
            prices,
            news,
            verifier,
            learning,
            provider_label,
            config,
        })
    }
}

/// Orchestrates collection, analysis, ranking and persistence
pub struct SwingPipeline {
    config: SwingConfig,
    universe: Universe,
    prices: Arc<dyn PriceSource>,
    news: Option<NewsCollectors>,
    analyzer: AiNewsAnalyzer,
    exits: ExitAnalyzer,
    correction: CorrectionAnalyzer,
    verifier: Option<WebVerifier>,
    verdicts: VerdictEngine,
    learning: Option<LearningDb>,
    reports: ReportWriter,
    provider_label: Option<String>,
}

impl SwingPipeline {
    pub fn builder(config: SwingConfig, universe: Universe) -> SwingPipelineBuilder {
        SwingPipelineBuilder {
            config,
            universe,
            prices: None,
            chain: None,
            search: None,
            learning: None,
            offline: false,
        }
    }

    pub fn config(&self) -> &SwingConfig {
        &self.config
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn learning(&self) -> Option<&LearningDb> {
        self.learning.as_ref()
    }

    /// Recent articles per symbol of `universe`, newest first, with bodies
    async fn gather_news(&self, universe: &Universe) -> HashMap<String, Vec<NewsArticle>> {
        let Some(news) = &self.news else {
            return HashMap::new();
        };

        let mut feeds = self.config.news.feeds.clone();
        if self.config.news.google_news {
            feeds.extend(
                universe
                    .entries()
                    .iter()
                    .map(|e| google_news_feed(&format!("{} share", e.name))),
            );
        }

        let articles = news.rss.collect(&feeds).await;
        let mut grouped = universe.group_by_ticker(articles);

        let limit = self.config.news.max_articles_per_ticker.max(1);
        for list in grouped.values_mut() {
            list.truncate(limit);
        }

        if self.config.news.fetch_bodies {
            let urls: HashSet<String> = grouped.values().flatten().map(|a| a.url.clone()).collect();
            let bodies = news.articles.fetch_many(urls.into_iter().collect()).await;
            for article in grouped.values_mut().flatten() {
                if let Some(body) = bodies.get(&article.url) {
                    article.body = Some(body.clone());
                }
            }
            debug!(bodies = bodies.len(), "Attached article bodies");
        }

        grouped
    }

    async fn market_context(&self) -> Option<MarketContext> {
        let benchmark = &self.config.market.benchmark;
        let context = async {
            let candles = self.prices.history(benchmark, self.config.market.history_range).await?;
            TechnicalSnapshot::compute(&candles)
        }
        .await;

        match context {
            Ok(snapshot) => {
                let ctx = MarketContext::from_snapshot(&snapshot);
                debug!(benchmark = %benchmark, trend = ?ctx.trend, "Market context");
                Some(ctx)
            }
            Err(e) => {
                warn!(benchmark = %benchmark, error = %e, "No market context");
                None
            }
        }
    }

    /// Prices, indicators, news score and verification for one ticker
    #[instrument(skip(self, entry, articles), fields(ticker = %entry.symbol))]
    pub async fn evaluate(&self, entry: &UniverseEntry, articles: &[NewsArticle]) -> Result<TickerEvaluation> {
        let candles = self
            .prices
            .history(&entry.symbol, self.config.market.history_range)
            .await?;
        let snapshot = TechnicalSnapshot::compute(&candles)?;
        let technical = technical_score(&snapshot);

        let mut news = self.analyzer.analyze(&entry.symbol, Some(&entry.name), articles).await;
        let headlines: Vec<String> = articles.iter().map(|a| a.title.clone()).collect();

        let mut verdict = None;
        if let Some(verifier) = &self.verifier {
            if news.headline_count > 0 {
                let claims = verifier.claims_for(&news, &headlines);
                let report = verifier.verify(&entry.symbol, &entry.name, &claims).await;
                let v = self.verdicts.reconcile(&news, &report);
                news.score = v.adjusted_score;
                news.confidence = v.adjusted_confidence;
                verdict = Some(v);
            }
        }

        Ok(TickerEvaluation {
            ticker: entry.symbol.clone(),
            company: entry.name.clone(),
            snapshot,
            technical_score: technical,
            news,
            verdict,
            fundamentals: entry.fundamentals,
            headlines,
        })
    }

    /// Score an evaluation for `path`
    pub fn score_path(
        &self,
        evaluation: &TickerEvaluation,
        path: SwingPath,
        market: Option<&MarketContext>,
        learning_adjustment: f64,
    ) -> TickerAnalysis {
        let base_score = path.base_score(evaluation.news.score, evaluation.technical_score);
        let correction = self.correction.analyze(&CorrectionInput {
            ticker: &evaluation.ticker,
            snapshot: &evaluation.snapshot,
            news: Some(&evaluation.news).filter(|n| n.headline_count > 0),
            fundamentals: &evaluation.fundamentals,
            market,
            base_score,
        });

        let path_score = match path {
            SwingPath::Rebound => correction.final_score,
            SwingPath::Momentum => base_score,
        };

        TickerAnalysis {
            path,
            evaluation: evaluation.clone(),
            base_score,
            final_score: (path_score + learning_adjustment).clamp(0.0, 100.0),
            correction,
            learning_adjustment,
        }
    }

    async fn learning_adjustment(&self, ticker: &str) -> f64 {
        let Some(db) = &self.learning else {
            return 0.0;
        };
        db.adjustment_for(ticker).await.unwrap_or_else(|e| {
            warn!(ticker = %ticker, error = %e, "Reliability lookup failed");
            0.0
        })
    }

    /// Run a single path
    pub async fn run(&self, path: SwingPath) -> Result<RunSummary> {
        self.run_paths(&[path])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StockError::NotFound(format!("{path} run summary")))
    }

    /// Run several paths over one shared collection and evaluation pass
    pub async fn run_paths(&self, paths: &[SwingPath]) -> Result<Vec<RunSummary>> {
        if self.universe.is_empty() {
            return Err(StockError::ConfigError("universe is empty".to_string()));
        }

        let news = self.gather_news(&self.universe).await;
        let market = self.market_context().await;

        let results: Vec<(String, Result<TickerEvaluation>)> = stream::iter(self.universe.entries())
            .map(|entry| {
                let articles = news.get(&entry.symbol).map_or(&[][..], Vec::as_slice);
                async move { (entry.symbol.clone(), self.evaluate(entry, articles).await) }
            })
            .buffer_unordered(self.config.market.concurrency.max(1))
            .collect()
            .await;

        let mut evaluations = Vec::new();
        let mut skipped = 0;
        for (ticker, result) in results {
            match result {
                Ok(evaluation) => evaluations.push(evaluation),
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "Skipping ticker");
                    skipped += 1;
                }
            }
        }
        info!(analyzed = evaluations.len(), skipped, "Evaluation finished");

        let mut adjustments = HashMap::new();
        for evaluation in &evaluations {
            let adj = self.learning_adjustment(&evaluation.ticker).await;
            adjustments.insert(evaluation.ticker.clone(), adj);
        }

        let mut summaries = Vec::new();
        for path in paths {
            let mut ranked: Vec<TickerAnalysis> = evaluations
                .iter()
                .map(|e| {
                    let adj = adjustments.get(&e.ticker).copied().unwrap_or(0.0);
                    self.score_path(e, *path, market.as_ref(), adj)
                })
                .filter(|a| !(*path == SwingPath::Momentum && a.correction.level == CorrectionLevel::Crash))
                .collect();

            ranked.sort_by(|a, b| {
                b.final_score
                    .total_cmp(&a.final_score)
                    .then_with(|| a.evaluation.ticker.cmp(&b.evaluation.ticker))
            });
            ranked.truncate(self.config.output.top_n);

            let rows: Vec<Recommendation> = ranked
                .iter()
                .enumerate()
                .map(|(i, analysis)| analysis.to_row(i + 1))
                .collect();
            let report = self.reports.write_recommendations(path.as_str(), &rows)?;

            let run_id = match &self.learning {
                Some(db) => {
                    let picks: Vec<NewRecommendation<'_>> = rows
                        .iter()
                        .map(|row| NewRecommendation {
                            ticker: &row.ticker,
                            rank: row.rank,
                            final_score: row.final_score,
                            decision: &row.decision,
                            entry_price: row.close,
                        })
                        .collect();
                    Some(
                        db.record_run(path.as_str(), self.provider_label.as_deref(), evaluations.len(), &picks)
                            .await?,
                    )
                }
                None => None,
            };

            info!(path = %path, picks = rows.len(), report = %report.display(), "Run complete");
            summaries.push(RunSummary {
                path: *path,
                run_id,
                analyzed: evaluations.len(),
                skipped,
                recommendations: rows,
                report,
            });
        }
        Ok(summaries)
    }

    fn entry_for(&self, symbol: &str) -> UniverseEntry {
        let symbol = normalize_symbol(symbol, &self.config.market.default_suffix);
        self.universe.get(&symbol).cloned().unwrap_or_else(|| {
            UniverseEntry::new(
                &symbol,
                base_symbol(&symbol),
                Vec::new(),
                &self.config.market.default_suffix,
            )
        })
    }

    /// Full decision for one symbol, in or out of the universe
    pub async fn analyze_ticker(&self, symbol: &str, path: SwingPath) -> Result<TickerAnalysis> {
        let entry = self.entry_for(symbol);
        let single = Universe::new(vec![entry.clone()]);
        let news = self.gather_news(&single).await;
        let articles = news.get(&entry.symbol).map_or(&[][..], Vec::as_slice);

        let market = self.market_context().await;
        let evaluation = self.evaluate(&entry, articles).await?;
        let adj = self.learning_adjustment(&entry.symbol).await;
        Ok(self.score_path(&evaluation, path, market.as_ref(), adj))
    }

    /// Hold/trim/exit advice for the positions in `positions_csv`
    pub async fn run_exits(&self, positions_csv: &Path) -> Result<ExitSummary> {
        let positions = load_positions(positions_csv, &self.config.market.default_suffix)?;
        let held = Universe::new(positions.iter().map(|p| self.entry_for(&p.ticker)).collect());
        let news = self.gather_news(&held).await;

        let mut recommendations = Vec::new();
        let mut skipped = 0;
        for position in &positions {
            let entry = self.entry_for(&position.ticker);
            let evaluation = async {
                let candles = self
                    .prices
                    .history(&position.ticker, self.config.market.history_range)
                    .await?;
                TechnicalSnapshot::compute(&candles)
            }
            .await;
            let snapshot = match evaluation {
                Ok(s) => s,
                Err(e) => {
                    warn!(ticker = %position.ticker, error = %e, "Skipping position");
                    skipped += 1;
                    continue;
                }
            };

            let articles = news.get(&position.ticker).map_or(&[][..], Vec::as_slice);
            let score = self.analyzer.analyze(&entry.symbol, Some(&entry.name), articles).await;
            let headlines: Vec<String> = articles.iter().map(|a| a.title.clone()).collect();
            let news_score = Some(&score).filter(|n| n.headline_count > 0);

            recommendations.push(
                self.exits
                    .evaluate(position, &snapshot, news_score, &headlines)
                    .await,
            );
        }

        recommendations.sort_by(|a, b| {
            b.urgency
                .total_cmp(&a.urgency)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        let report = self.reports.write_exits(&recommendations)?;
        Ok(ExitSummary {
            recommendations,
            skipped,
            report,
        })
    }

    /// Price each recommendation of `run_id` now and store the outcome
    ///
    /// Recommendations that already have feedback are left alone.
    pub async fn record_feedback(&self, run_id: i64, threshold_pct: Option<f64>) -> Result<Vec<FeedbackOutcome>> {
        let db = self
            .learning
            .as_ref()
            .ok_or_else(|| StockError::ConfigError("learning database is disabled".to_string()))?;
        let threshold = threshold_pct.unwrap_or(self.config.learning.success_threshold_pct);

        let recs = db.recommendations_for_run(run_id).await?;
        if recs.is_empty() {
            return Err(StockError::NotFound(format!("recommendations for run {run_id}")));
        }

        let mut outcomes = Vec::new();
        for rec in recs {
            if db.has_feedback(rec.id).await? {
                debug!(ticker = %rec.ticker, "Feedback already recorded");
                continue;
            }
            let close = match self.prices.latest_close(&rec.ticker).await {
                Ok(close) => close,
                Err(e) => {
                    warn!(ticker = %rec.ticker, error = %e, "No current price, skipping");
                    continue;
                }
            };
            outcomes.push(db.record_feedback(rec.id, close, threshold).await?);
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ExitAction;
    use crate::indicators::tests::candles_from_closes;
    use crate::market::{Candle, HistoryRange};
    use async_trait::async_trait;

    struct FixturePrices(HashMap<String, Vec<Candle>>);

    #[async_trait]
    impl PriceSource for FixturePrices {
        async fn history(&self, symbol: &str, _range: HistoryRange) -> Result<Vec<Candle>> {
            self.0.get(symbol).cloned().ok_or_else(|| StockError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "not in fixture".to_string(),
            })
        }
    }

    fn fixture() -> Arc<FixturePrices> {
        let up: Vec<f64> = (0..80).map(|i| 100.0 + f64::from(i)).collect();
        let dip: Vec<f64> = (0..60)
            .map(|i| 100.0 + f64::from(i))
            .chain((0..20).map(|i| 159.0 - 1.15 * f64::from(i + 1)))
            .collect();
        let crash: Vec<f64> = (0..60)
            .map(|i| 100.0 + f64::from(i) * 100.0 / 59.0)
            .chain((0..20).map(|i| 200.0 - 4.5 * f64::from(i + 1)))
            .collect();
        let index: Vec<f64> = (0..80).map(|i| 20_000.0 + 10.0 * f64::from(i)).collect();

        let mut map = HashMap::new();
        map.insert("UP.NS".to_string(), candles_from_closes(&up, 1_000_000));
        map.insert("DIP.NS".to_string(), candles_from_closes(&dip, 1_000_000));
        map.insert("CRASH.NS".to_string(), candles_from_closes(&crash, 1_000_000));
        map.insert("^NSEI".to_string(), candles_from_closes(&index, 1_000_000));
        Arc::new(FixturePrices(map))
    }

    fn universe() -> Universe {
        let csv = "symbol,name,aliases\nUP,Uptrend Industries,\nDIP,Dip Corp,\nCRASH,Crash Ltd,\nMISSING,Missing Co,\n";
        Universe::from_reader(csv.as_bytes(), ".NS").unwrap()
    }

    async fn pipeline(dir: &Path) -> SwingPipeline {
        let mut config = SwingConfig::builder()
            .ai_enabled(false)
            .output_dir(dir)
            .build()
            .unwrap();
        config.learning.enabled = false;

        SwingPipeline::builder(config, universe())
            .prices(fixture())
            .learning(LearningDb::open("sqlite::memory:").await.unwrap())
            .offline()
            .build()
            .await
            .unwrap()
    }

    #[test]
    fn test_path_weights() {
        assert!((SwingPath::Rebound.base_score(80.0, 60.0) - 70.0).abs() < 1e-9);
        assert!((SwingPath::Momentum.base_score(80.0, 60.0) - 68.0).abs() < 1e-9);
        assert_eq!("Momentum".parse::<SwingPath>().unwrap(), SwingPath::Momentum);
        assert!("sideways".parse::<SwingPath>().is_err());
    }

    #[tokio::test]
    async fn test_run_ranks_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;

        let summary = pipeline.run(SwingPath::Rebound).await.unwrap();
        assert_eq!(summary.analyzed, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.recommendations.len(), 3);
        assert!(summary.report.exists());

        let ranks: Vec<usize> = summary.recommendations.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert!(
            summary
                .recommendations
                .windows(2)
                .all(|w| w[0].final_score >= w[1].final_score)
        );

        let crash = summary.recommendations.iter().find(|r| r.ticker == "CRASH.NS").unwrap();
        assert_eq!(crash.decision, "AVOID");
        assert!(crash.final_score <= 40.0);

        let db = pipeline.learning().unwrap();
        let run_id = summary.run_id.unwrap();
        assert_eq!(db.recommendations_for_run(run_id).await.unwrap().len(), 3);
        assert_eq!(db.recent_runs(1).await.unwrap()[0].tickers_analyzed, 3);
    }

    #[tokio::test]
    async fn test_momentum_drops_crashes() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;

        let summaries = pipeline.run_paths(&SwingPath::ALL).await.unwrap();
        assert_eq!(summaries.len(), 2);
        let momentum = &summaries[1];
        assert_eq!(momentum.path, SwingPath::Momentum);
        assert!(momentum.recommendations.iter().all(|r| r.ticker != "CRASH.NS"));
        assert_eq!(momentum.recommendations[0].ticker, "UP.NS");
        assert_ne!(summaries[0].run_id, momentum.run_id);
    }

    #[tokio::test]
    async fn test_top_n_limits_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SwingConfig::builder().ai_enabled(false).output_dir(dir.path()).top_n(1).build().unwrap();
        config.learning.enabled = false;
        let pipeline = SwingPipeline::builder(config, universe())
            .prices(fixture())
            .offline()
            .build()
            .await
            .unwrap();

        let summary = pipeline.run(SwingPath::Momentum).await.unwrap();
        assert_eq!(summary.recommendations.len(), 1);
        assert!(summary.run_id.is_none());
    }

    #[tokio::test]
    async fn test_analyze_ticker() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;

        let analysis = pipeline.analyze_ticker("dip", SwingPath::Rebound).await.unwrap();
        assert_eq!(analysis.evaluation.ticker, "DIP.NS");
        assert_eq!(analysis.correction.level, CorrectionLevel::Moderate);
        assert!(serde_json::to_string(&analysis).unwrap().contains("\"path\":\"rebound\""));

        assert!(pipeline.analyze_ticker("MISSING", SwingPath::Rebound).await.is_err());
    }

    #[tokio::test]
    async fn test_feedback_round() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;
        let summary = pipeline.run(SwingPath::Rebound).await.unwrap();
        let run_id = summary.run_id.unwrap();

        let outcomes = pipeline.record_feedback(run_id, Some(2.0)).await.unwrap();
        assert_eq!(outcomes.len(), 3);
        // fixture prices do not move
        assert!(outcomes.iter().all(|o| !o.success && o.return_pct.abs() < 1e-9));

        assert!(pipeline.record_feedback(run_id, None).await.unwrap().is_empty());
        assert!(matches!(
            pipeline.record_feedback(run_id + 100, None).await,
            Err(StockError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_run_exits() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path()).await;
        let positions = dir.path().join("positions.csv");
        std::fs::write(
            &positions,
            "ticker,entry_price,quantity,entry_date,stop_loss,target\n\
             UP,150,10,2024-02-01,,\n\
             MISSING,50,5,2024-02-01,,\n",
        )
        .unwrap();

        let summary = pipeline.run_exits(&positions).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.recommendations.len(), 1);
        let rec = &summary.recommendations[0];
        assert_eq!(rec.ticker, "UP.NS");
        assert_eq!(rec.action, ExitAction::Trim);
        assert!(summary.report.exists());
    }

    #[tokio::test]
    async fn test_failed_report_leaves_no_run() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let mut config = SwingConfig::builder().ai_enabled(false).output_dir(&blocker).build().unwrap();
        config.learning.enabled = false;
        let pipeline = SwingPipeline::builder(config, universe())
            .prices(fixture())
            .learning(LearningDb::open("sqlite::memory:").await.unwrap())
            .offline()
            .build()
            .await
            .unwrap();

        assert!(pipeline.run_paths(&SwingPath::ALL).await.is_err());
        let runs = pipeline.learning().unwrap().recent_runs(10).await.unwrap();
        assert!(runs.is_empty(), "unexpected runs: {runs:?}");
    }

    #[tokio::test]
    async fn test_empty_universe_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SwingConfig::builder().ai_enabled(false).output_dir(dir.path()).build().unwrap();
        config.learning.enabled = false;
        let pipeline = SwingPipeline::builder(config, Universe::default())
            .prices(fixture())
            .offline()
            .build()
            .await
            .unwrap();
        assert!(matches!(
            pipeline.run(SwingPath::Rebound).await,
            Err(StockError::ConfigError(_))
        ));
    }
}

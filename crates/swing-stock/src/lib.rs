//! Swing-trade screening for NSE/BSE equities
//!
//! This crate turns market news and daily prices into a ranked list of swing
//! candidates. It includes:
//!
//! - Price history from Yahoo Finance with caching and retries
//! - A technical snapshot (RSI, SMAs, Bollinger Bands, MACD, ATR, ranges)
//! - News collection from RSS feeds, URL clean-up and article extraction
//! - News scoring by a language model with a keyword heuristic fallback
//! - A correction analyzer that scores rebound setups and filters risk
//! - Optional web-search verification of news claims
//! - A SQLite learning layer that tracks how past picks worked out
//! - CSV reports and console tables
//!
//! # Architecture
//!
//! [`SwingPipeline`] wires the pieces together:
//!
//! ```text
//! universe -> feeds -> per-ticker news -> AI / heuristic score
//!          -> prices -> snapshot -> correction analyzer
//!          -> verification -> learning adjustment -> ranking -> CSV + DB
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use swing_stock::{SwingConfig, SwingPath, SwingPipeline, Universe, provider_chain};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SwingConfig::load(None)?;
//!     let universe = Universe::load(&config.market.universe, &config.market.default_suffix)?;
//!
//!     let pipeline = SwingPipeline::builder(config.clone(), universe)
//!         .provider_chain(provider_chain(&config))
//!         .build()
//!         .await?;
//!
//!     let summary = pipeline.run(SwingPath::Rebound).await?;
//!     println!("{}", swing_stock::report::recommendations_table(&summary.recommendations));
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod cache;
pub mod config;
pub mod correction;
pub mod error;
pub mod indicators;
pub mod learning;
pub mod llm;
pub mod market;
pub mod news;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod verdict;
pub mod verify;

// Re-export main types for convenience
pub use analysis::{
    AiNewsAnalyzer, Catalyst, ExitAction, ExitAnalyzer, ExitRecommendation, HeuristicScorer,
    NewsScore, Position, ScoreSource,
};
pub use cache::{CacheManager, StockCache};
pub use config::{ProviderKind, SwingConfig};
pub use correction::{CorrectionAnalyzer, CorrectionDecision, CorrectionLevel, Decision};
pub use error::{Result, StockError};
pub use indicators::{TechnicalSnapshot, technical_score};
pub use learning::{LearningDb, TickerStats};
pub use llm::provider_chain;
pub use market::{Candle, HistoryRange, MarketDataClient, PriceSource};
pub use news::{NewsArticle, Universe};
pub use pipeline::{RunSummary, SwingPath, SwingPipeline, TickerAnalysis};
pub use report::Recommendation;
pub use verdict::{Verdict, VerdictEngine, VerdictStatus};
pub use verify::{SearchProvider, VerificationReport, WebVerifier};

//! News and position analysis
//!
//! - [`heuristic`]: lexicon and keyword scoring, always available
//! - [`ai`]: model-backed news scoring that falls back to the heuristic
//! - [`exit`]: hold/trim/exit decisions for open positions

pub mod ai;
pub mod catalyst;
pub mod exit;
pub mod heuristic;

pub use ai::AiNewsAnalyzer;
pub use catalyst::{Catalyst, detect_catalysts, parse_catalyst};
pub use exit::{ExitAction, ExitAnalyzer, ExitRecommendation, Position, load_positions};
pub use heuristic::HeuristicScorer;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// A language model, named by provider
    Ai(String),
    Heuristic,
}

impl fmt::Display for ScoreSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreSource::Ai(provider) => write!(f, "ai:{provider}"),
            ScoreSource::Heuristic => f.write_str("heuristic"),
        }
    }
}

/// News assessment for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsScore {
    pub ticker: String,
    /// -1.0 (very negative) to 1.0 (very positive)
    pub sentiment: f64,
    /// 0-100, 50 is neutral
    pub score: f64,
    pub catalysts: Vec<Catalyst>,
    /// 0-100
    pub confidence: f64,
    pub summary: String,
    pub source: ScoreSource,
    pub headline_count: usize,
}

impl NewsScore {
    pub fn has_severe_catalyst(&self) -> bool {
        self.catalysts.iter().any(Catalyst::is_severe)
    }

    /// `;`-joined catalyst names for reports
    pub fn catalyst_list(&self) -> String {
        self.catalysts
            .iter()
            .map(Catalyst::as_str)
            .collect::<Vec<_>>()
            .join(";")
    }
}

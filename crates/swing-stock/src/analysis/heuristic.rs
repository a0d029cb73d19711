//! Keyword and lexicon news scoring

use super::catalyst::{detect_catalysts, merge_catalysts};
use super::{NewsScore, ScoreSource};
use std::collections::HashSet;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "rallies", "surge", "surges", "soars", "jumps", "gain", "gains",
    "profit", "growth", "beat", "beats", "upgrade", "upgraded", "outperform", "strong",
    "positive", "rise", "rises", "record", "high", "buy", "wins", "bags", "secures",
    "dividend", "buyback", "upside", "recovery", "rebound", "rebounds", "expansion",
    "robust", "accelerating", "overweight", "raised", "approval", "order", "orders",
    "boost", "boosts", "momentum", "tailwind", "optimistic", "healthy",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "declines", "loss", "losses", "fall", "falls", "plunge",
    "plunges", "crash", "slump", "slumps", "miss", "misses", "downgrade", "downgraded",
    "underperform", "weak", "negative", "drop", "drops", "concern", "concerns", "risk",
    "fail", "fails", "disappoint", "disappoints", "sell", "warning", "low", "fear",
    "probe", "penalty", "fraud", "scam", "default", "defaults", "insolvency", "pledge",
    "raid", "lawsuit", "litigation", "resigns", "headwind", "underweight", "lowered",
    "suspended", "slashes", "cut", "cuts",
];

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't", "wasn't",
    "weren't", "won't", "hardly", "without", "fails", "unable",
];

const NEGATION_WINDOW: usize = 3;

/// Headline scorer that needs no network access
pub struct HeuristicScorer {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negation: HashSet<&'static str>,
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicScorer {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negation: NEGATION_WORDS.iter().copied().collect(),
        }
    }

    /// Sentiment of a single headline in [-1, 1]
    pub fn headline_sentiment(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!' | '?' | ':' | '(' | ')' | '"'))
            .filter(|w| !w.is_empty())
            .collect();

        let negations: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| self.negation.contains(*w))
            .map(|(i, _)| i)
            .collect();

        let (mut pos, mut neg) = (0_u32, 0_u32);
        for (i, word) in words.iter().enumerate() {
            let is_pos = self.positive.contains(*word);
            let is_neg = self.negative.contains(*word);
            if !is_pos && !is_neg {
                continue;
            }
            let negated = negations.iter().any(|&n| n < i && i - n <= NEGATION_WINDOW);
            if is_pos != negated {
                pos += 1;
            } else {
                neg += 1;
            }
        }

        if pos + neg == 0 {
            0.0
        } else {
            (f64::from(pos) - f64::from(neg)) / f64::from(pos + neg)
        }
    }

    /// Score a ticker's headlines
    pub fn score(&self, ticker: &str, headlines: &[String]) -> NewsScore {
        let headline_count = headlines.len();
        let sentiment = if headlines.is_empty() {
            0.0
        } else {
            headlines.iter().map(|h| self.headline_sentiment(h)).sum::<f64>() / headline_count as f64
        };

        let mut catalysts = Vec::new();
        for headline in headlines {
            merge_catalysts(&mut catalysts, detect_catalysts(headline));
        }

        let weight_sum: f64 = catalysts.iter().map(|c| c.weight()).sum();
        let score = (50.0 + sentiment * 35.0 + weight_sum / 2.0).clamp(0.0, 100.0);
        let confidence = (30.0 + 10.0 * headline_count as f64 + 5.0 * catalysts.len() as f64).min(90.0);

        let summary = if headlines.is_empty() {
            "No recent headlines".to_string()
        } else if catalysts.is_empty() {
            format!("{headline_count} headlines, sentiment {sentiment:+.2}")
        } else {
            let names: Vec<&str> = catalysts.iter().map(|c| c.as_str()).collect();
            format!(
                "{headline_count} headlines, sentiment {sentiment:+.2}; catalysts: {}",
                names.join(", ")
            )
        };

        NewsScore {
            ticker: ticker.to_string(),
            sentiment,
            score,
            catalysts,
            confidence,
            summary,
            source: ScoreSource::Heuristic,
            headline_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Catalyst;

    #[test]
    fn test_headline_sentiment() {
        let scorer = HeuristicScorer::new();
        assert!((scorer.headline_sentiment("Shares surge on strong growth") - 1.0).abs() < 1e-9);
        assert!((scorer.headline_sentiment("Stock plunges after weak quarter") + 1.0).abs() < 1e-9);
        assert!(scorer.headline_sentiment("Board meeting on Friday").abs() < 1e-9);
    }

    #[test]
    fn test_negation_flips_polarity() {
        let scorer = HeuristicScorer::new();
        assert!(scorer.headline_sentiment("Results not strong this quarter") < 0.0);
        assert!(scorer.headline_sentiment("Management sees no concern on margins") > 0.0);
    }

    #[test]
    fn test_score_formula() {
        let scorer = HeuristicScorer::new();
        let headlines = vec![
            "L&T bags order worth ₹2,500 crore".to_string(),
            "Board meeting on Friday".to_string(),
        ];
        let result = scorer.score("LT.NS", &headlines);

        // "bags" and "order" positive: headline 1 = 1.0, headline 2 = 0.0
        assert!((result.sentiment - 0.5).abs() < 1e-9);
        assert_eq!(result.catalysts, vec![Catalyst::OrderWin]);
        // 50 + 0.5*35 + 12/2
        assert!((result.score - 73.5).abs() < 1e-9);
        // 30 + 10*2 + 5*1
        assert!((result.confidence - 55.0).abs() < 1e-9);
        assert_eq!(result.source, ScoreSource::Heuristic);
        assert!(result.summary.contains("order_win"));
    }

    #[test]
    fn test_confidence_capped() {
        let scorer = HeuristicScorer::new();
        let headlines: Vec<String> = (0..10).map(|i| format!("Headline {i}")).collect();
        assert!((scorer.score("X.NS", &headlines).confidence - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_headlines_neutral() {
        let result = HeuristicScorer::new().score("X.NS", &[]);
        assert!((result.score - 50.0).abs() < 1e-9);
        assert_eq!(result.headline_count, 0);
        assert_eq!(result.summary, "No recent headlines");
    }

    #[test]
    fn test_fraud_drags_score_down() {
        let scorer = HeuristicScorer::new();
        let result = scorer.score("X.NS", &["Auditor flags fraud, stock crash".to_string()]);
        assert!(result.score < 30.0);
        assert!(result.has_severe_catalyst());
    }
}

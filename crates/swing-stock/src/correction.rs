//! Correction analyzer
//!
//! Decides whether a stock that has pulled back from its recent high is
//! worth buying for a rebound. Nine stages feed one [`CorrectionDecision`]:
//!
//! 1. correction depth and level
//! 2. reversal confirmation (six candle/indicator signals)
//! 3. oversold score
//! 4. fundamental score (reported ratios, or a trend proxy)
//! 5. catalyst score from the news assessment
//! 6. weighted confidence blend
//! 7. risk filters (hard rejects and soft penalties)
//! 8. market context adjustment from the benchmark index
//! 9. boost applied to the caller's base score

use crate::analysis::NewsScore;
use crate::config::CorrectionConfig;
use crate::indicators::TechnicalSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far price has fallen from its 60-bar high
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionLevel {
    None,
    Mild,
    Moderate,
    Deep,
    Crash,
}

impl CorrectionLevel {
    /// Attractiveness of the pullback itself; crashes score below deep
    /// corrections because they often keep falling
    pub fn score(&self) -> f64 {
        match self {
            CorrectionLevel::None => 0.0,
            CorrectionLevel::Mild => 40.0,
            CorrectionLevel::Moderate => 70.0,
            CorrectionLevel::Deep => 85.0,
            CorrectionLevel::Crash => 60.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionLevel::None => "none",
            CorrectionLevel::Mild => "mild",
            CorrectionLevel::Moderate => "moderate",
            CorrectionLevel::Deep => "deep",
            CorrectionLevel::Crash => "crash",
        }
    }
}

impl fmt::Display for CorrectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reported valuation and balance-sheet figures, all optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub pe: Option<f64>,
    pub debt_to_equity: Option<f64>,
    /// Return on equity, percent
    pub roe: Option<f64>,
    /// Year-on-year earnings growth, percent
    pub earnings_growth: Option<f64>,
}

impl Fundamentals {
    pub fn is_empty(&self) -> bool {
        self.pe.is_none()
            && self.debt_to_equity.is_none()
            && self.roe.is_none()
            && self.earnings_growth.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketTrend {
    Bullish,
    Neutral,
    Bearish,
}

/// Benchmark index state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub trend: MarketTrend,
    pub index_depth_pct: f64,
    pub index_return_5d: f64,
}

impl MarketContext {
    /// Derive context from the benchmark's snapshot
    pub fn from_snapshot(index: &TechnicalSnapshot) -> Self {
        let above_long = index.sma200.is_none_or(|sma| index.close > sma);
        let below_long = index.sma200.is_none_or(|sma| index.close < sma);
        let trend = if index.close > index.sma50 && above_long {
            MarketTrend::Bullish
        } else if index.close < index.sma50 && below_long {
            MarketTrend::Bearish
        } else {
            MarketTrend::Neutral
        };

        Self {
            trend,
            index_depth_pct: index.depth_pct(),
            index_return_5d: index.return_5d,
        }
    }
}

/// The six reversal signals checked on the latest bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalSignals {
    pub candle_pattern: bool,
    pub above_sma5: bool,
    pub higher_low: bool,
    pub rsi_rising: bool,
    pub volume_backed: bool,
    pub macd_rising: bool,
}

impl ReversalSignals {
    pub const TOTAL: usize = 6;

    pub fn count(&self) -> usize {
        [
            self.candle_pattern,
            self.above_sma5,
            self.higher_low,
            self.rsi_rising,
            self.volume_backed,
            self.macd_rising,
        ]
        .iter()
        .filter(|s| **s)
        .count()
    }

    pub fn score(&self) -> f64 {
        self.count() as f64 / Self::TOTAL as f64 * 100.0
    }
}

/// Outcome of the risk filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub passed: bool,
    pub rejections: Vec<String>,
    pub penalties: Vec<String>,
    pub total_penalty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundamentalBasis {
    Reported,
    TrendProxy,
}

/// Final call on a ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    StrongRebound,
    Rebound,
    Watch,
    Avoid,
    NoCorrection,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::StrongRebound => "STRONG_REBOUND",
            Decision::Rebound => "REBOUND",
            Decision::Watch => "WATCH",
            Decision::Avoid => "AVOID",
            Decision::NoCorrection => "NO_CORRECTION",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the analyzer looks at for one ticker
#[derive(Debug, Clone, Copy)]
pub struct CorrectionInput<'a> {
    pub ticker: &'a str,
    pub snapshot: &'a TechnicalSnapshot,
    pub news: Option<&'a NewsScore>,
    pub fundamentals: &'a Fundamentals,
    pub market: Option<&'a MarketContext>,
    /// Score from the caller's ranking path, adjusted by the boost
    pub base_score: f64,
}

/// Structured result of the correction analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionDecision {
    pub ticker: String,
    pub level: CorrectionLevel,
    pub depth_pct: f64,
    pub correction_score: f64,
    pub reversal: ReversalSignals,
    pub reversal_score: f64,
    pub reversal_confirmed: bool,
    pub oversold_score: f64,
    pub fundamental_score: f64,
    pub fundamental_basis: FundamentalBasis,
    pub catalyst_score: f64,
    pub confidence: f64,
    pub risk: RiskAssessment,
    pub market_adjustment: f64,
    pub adjusted_confidence: f64,
    pub boost: f64,
    pub base_score: f64,
    pub final_score: f64,
    pub decision: Decision,
    pub reasons: Vec<String>,
}

/// Hammer: small body near the top of the range with a long lower wick
pub fn is_hammer(c: &crate::market::Candle) -> bool {
    let range = c.range();
    if range <= 0.0 {
        return false;
    }
    let body = c.body();
    body <= range * 0.35 && c.lower_wick() >= body * 2.0 && c.upper_wick() <= body
}

/// Bullish engulfing: a green bar whose body covers the previous red body
pub fn is_bullish_engulfing(prior: &crate::market::Candle, last: &crate::market::Candle) -> bool {
    prior.is_bearish() && last.is_bullish() && last.open <= prior.close && last.close >= prior.open
}

pub struct CorrectionAnalyzer {
    config: CorrectionConfig,
}

impl Default for CorrectionAnalyzer {
    fn default() -> Self {
        Self::new(CorrectionConfig::default())
    }
}

impl CorrectionAnalyzer {
    pub fn new(config: CorrectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    /// Stage 1
    pub fn detect_level(&self, depth_pct: f64) -> CorrectionLevel {
        let c = &self.config;
        if depth_pct < c.mild_pct {
            CorrectionLevel::None
        } else if depth_pct < c.moderate_pct {
            CorrectionLevel::Mild
        } else if depth_pct < c.deep_pct {
            CorrectionLevel::Moderate
        } else if depth_pct < c.crash_pct {
            CorrectionLevel::Deep
        } else {
            CorrectionLevel::Crash
        }
    }

    /// Stage 2
    pub fn reversal_signals(&self, s: &TechnicalSnapshot) -> ReversalSignals {
        let last = &s.last_candle;
        ReversalSignals {
            candle_pattern: is_hammer(last) || is_bullish_engulfing(&s.prior_candle, last),
            above_sma5: s.close > s.sma5,
            higher_low: last.low > s.min_low_prev5,
            rsi_rising: s.rsi > s.rsi_prev3,
            volume_backed: s.volume_ratio >= 1.5 && last.close > last.open,
            macd_rising: s.macd_hist > s.macd_hist_prev,
        }
    }

    /// Stage 3
    pub fn oversold_score(&self, s: &TechnicalSnapshot) -> f64 {
        let mut score = 0.0;

        if s.rsi < 25.0 {
            score += 40.0;
        } else if s.rsi < 30.0 {
            score += 30.0;
        } else if s.rsi < 40.0 {
            score += 15.0;
        }

        if s.close < s.bb_lower {
            score += 30.0;
        } else if s.bb_percent < 0.2 {
            score += 20.0;
        }

        if s.sma50 > 0.0 {
            let below_sma50 = (s.sma50 - s.close) / s.sma50 * 100.0;
            if below_sma50 > 10.0 {
                score += 20.0;
            } else if below_sma50 > 5.0 {
                score += 10.0;
            }
        }

        if s.return_5d < -8.0 {
            score += 10.0;
        }

        f64::min(score, 100.0)
    }

    /// Stage 4
    pub fn fundamental_score(
        &self,
        f: &Fundamentals,
        s: &TechnicalSnapshot,
    ) -> (f64, FundamentalBasis) {
        let mut score = 50.0;

        if f.is_empty() {
            if let Some(sma200) = s.sma200 {
                if s.close > sma200 {
                    score += 15.0;
                }
                if s.sma50 > sma200 {
                    score += 10.0;
                }
            }
            if s.high_252 > 0.0 && s.close >= s.high_252 * 0.75 {
                score += 5.0;
            }
            return (f64::clamp(score, 0.0, 100.0), FundamentalBasis::TrendProxy);
        }

        if let Some(pe) = f.pe {
            if pe > 0.0 && pe < 25.0 {
                score += 10.0;
            } else if pe > 60.0 {
                score -= 10.0;
            }
        }
        if let Some(de) = f.debt_to_equity {
            if de < 0.5 {
                score += 10.0;
            } else if de > 2.0 {
                score -= 15.0;
            }
        }
        if let Some(roe) = f.roe {
            if roe > 15.0 {
                score += 10.0;
            } else if roe < 5.0 {
                score -= 5.0;
            }
        }
        if let Some(growth) = f.earnings_growth {
            if growth > 15.0 {
                score += 10.0;
            } else if growth < 0.0 {
                score -= 10.0;
            }
        }

        (f64::clamp(score, 0.0, 100.0), FundamentalBasis::Reported)
    }

    /// Stage 5
    pub fn catalyst_score(&self, news: Option<&NewsScore>) -> f64 {
        let Some(news) = news else {
            return 50.0;
        };
        let weights: f64 = news.catalysts.iter().map(|c| c.weight()).sum();
        f64::clamp(50.0 + news.sentiment * 30.0 + weights, 0.0, 100.0)
    }

    /// Stage 7
    pub fn assess_risk(
        &self,
        s: &TechnicalSnapshot,
        level: CorrectionLevel,
        reversal_confirmed: bool,
        news: Option<&NewsScore>,
    ) -> RiskAssessment {
        let c = &self.config;
        let mut risk = RiskAssessment::default();

        if s.close < c.min_price {
            risk.rejections
                .push(format!("price ₹{:.2} below minimum ₹{:.0}", s.close, c.min_price));
        }
        let turnover = s.turnover();
        if turnover < c.min_turnover {
            risk.rejections.push(format!(
                "turnover ₹{:.1} cr below minimum ₹{:.1} cr",
                turnover / 1e7,
                c.min_turnover / 1e7
            ));
        }
        if level == CorrectionLevel::Crash && !reversal_confirmed {
            risk.rejections
                .push("falling knife: crash without reversal confirmation".to_string());
        }
        if let Some(news) = news {
            for catalyst in news.catalysts.iter().filter(|c| c.is_severe()) {
                risk.rejections
                    .push(format!("severe negative catalyst: {catalyst}"));
            }
        }

        if s.atr_pct > c.max_atr_pct {
            risk.total_penalty += 10.0;
            risk.penalties
                .push(format!("high volatility: ATR {:.1}% of price", s.atr_pct));
        }
        if s.sma200.is_some_and(|sma| s.close < sma) && s.depth_pct() >= 20.0 {
            risk.total_penalty += 5.0;
            risk.penalties
                .push("below 200-day average in a deep correction".to_string());
        }
        if s.rsi < 15.0 && !reversal_confirmed {
            risk.total_penalty += 5.0;
            risk.penalties
                .push(format!("capitulation RSI {:.1} without reversal", s.rsi));
        }

        risk.passed = risk.rejections.is_empty();
        risk
    }

    /// Stage 8
    pub fn market_adjustment(&self, s: &TechnicalSnapshot, market: Option<&MarketContext>) -> f64 {
        let Some(ctx) = market else {
            return 0.0;
        };
        let mut adj = match ctx.trend {
            MarketTrend::Bullish => 5.0,
            MarketTrend::Neutral => 0.0,
            MarketTrend::Bearish => -10.0,
        };
        if ctx.index_depth_pct > 10.0 {
            adj -= 5.0;
        }
        if s.return_5d - ctx.index_return_5d > 0.0 {
            adj += 3.0;
        }
        adj
    }

    /// Run every stage and produce the decision
    pub fn analyze(&self, input: &CorrectionInput<'_>) -> CorrectionDecision {
        let s = input.snapshot;
        let cfg = &self.config;
        let mut reasons = Vec::new();

        let depth_pct = s.depth_pct();
        let level = self.detect_level(depth_pct);
        let correction_score = level.score();
        if level == CorrectionLevel::None {
            reasons.push(format!("only {depth_pct:.1}% below 60-day high"));
        } else {
            reasons.push(format!(
                "{level} correction: {depth_pct:.1}% below 60-day high ({} bars ago)",
                s.days_from_high
            ));
        }

        let reversal = self.reversal_signals(s);
        let reversal_confirmed = reversal.count() >= cfg.min_reversal_signals;
        reasons.push(format!(
            "{}/{} reversal signals{}",
            reversal.count(),
            ReversalSignals::TOTAL,
            if reversal_confirmed { " (confirmed)" } else { "" }
        ));

        let oversold_score = self.oversold_score(s);
        if oversold_score >= 50.0 {
            reasons.push(format!("oversold (RSI {:.1})", s.rsi));
        }

        let (fundamental_score, fundamental_basis) =
            self.fundamental_score(input.fundamentals, s);
        let catalyst_score = self.catalyst_score(input.news);
        if let Some(news) = input.news.filter(|n| !n.catalysts.is_empty()) {
            reasons.push(format!("catalysts: {}", news.catalyst_list().replace(';', ", ")));
        }

        let w = &cfg.weights;
        let confidence = w.correction * correction_score
            + w.reversal * reversal.score()
            + w.oversold * oversold_score
            + w.fundamental * fundamental_score
            + w.catalyst * catalyst_score;

        let risk = self.assess_risk(s, level, reversal_confirmed, input.news);
        reasons.extend(risk.rejections.iter().map(|r| format!("rejected: {r}")));
        reasons.extend(risk.penalties.iter().map(|p| format!("penalty: {p}")));

        let market_adjustment = self.market_adjustment(s, input.market);
        if market_adjustment != 0.0 {
            reasons.push(format!("market context {market_adjustment:+.0}"));
        }

        let adjusted_confidence =
            f64::clamp(confidence - risk.total_penalty + market_adjustment, 0.0, 100.0);

        let (boost, final_score) = if risk.passed {
            let boost = if level != CorrectionLevel::None
                && adjusted_confidence >= cfg.boost_threshold
            {
                (adjusted_confidence - 50.0) / 50.0 * cfg.max_boost
            } else {
                0.0
            };
            (boost, f64::clamp(input.base_score + boost, 0.0, 100.0))
        } else {
            (0.0, f64::min(input.base_score, cfg.rejected_score_cap))
        };
        if boost > 0.0 {
            reasons.push(format!("rebound boost +{boost:.1}"));
        }

        let decision = if !risk.passed {
            Decision::Avoid
        } else if level == CorrectionLevel::None {
            Decision::NoCorrection
        } else if adjusted_confidence >= 75.0 {
            Decision::StrongRebound
        } else if adjusted_confidence >= 60.0 {
            Decision::Rebound
        } else if adjusted_confidence >= 45.0 {
            Decision::Watch
        } else {
            Decision::Avoid
        };

        CorrectionDecision {
            ticker: input.ticker.to_string(),
            level,
            depth_pct,
            correction_score,
            reversal,
            reversal_score: reversal.score(),
            reversal_confirmed,
            oversold_score,
            fundamental_score,
            fundamental_basis,
            catalyst_score,
            confidence,
            risk,
            market_adjustment,
            adjusted_confidence,
            boost,
            base_score: input.base_score,
            final_score,
            decision,
            reasons,
        }
    }
}

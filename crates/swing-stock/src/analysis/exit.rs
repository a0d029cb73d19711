//! Hold / trim / exit decisions for open positions
//!
//! A rule-based baseline is always computed. When a provider chain is
//! configured the model sees the baseline and may override it, except that
//! a model "hold" never silences a baseline exit with higher urgency.

use super::NewsScore;
use super::ai::number_field;
use crate::error::{Result, StockError};
use crate::indicators::TechnicalSnapshot;
use crate::market::normalize_symbol;
use crate::prompts::{EXIT_ANALYSIS, PromptSet};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use swing_llm::{ProviderChain, extract_json};
use tracing::{debug, instrument, warn};

/// Stop used when a position has none, as a fraction below entry
pub const DEFAULT_STOP_PCT: f64 = 0.08;

/// An open position, one CSV row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub target: Option<f64>,
}

impl Position {
    pub fn effective_stop(&self) -> f64 {
        self.stop_loss
            .unwrap_or(self.entry_price * (1.0 - DEFAULT_STOP_PCT))
    }

    pub fn pnl_pct(&self, close: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        (close - self.entry_price) / self.entry_price * 100.0
    }
}

/// Read positions from a CSV with a
/// `ticker,entry_price,quantity,entry_date,stop_loss,target` header
pub fn load_positions(path: impl AsRef<Path>, default_suffix: &str) -> Result<Vec<Position>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        StockError::ConfigError(format!("Cannot open positions file {}: {e}", path.display()))
    })?;
    positions_from_reader(file, default_suffix)
}

pub fn positions_from_reader<R: std::io::Read>(reader: R, default_suffix: &str) -> Result<Vec<Position>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut positions = Vec::new();
    for row in csv.deserialize::<Position>() {
        let mut position = row?;
        if position.entry_price <= 0.0 {
            return Err(StockError::ConfigError(format!(
                "Position {} has non-positive entry price",
                position.ticker
            )));
        }
        position.ticker = normalize_symbol(&position.ticker, default_suffix);
        positions.push(position);
    }
    Ok(positions)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExitAction {
    Hold,
    Trim,
    Exit,
}

impl ExitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitAction::Hold => "HOLD",
            ExitAction::Trim => "TRIM",
            ExitAction::Exit => "EXIT",
        }
    }

    fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "HOLD" | "KEEP" => Some(ExitAction::Hold),
            "TRIM" | "REDUCE" | "PARTIAL" => Some(ExitAction::Trim),
            "EXIT" | "SELL" | "CLOSE" => Some(ExitAction::Exit),
            _ => None,
        }
    }
}

impl fmt::Display for ExitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitRecommendation {
    pub ticker: String,
    pub action: ExitAction,
    /// 0-100
    pub urgency: f64,
    pub pnl_pct: f64,
    pub close: f64,
    pub reason: String,
    /// `baseline` or `ai:<provider>`
    pub source: String,
}

#[derive(Serialize)]
struct ExitPromptVars<'a> {
    ticker: &'a str,
    quantity: f64,
    entry_price: f64,
    entry_date: String,
    close: f64,
    pnl_pct: String,
    stop_loss: String,
    target: Option<f64>,
    rsi: String,
    macd_hist: String,
    sma20: String,
    sma50: String,
    atr_pct: String,
    headlines: Vec<&'a str>,
    baseline_action: &'static str,
    baseline_urgency: f64,
    baseline_reason: &'a str,
}

pub struct ExitAnalyzer {
    chain: Option<Arc<ProviderChain>>,
    prompts: Arc<PromptSet>,
}

impl ExitAnalyzer {
    pub fn new(chain: Option<Arc<ProviderChain>>, prompts: Arc<PromptSet>) -> Self {
        Self {
            chain: chain.filter(|c| !c.is_empty()),
            prompts,
        }
    }

    /// Rule-based recommendation
    pub fn baseline(&self, position: &Position, s: &TechnicalSnapshot, news: Option<&NewsScore>) -> ExitRecommendation {
        let pnl = position.pnl_pct(s.close);
        let stop = position.effective_stop();
        let sentiment = news.map_or(0.0, |n| n.sentiment);

        let (action, urgency, reason) = if s.close <= stop {
            (ExitAction::Exit, 95.0, format!("stop loss ₹{stop:.2} hit"))
        } else if position.target.is_some_and(|t| s.close >= t) {
            (ExitAction::Trim, 70.0, "target reached, book partial profit".to_string())
        } else if s.rsi > 75.0 && pnl > 10.0 {
            (ExitAction::Trim, 60.0, format!("overbought (RSI {:.0}) with {pnl:.1}% gain", s.rsi))
        } else if s.close < s.sma20 && sentiment < -0.3 {
            (ExitAction::Exit, 75.0, "below 20-day SMA with negative news".to_string())
        } else if pnl < -5.0 && s.macd_hist < 0.0 {
            (ExitAction::Trim, 55.0, format!("{pnl:.1}% loss with negative momentum"))
        } else {
            (ExitAction::Hold, 20.0, "no exit trigger".to_string())
        };

        ExitRecommendation {
            ticker: position.ticker.clone(),
            action,
            urgency,
            pnl_pct: pnl,
            close: s.close,
            reason,
            source: "baseline".to_string(),
        }
    }

    /// Baseline, optionally refined by the model
    #[instrument(skip_all, fields(ticker = %position.ticker))]
    pub async fn evaluate(
        &self,
        position: &Position,
        snapshot: &TechnicalSnapshot,
        news: Option<&NewsScore>,
        headlines: &[String],
    ) -> ExitRecommendation {
        let baseline = self.baseline(position, snapshot, news);
        let Some(chain) = &self.chain else {
            return baseline;
        };

        match self.ask(chain, position, snapshot, headlines, &baseline).await {
            Ok(ai) => merge(baseline, ai),
            Err(e) => {
                warn!(ticker = %position.ticker, error = %e, "AI exit review failed, keeping baseline");
                baseline
            }
        }
    }

    async fn ask(
        &self,
        chain: &ProviderChain,
        position: &Position,
        s: &TechnicalSnapshot,
        headlines: &[String],
        baseline: &ExitRecommendation,
    ) -> Result<ExitRecommendation> {
        let vars = ExitPromptVars {
            ticker: &position.ticker,
            quantity: position.quantity,
            entry_price: position.entry_price,
            entry_date: position.entry_date.to_string(),
            close: s.close,
            pnl_pct: format!("{:.1}", baseline.pnl_pct),
            stop_loss: format!("{:.2}", position.effective_stop()),
            target: position.target,
            rsi: format!("{:.1}", s.rsi),
            macd_hist: format!("{:.2}", s.macd_hist),
            sma20: format!("{:.2}", s.sma20),
            sma50: format!("{:.2}", s.sma50),
            atr_pct: format!("{:.1}", s.atr_pct),
            headlines: headlines.iter().take(5).map(String::as_str).collect(),
            baseline_action: baseline.action.as_str(),
            baseline_urgency: baseline.urgency,
            baseline_reason: &baseline.reason,
        };
        let prompt = self.prompts.render(EXIT_ANALYSIS, &vars)?;
        let reply = chain.complete_text(&prompt.system, &prompt.user).await?;
        parse_exit_reply(baseline, &reply.text, &reply.provider)
    }
}

fn parse_exit_reply(baseline: &ExitRecommendation, text: &str, provider: &str) -> Result<ExitRecommendation> {
    let invalid = |reason: &str| StockError::DataUnavailable {
        symbol: baseline.ticker.clone(),
        reason: reason.to_string(),
    };
    let json = extract_json(text).ok_or_else(|| invalid("model reply contained no JSON object"))?;
    let action = json
        .get("action")
        .and_then(Value::as_str)
        .and_then(ExitAction::parse)
        .ok_or_else(|| invalid("model reply has no valid action"))?;

    Ok(ExitRecommendation {
        action,
        urgency: number_field(&json, "urgency")
            .unwrap_or(baseline.urgency)
            .clamp(0.0, 100.0),
        reason: json
            .get("reason")
            .and_then(Value::as_str)
            .map_or_else(|| baseline.reason.clone(), |r| r.trim().to_string()),
        source: format!("ai:{provider}"),
        ..baseline.clone()
    })
}

fn merge(baseline: ExitRecommendation, ai: ExitRecommendation) -> ExitRecommendation {
    if ai.action == ExitAction::Hold
        && baseline.action == ExitAction::Exit
        && baseline.urgency > ai.urgency
    {
        debug!(ticker = %baseline.ticker, "Baseline exit outranks AI hold");
        return baseline;
    }
    ai
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ScoreSource;
    use crate::analysis::ai::tests::{StubProvider, chain_with};
    use crate::indicators::tests::flat_snapshot;

    fn position() -> Position {
        Position {
            ticker: "TCS.NS".into(),
            entry_price: 100.0,
            quantity: 10.0,
            entry_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            stop_loss: None,
            target: Some(120.0),
        }
    }

    fn analyzer(chain: Option<Arc<ProviderChain>>) -> ExitAnalyzer {
        ExitAnalyzer::new(chain, Arc::new(PromptSet::new().unwrap()))
    }

    fn negative_news() -> NewsScore {
        NewsScore {
            ticker: "TCS.NS".into(),
            sentiment: -0.6,
            score: 30.0,
            catalysts: Vec::new(),
            confidence: 60.0,
            summary: String::new(),
            source: ScoreSource::Heuristic,
            headline_count: 2,
        }
    }

    #[test]
    fn test_baseline_rules() {
        let a = analyzer(None);
        let p = position();

        let rec = a.baseline(&p, &flat_snapshot(91.0), None);
        assert_eq!((rec.action, rec.urgency), (ExitAction::Exit, 95.0));

        let rec = a.baseline(&p, &flat_snapshot(121.0), None);
        assert_eq!((rec.action, rec.urgency), (ExitAction::Trim, 70.0));

        let mut hot = flat_snapshot(115.0);
        hot.rsi = 80.0;
        assert_eq!(a.baseline(&p, &hot, None).action, ExitAction::Trim);

        let mut weak = flat_snapshot(99.0);
        weak.sma20 = 103.0;
        let rec = a.baseline(&p, &weak, Some(&negative_news()));
        assert_eq!((rec.action, rec.urgency), (ExitAction::Exit, 75.0));

        let mut losing = flat_snapshot(94.0);
        losing.macd_hist = -1.0;
        let rec = a.baseline(&p, &losing, None);
        assert_eq!((rec.action, rec.urgency), (ExitAction::Trim, 55.0));

        let rec = a.baseline(&p, &flat_snapshot(104.0), None);
        assert_eq!((rec.action, rec.urgency), (ExitAction::Hold, 20.0));
        assert!((rec.pnl_pct - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_stop() {
        let mut p = position();
        p.stop_loss = Some(97.0);
        let rec = analyzer(None).baseline(&p, &flat_snapshot(96.5), None);
        assert_eq!(rec.action, ExitAction::Exit);
    }

    #[tokio::test]
    async fn test_ai_overrides_baseline() {
        let stub = StubProvider::replying(r#"{"action": "trim", "urgency": 65, "reason": "results risk"}"#);
        let rec = analyzer(Some(chain_with(stub)))
            .evaluate(&position(), &flat_snapshot(104.0), None, &[])
            .await;
        assert_eq!(rec.action, ExitAction::Trim);
        assert_eq!(rec.source, "ai:stub");
        assert_eq!(rec.reason, "results risk");
    }

    #[tokio::test]
    async fn test_ai_hold_cannot_mask_exit() {
        let stub = StubProvider::replying(r#"{"action": "HOLD", "urgency": 30, "reason": "fine"}"#);
        let rec = analyzer(Some(chain_with(stub)))
            .evaluate(&position(), &flat_snapshot(90.0), None, &[])
            .await;
        assert_eq!(rec.action, ExitAction::Exit);
        assert_eq!(rec.source, "baseline");
    }

    #[tokio::test]
    async fn test_bad_ai_reply_keeps_baseline() {
        let stub = StubProvider::replying(r#"{"action": "panic"}"#);
        let rec = analyzer(Some(chain_with(stub)))
            .evaluate(&position(), &flat_snapshot(104.0), None, &[])
            .await;
        assert_eq!(rec.source, "baseline");
    }

    #[test]
    fn test_positions_csv() {
        let csv = "ticker,entry_price,quantity,entry_date,stop_loss,target\n\
                   tcs,3900,10,2024-05-01,,\n\
                   NSE:LT,3500.5,4,2024-05-10,3300,3900\n";
        let positions = positions_from_reader(csv.as_bytes(), ".NS").unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].ticker, "TCS.NS");
        assert!(positions[0].stop_loss.is_none());
        assert_eq!(positions[1].ticker, "LT.NS");
        assert_eq!(positions[1].target, Some(3900.0));
    }

    #[test]
    fn test_positions_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_positions(dir.path().join("nope.csv"), ".NS").is_err());
    }
}

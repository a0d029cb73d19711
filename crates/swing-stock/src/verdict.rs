//! Reconcile a news score with its web verification

use crate::analysis::NewsScore;
use crate::verify::VerificationReport;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Confirmed,
    Plausible,
    Unverified,
    Contradicted,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Confirmed => "confirmed",
            VerdictStatus::Plausible => "plausible",
            VerdictStatus::Unverified => "unverified",
            VerdictStatus::Contradicted => "contradicted",
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub adjusted_score: f64,
    pub adjusted_confidence: f64,
    pub notes: Vec<String>,
}

/// Confidence multipliers per outcome
#[derive(Debug, Clone)]
pub struct VerdictEngine {
    pub confirm_ratio: f64,
    pub confirm_bonus: f64,
    pub nothing_checked_factor: f64,
    pub contradicted_factor: f64,
    pub unverified_factor: f64,
}

impl Default for VerdictEngine {
    fn default() -> Self {
        Self {
            confirm_ratio: 0.6,
            confirm_bonus: 0.1,
            nothing_checked_factor: 0.85,
            contradicted_factor: 0.4,
            unverified_factor: 0.7,
        }
    }
}

impl VerdictEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile(&self, news: &NewsScore, report: &VerificationReport) -> Verdict {
        let mut notes = Vec::new();
        let mut score = news.score;

        let (status, factor) = if report.checked == 0 {
            notes.push("no claims could be checked".to_string());
            (VerdictStatus::Unverified, self.nothing_checked_factor)
        } else if report.contradicted > 0 {
            score = score + (50.0 - score) / 2.0;
            notes.push(format!(
                "{} of {} claims contradicted; score pulled toward neutral",
                report.contradicted, report.checked
            ));
            (VerdictStatus::Contradicted, self.contradicted_factor)
        } else if report.ratio >= self.confirm_ratio {
            notes.push(format!("{} of {} claims confirmed", report.verified, report.checked));
            (VerdictStatus::Confirmed, 1.0 + self.confirm_bonus)
        } else if report.ratio > 0.0 {
            notes.push(format!("{} of {} claims confirmed", report.verified, report.checked));
            (VerdictStatus::Plausible, 0.6 + 0.4 * report.ratio)
        } else {
            notes.push(format!("none of {} claims found in search results", report.checked));
            (VerdictStatus::Unverified, self.unverified_factor)
        };

        notes.extend(
            report
                .evidence
                .iter()
                .take(3)
                .map(|e| format!("{:?}: {} ({})", e.outcome, e.claim, e.url).to_lowercase()),
        );

        Verdict {
            status,
            adjusted_score: score.clamp(0.0, 100.0),
            adjusted_confidence: (news.confidence * factor).clamp(0.0, 100.0),
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ScoreSource;

    fn news(score: f64, confidence: f64) -> NewsScore {
        NewsScore {
            ticker: "LT.NS".into(),
            sentiment: 0.4,
            score,
            catalysts: Vec::new(),
            confidence,
            summary: String::new(),
            source: ScoreSource::Ai("stub".into()),
            headline_count: 3,
        }
    }

    fn report(checked: usize, verified: usize, contradicted: usize) -> VerificationReport {
        VerificationReport {
            checked,
            verified,
            contradicted,
            ratio: if checked == 0 { 0.0 } else { verified as f64 / checked as f64 },
            evidence: Vec::new(),
        }
    }

    #[test]
    fn test_nothing_checked() {
        let v = VerdictEngine::new().reconcile(&news(70.0, 80.0), &report(0, 0, 0));
        assert_eq!(v.status, VerdictStatus::Unverified);
        assert!((v.adjusted_confidence - 68.0).abs() < 1e-9);
        assert!((v.adjusted_score - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_contradiction_wins() {
        let v = VerdictEngine::new().reconcile(&news(80.0, 80.0), &report(3, 2, 1));
        assert_eq!(v.status, VerdictStatus::Contradicted);
        assert!((v.adjusted_score - 65.0).abs() < 1e-9);
        assert!((v.adjusted_confidence - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_confirmed_capped() {
        let v = VerdictEngine::new().reconcile(&news(75.0, 95.0), &report(3, 2, 0));
        assert_eq!(v.status, VerdictStatus::Confirmed);
        assert!((v.adjusted_confidence - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_plausible_and_unverified() {
        let engine = VerdictEngine::new();
        let v = engine.reconcile(&news(60.0, 50.0), &report(4, 1, 0));
        assert_eq!(v.status, VerdictStatus::Plausible);
        assert!((v.adjusted_confidence - 35.0).abs() < 1e-9);

        let v = engine.reconcile(&news(60.0, 50.0), &report(2, 0, 0));
        assert_eq!(v.status, VerdictStatus::Unverified);
        assert!((v.adjusted_confidence - 35.0).abs() < 1e-9);
        assert_eq!(v.status.to_string(), "unverified");
    }
}

//! CSV reports and console tables

use crate::analysis::ExitRecommendation;
use crate::error::Result;
use crate::learning::TickerStats;
use chrono::Local;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// One ranked row of a swing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub rank: usize,
    pub ticker: String,
    pub final_score: f64,
    pub decision: String,
    pub ai_score: f64,
    pub technical_score: f64,
    pub correction_confidence: f64,
    pub boost: f64,
    pub learning_adjustment: f64,
    pub verdict: String,
    pub close: f64,
    pub rsi: f64,
    pub depth_pct: f64,
    pub catalysts: String,
    pub source: String,
    pub summary: String,
}

fn stamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes timestamped CSV files into an output directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `swing_<path>_<YYYYMMDD_HHMMSS>.csv`
    pub fn write_recommendations(&self, path_label: &str, rows: &[Recommendation]) -> Result<PathBuf> {
        let file = self.dir.join(format!("swing_{path_label}_{}.csv", stamp()));
        write_rows(&file, rows)?;
        info!(file = %file.display(), rows = rows.len(), "Wrote recommendations");
        Ok(file)
    }

    /// `exit_<YYYYMMDD_HHMMSS>.csv`
    pub fn write_exits(&self, rows: &[ExitRecommendation]) -> Result<PathBuf> {
        let file = self.dir.join(format!("exit_{}.csv", stamp()));
        write_rows(&file, rows)?;
        info!(file = %file.display(), rows = rows.len(), "Wrote exit report");
        Ok(file)
    }
}

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn num(value: f64, decimals: usize) -> Cell {
    Cell::new(format!("{value:.decimals$}")).set_alignment(CellAlignment::Right)
}

pub fn recommendations_table(rows: &[Recommendation]) -> Table {
    let mut t = table(&[
        "#", "Ticker", "Score", "Decision", "AI", "Tech", "Corr", "Boost", "Verdict", "Close", "RSI",
        "Depth %", "Catalysts",
    ]);
    for r in rows {
        t.add_row(vec![
            Cell::new(r.rank),
            Cell::new(&r.ticker),
            num(r.final_score, 1),
            Cell::new(&r.decision),
            num(r.ai_score, 0),
            num(r.technical_score, 0),
            num(r.correction_confidence, 0),
            num(r.boost, 1),
            Cell::new(&r.verdict),
            num(r.close, 2),
            num(r.rsi, 1),
            num(r.depth_pct, 1),
            Cell::new(&r.catalysts),
        ]);
    }
    t
}

pub fn exits_table(rows: &[ExitRecommendation]) -> Table {
    let mut t = table(&["Ticker", "Action", "Urgency", "P&L %", "Close", "Source", "Reason"]);
    for r in rows {
        t.add_row(vec![
            Cell::new(&r.ticker),
            Cell::new(r.action),
            num(r.urgency, 0),
            num(r.pnl_pct, 1),
            num(r.close, 2),
            Cell::new(&r.source),
            Cell::new(&r.reason),
        ]);
    }
    t
}

pub fn stats_table(rows: &[TickerStats]) -> Table {
    let mut t = table(&["Ticker", "Calls", "Hits", "Avg return %", "Reliability", "Updated"]);
    for s in rows {
        t.add_row(vec![
            Cell::new(&s.ticker),
            Cell::new(s.total),
            Cell::new(s.successes),
            num(s.avg_return, 2),
            num(s.reliability, 1),
            Cell::new(s.updated_at.format("%Y-%m-%d")),
        ]);
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ExitAction;

    fn row(rank: usize, ticker: &str) -> Recommendation {
        Recommendation {
            rank,
            ticker: ticker.into(),
            final_score: 71.25,
            decision: "REBOUND".into(),
            ai_score: 68.0,
            technical_score: 62.0,
            correction_confidence: 66.0,
            boost: 4.9,
            learning_adjustment: 0.0,
            verdict: "confirmed".into(),
            close: 3512.4,
            rsi: 33.1,
            depth_pct: 12.5,
            catalysts: "order_win;dividend".into(),
            source: "ai:anthropic".into(),
            summary: "Order win, \"record\" backlog".into(),
        }
    }

    #[test]
    fn test_write_recommendations_csv() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("out"));
        let file = writer
            .write_recommendations("rebound", &[row(1, "LT.NS"), row(2, "TCS.NS")])
            .unwrap();

        let name = file.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("swing_rebound_"));
        assert!(name.ends_with(".csv"));
        assert_eq!(name.len(), "swing_rebound_YYYYMMDD_HHMMSS.csv".len());

        let mut reader = csv::Reader::from_path(&file).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "rank");
        assert_eq!(&headers[1], "ticker");
        let rows: Vec<Recommendation> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows, vec![row(1, "LT.NS"), row(2, "TCS.NS")]);
    }

    #[test]
    fn test_write_exits_csv() {
        let dir = tempfile::tempdir().unwrap();
        let file = ReportWriter::new(dir.path())
            .write_exits(&[ExitRecommendation {
                ticker: "TCS.NS".into(),
                action: ExitAction::Trim,
                urgency: 55.0,
                pnl_pct: -6.0,
                close: 94.0,
                reason: "loss with negative momentum".into(),
                source: "baseline".into(),
            }])
            .unwrap();
        assert!(file.file_name().unwrap().to_string_lossy().starts_with("exit_"));
        let content = fs::read_to_string(file).unwrap();
        assert!(content.contains("TCS.NS,TRIM,55.0"));
    }

    #[test]
    fn test_tables_render() {
        let rendered = recommendations_table(&[row(1, "LT.NS")]).to_string();
        assert!(rendered.contains("LT.NS"));
        assert!(rendered.contains("71.2") || rendered.contains("71.3"));
        assert!(rendered.contains('│'));
    }
}

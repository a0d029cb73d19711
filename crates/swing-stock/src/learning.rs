//! Run history and per-ticker outcome tracking
//!
//! Every run and its ranked recommendations are stored. Feedback (the price
//! some time after the call) turns into a per-ticker reliability score that
//! later runs use to nudge rankings.

use crate::error::{Result, StockError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: &str = include_str!("../schema.sql");

/// Samples needed before reliability is taken at face value
const FULL_WEIGHT_SAMPLES: f64 = 10.0;
/// Largest ranking nudge in score points
const MAX_ADJUSTMENT: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct RunRecord {
    pub id: i64,
    pub run_uid: String,
    pub path: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub provider: Option<String>,
    pub tickers_analyzed: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct RecommendationRecord {
    pub id: i64,
    pub run_id: i64,
    pub ticker: String,
    pub rank: i64,
    pub final_score: f64,
    pub decision: String,
    pub entry_price: f64,
    pub created_at: DateTime<Utc>,
}

/// A recommendation about to be stored
#[derive(Debug, Clone)]
pub struct NewRecommendation<'a> {
    pub ticker: &'a str,
    pub rank: usize,
    pub final_score: f64,
    pub decision: &'a str,
    pub entry_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct TickerStats {
    pub ticker: String,
    pub total: i64,
    pub successes: i64,
    pub avg_return: f64,
    pub reliability: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackOutcome {
    pub recommendation_id: i64,
    pub ticker: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub return_pct: f64,
    pub success: bool,
}

/// Laplace-smoothed hit rate, shrunk toward 50 for small samples
pub fn reliability(successes: i64, total: i64) -> f64 {
    if total <= 0 {
        return 50.0;
    }
    let raw = (successes as f64 + 1.0) / (total as f64 + 2.0) * 100.0;
    let weight = (total as f64 / FULL_WEIGHT_SAMPLES).min(1.0);
    50.0 + (raw - 50.0) * weight
}

/// Score points added to a ranked score, ±5 at most; unknown tickers get 0
pub fn reliability_adjustment(reliability: Option<f64>) -> f64 {
    reliability.map_or(0.0, |r| {
        ((r - 50.0) / 50.0 * MAX_ADJUSTMENT).clamp(-MAX_ADJUSTMENT, MAX_ADJUSTMENT)
    })
}

#[derive(Clone)]
pub struct LearningDb {
    pool: SqlitePool,
}

impl LearningDb {
    /// Open (creating if needed) the database at `database_url`
    pub async fn open(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // every in-memory connection is its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        debug!(url = %database_url, "Learning database ready");
        Ok(db)
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() && !stmt.lines().all(|l| l.trim_start().starts_with("--")) {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn start_run(&self, path: &str, provider: Option<&str>, notes: Option<&str>) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO runs (run_uid, path, started_at, provider, notes) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(path)
        .bind(Utc::now())
        .bind(provider)
        .bind(notes)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn finish_run(&self, run_id: i64, tickers_analyzed: usize) -> Result<()> {
        let result = sqlx::query("UPDATE runs SET finished_at = ?, tickers_analyzed = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(tickers_analyzed as i64)
            .bind(run_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StockError::NotFound(format!("run {run_id}")));
        }
        Ok(())
    }

    pub async fn record_recommendation(&self, run_id: i64, rec: &NewRecommendation<'_>) -> Result<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO recommendations (run_id, ticker, rank, final_score, decision, entry_price, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(run_id)
        .bind(rec.ticker)
        .bind(rec.rank as i64)
        .bind(rec.final_score)
        .bind(rec.decision)
        .bind(rec.entry_price)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Store a finished run and its picks in one transaction
    ///
    /// Either the whole run lands with `finished_at` set, or nothing does.
    pub async fn record_run(
        &self,
        path: &str,
        provider: Option<&str>,
        tickers_analyzed: usize,
        recs: &[NewRecommendation<'_>],
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let started_at = Utc::now();

        let run_id = sqlx::query(
            "INSERT INTO runs (run_uid, path, started_at, provider, notes) VALUES (?, ?, ?, ?, NULL)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(path)
        .bind(started_at)
        .bind(provider)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for rec in recs {
            sqlx::query(
                r"
                INSERT INTO recommendations (run_id, ticker, rank, final_score, decision, entry_price, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(run_id)
            .bind(rec.ticker)
            .bind(rec.rank as i64)
            .bind(rec.final_score)
            .bind(rec.decision)
            .bind(rec.entry_price)
            .bind(started_at)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE runs SET finished_at = ?, tickers_analyzed = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(tickers_analyzed as i64)
            .bind(run_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(run_id, path, picks = recs.len(), "Recorded run");
        Ok(run_id)
    }

    pub async fn recommendations_for_run(&self, run_id: i64) -> Result<Vec<RecommendationRecord>> {
        Ok(sqlx::query_as::<_, RecommendationRecord>(
            "SELECT * FROM recommendations WHERE run_id = ? ORDER BY rank",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn has_feedback(&self, recommendation_id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM feedback WHERE recommendation_id = ?")
            .bind(recommendation_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Store the outcome of a recommendation and update its ticker's stats
    ///
    /// Success means a return of at least `success_threshold_pct`.
    pub async fn record_feedback(
        &self,
        recommendation_id: i64,
        exit_price: f64,
        success_threshold_pct: f64,
    ) -> Result<FeedbackOutcome> {
        let mut tx = self.pool.begin().await?;

        let rec = sqlx::query_as::<_, RecommendationRecord>("SELECT * FROM recommendations WHERE id = ?")
            .bind(recommendation_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StockError::NotFound(format!("recommendation {recommendation_id}")))?;

        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM feedback WHERE recommendation_id = ?")
            .bind(recommendation_id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(StockError::Duplicate(format!("feedback for recommendation {recommendation_id}")));
        }

        let return_pct = if rec.entry_price > 0.0 {
            (exit_price - rec.entry_price) / rec.entry_price * 100.0
        } else {
            0.0
        };
        let success = return_pct >= success_threshold_pct;
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO feedback (recommendation_id, ticker, exit_price, return_pct, success, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(recommendation_id)
        .bind(&rec.ticker)
        .bind(exit_price)
        .bind(return_pct)
        .bind(success)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let previous = sqlx::query_as::<_, TickerStats>("SELECT * FROM ticker_stats WHERE ticker = ?")
            .bind(&rec.ticker)
            .fetch_optional(&mut *tx)
            .await?;
        let (prev_total, prev_successes, prev_avg) =
            previous.map_or((0, 0, 0.0), |s| (s.total, s.successes, s.avg_return));

        let total = prev_total + 1;
        let successes = prev_successes + i64::from(success);
        let avg_return = (prev_avg * prev_total as f64 + return_pct) / total as f64;

        sqlx::query(
            r"
            INSERT INTO ticker_stats (ticker, total, successes, avg_return, reliability, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(ticker) DO UPDATE SET
                total = excluded.total,
                successes = excluded.successes,
                avg_return = excluded.avg_return,
                reliability = excluded.reliability,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&rec.ticker)
        .bind(total)
        .bind(successes)
        .bind(avg_return)
        .bind(reliability(successes, total))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            ticker = %rec.ticker,
            return_pct,
            success,
            "Feedback recorded"
        );
        Ok(FeedbackOutcome {
            recommendation_id,
            ticker: rec.ticker,
            entry_price: rec.entry_price,
            exit_price,
            return_pct,
            success,
        })
    }

    pub async fn ticker_stats(&self, ticker: &str) -> Result<Option<TickerStats>> {
        Ok(sqlx::query_as::<_, TickerStats>("SELECT * FROM ticker_stats WHERE ticker = ?")
            .bind(ticker)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// All tracked tickers, most reliable first
    pub async fn all_stats(&self) -> Result<Vec<TickerStats>> {
        Ok(sqlx::query_as::<_, TickerStats>(
            "SELECT * FROM ticker_stats ORDER BY reliability DESC, ticker",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        Ok(sqlx::query_as::<_, RunRecord>("SELECT * FROM runs ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Ranking nudge for `ticker` from its recorded outcomes
    pub async fn adjustment_for(&self, ticker: &str) -> Result<f64> {
        Ok(reliability_adjustment(
            self.ticker_stats(ticker).await?.map(|s| s.reliability),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn db() -> LearningDb {
        LearningDb::open("sqlite::memory:").await.unwrap()
    }

    async fn seeded(db: &LearningDb, ticker: &str, entry: f64) -> i64 {
        let run = db.start_run("rebound", Some("stub"), None).await.unwrap();
        db.record_recommendation(
            run,
            &NewRecommendation {
                ticker,
                rank: 1,
                final_score: 72.0,
                decision: "REBOUND",
                entry_price: entry,
            },
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_reliability_formula() {
        assert!((reliability(0, 0) - 50.0).abs() < 1e-9);
        // 1 of 1: raw 66.67, weight 0.1
        assert!((reliability(1, 1) - (50.0 + (200.0 / 3.0 - 50.0) * 0.1)).abs() < 1e-9);
        // 10 of 10: raw 91.67, full weight
        assert!((reliability(10, 10) - 11.0 / 12.0 * 100.0).abs() < 1e-9);
        assert!(reliability(0, 20) < 10.0);
    }

    #[test]
    fn test_reliability_adjustment() {
        assert!(reliability_adjustment(None).abs() < f64::EPSILON);
        assert!((reliability_adjustment(Some(100.0)) - 5.0).abs() < 1e-9);
        assert!((reliability_adjustment(Some(25.0)) + 2.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_run_lifecycle() {
        let db = db().await;
        let run = db.start_run("momentum", None, Some("test")).await.unwrap();
        for (rank, ticker) in ["TCS.NS", "LT.NS"].iter().enumerate() {
            db.record_recommendation(
                run,
                &NewRecommendation {
                    ticker,
                    rank: rank + 1,
                    final_score: 70.0 - rank as f64,
                    decision: "WATCH",
                    entry_price: 100.0,
                },
            )
            .await
            .unwrap();
        }
        db.finish_run(run, 12).await.unwrap();

        let recs = db.recommendations_for_run(run).await.unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].ticker, "TCS.NS");
        assert_eq!(recs[1].rank, 2);

        let runs = db.recent_runs(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].tickers_analyzed, 12);
        assert!(runs[0].finished_at.is_some());
        assert_eq!(runs[0].path, "momentum");

        assert!(matches!(db.finish_run(999, 1).await, Err(StockError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_record_run_is_finished() {
        let db = db().await;
        let picks = [
            NewRecommendation {
                ticker: "SBIN.NS",
                rank: 1,
                final_score: 81.0,
                decision: "STRONG_REBOUND",
                entry_price: 780.0,
            },
            NewRecommendation {
                ticker: "ITC.NS",
                rank: 2,
                final_score: 64.5,
                decision: "REBOUND",
                entry_price: 410.0,
            },
        ];
        let run = db.record_run("rebound", Some("anthropic"), 15, &picks).await.unwrap();

        let runs = db.recent_runs(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, run);
        assert!(runs[0].finished_at.is_some());
        assert_eq!(runs[0].tickers_analyzed, 15);
        assert_eq!(runs[0].provider.as_deref(), Some("anthropic"));

        let recs = db.recommendations_for_run(run).await.unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1].ticker, "ITC.NS");
    }

    #[tokio::test]
    async fn test_feedback_updates_stats() {
        let db = db().await;
        let first = seeded(&db, "LT.NS", 100.0).await;
        let second = seeded(&db, "LT.NS", 200.0).await;

        let outcome = db.record_feedback(first, 105.0, 2.0).await.unwrap();
        assert!(outcome.success);
        assert!((outcome.return_pct - 5.0).abs() < 1e-9);

        let outcome = db.record_feedback(second, 198.0, 2.0).await.unwrap();
        assert!(!outcome.success);

        let stats = db.ticker_stats("LT.NS").await.unwrap().unwrap();
        assert_eq!((stats.total, stats.successes), (2, 1));
        assert!((stats.avg_return - 2.0).abs() < 1e-9);
        assert!((stats.reliability - 50.0).abs() < 1e-9);
        assert!(db.adjustment_for("LT.NS").await.unwrap().abs() < 1e-9);
        assert!(db.adjustment_for("TCS.NS").await.unwrap().abs() < f64::EPSILON);
        assert!(db.has_feedback(first).await.unwrap());
    }

    #[tokio::test]
    async fn test_feedback_errors() {
        let db = db().await;
        assert!(matches!(db.record_feedback(42, 1.0, 2.0).await, Err(StockError::NotFound(_))));

        let rec = seeded(&db, "TCS.NS", 100.0).await;
        db.record_feedback(rec, 110.0, 2.0).await.unwrap();
        assert!(matches!(db.record_feedback(rec, 110.0, 2.0).await, Err(StockError::Duplicate(_))));
        // the rejected duplicate left stats alone
        assert_eq!(db.ticker_stats("TCS.NS").await.unwrap().unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_all_stats_ordering() {
        let db = db().await;
        for (ticker, exit) in [("A.NS", 90.0), ("B.NS", 120.0)] {
            let rec = seeded(&db, ticker, 100.0).await;
            db.record_feedback(rec, exit, 2.0).await.unwrap();
        }
        let stats = db.all_stats().await.unwrap();
        assert_eq!(stats[0].ticker, "B.NS");
        assert_eq!(stats[1].ticker, "A.NS");
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("learn.db").display());
        {
            let db = LearningDb::open(&url).await.unwrap();
            seeded(&db, "TCS.NS", 100.0).await;
        }
        let db = LearningDb::open(&url).await.unwrap();
        assert_eq!(db.recent_runs(10).await.unwrap().len(), 1);
    }
}

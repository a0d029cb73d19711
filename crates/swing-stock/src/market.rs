//! Market data: candles, symbol normalisation and the Yahoo Finance client

use crate::cache::{CacheKey, StockCache};
use crate::config::{SwingConfig, backoff_delay};
use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};
use yahoo_finance_api as yahoo;

/// One daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Candle {
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// History window requested from the data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryRange {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl HistoryRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryRange::OneMonth => "1mo",
            HistoryRange::ThreeMonths => "3mo",
            HistoryRange::SixMonths => "6mo",
            HistoryRange::OneYear => "1y",
            HistoryRange::TwoYears => "2y",
            HistoryRange::FiveYears => "5y",
        }
    }

    /// Calendar days covered by the range
    pub fn days(&self) -> i64 {
        match self {
            HistoryRange::OneMonth => 30,
            HistoryRange::ThreeMonths => 90,
            HistoryRange::SixMonths => 180,
            HistoryRange::OneYear => 365,
            HistoryRange::TwoYears => 730,
            HistoryRange::FiveYears => 1825,
        }
    }
}

impl fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryRange {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1mo" => Ok(HistoryRange::OneMonth),
            "3mo" => Ok(HistoryRange::ThreeMonths),
            "6mo" => Ok(HistoryRange::SixMonths),
            "1y" => Ok(HistoryRange::OneYear),
            "2y" => Ok(HistoryRange::TwoYears),
            "5y" => Ok(HistoryRange::FiveYears),
            other => Err(StockError::ConfigError(format!("Invalid range: {other}"))),
        }
    }
}

/// Map user input to a Yahoo symbol
///
/// `NSE:RELIANCE` becomes `RELIANCE.NS`, `BSE:500325` becomes `500325.BO`.
/// Index symbols (`^NSEI`) and symbols that already carry an exchange suffix
/// are left alone; anything else gets `default_suffix`.
pub fn normalize_symbol(raw: &str, default_suffix: &str) -> String {
    let symbol = raw.trim().to_uppercase();

    if let Some(rest) = symbol.strip_prefix("NSE:") {
        return format!("{}.NS", rest.trim());
    }
    if let Some(rest) = symbol.strip_prefix("BSE:") {
        return format!("{}.BO", rest.trim());
    }
    if symbol.starts_with('^') || symbol.contains('.') {
        return symbol;
    }
    format!("{symbol}{default_suffix}")
}

/// Symbol without its exchange suffix (`TCS.NS` → `TCS`)
pub fn base_symbol(symbol: &str) -> &str {
    symbol.split('.').next().unwrap_or(symbol)
}

/// Anything that can supply daily candles
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Daily candles, oldest first
    async fn history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<Candle>>;

    /// Most recent close
    async fn latest_close(&self, symbol: &str) -> Result<f64> {
        let candles = self.history(symbol, HistoryRange::OneMonth).await?;
        candles
            .last()
            .map(|c| c.close)
            .ok_or_else(|| StockError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "empty price history".to_string(),
            })
    }
}

/// Yahoo Finance backed price source with caching and retries
#[derive(Clone)]
pub struct MarketDataClient {
    cache: StockCache,
    max_retries: u32,
    backoff_base: Duration,
}

impl MarketDataClient {
    pub fn new(cache: StockCache, config: &SwingConfig) -> Self {
        Self {
            cache,
            max_retries: config.network.max_retries,
            backoff_base: config.retry_backoff(0),
        }
    }

    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<Candle>> {
        let provider = yahoo::YahooConnector::new()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        let end = Utc::now();
        let start = end - chrono::Duration::days(range.days());
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| StockError::YahooFinanceError(format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| StockError::YahooFinanceError(format!("Invalid end timestamp: {e}")))?;

        let response = provider
            .get_quote_history(symbol, start_odt, end_odt)
            .await
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        // Yahoo pads holidays with zero rows
        let candles: Vec<Candle> = quotes
            .iter()
            .filter(|q| q.close > 0.0 && q.high > 0.0)
            .map(|q| Candle {
                timestamp: DateTime::from_timestamp(q.timestamp as i64, 0).unwrap_or_else(Utc::now),
                open: q.open,
                high: q.high,
                low: q.low,
                close: q.close,
                volume: q.volume,
            })
            .collect();

        if candles.is_empty() {
            return Err(StockError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "No historical data available".to_string(),
            });
        }
        Ok(candles)
    }
}

#[async_trait]
impl PriceSource for MarketDataClient {
    #[instrument(skip(self), fields(range = %range))]
    async fn history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<Candle>> {
        let key = CacheKey::history(symbol, range.as_str());
        if let Some(candles) = self.cache.get_as::<Vec<Candle>>(&key).await {
            debug!(bars = candles.len(), "Using cached history");
            return Ok(candles);
        }

        let mut attempt = 0;
        let candles = loop {
            match self.fetch_history(symbol, range).await {
                Ok(candles) => break candles,
                // Missing data will not appear on retry
                Err(e @ StockError::DataUnavailable { .. }) => return Err(e),
                Err(e) if attempt + 1 >= self.max_retries => return Err(e),
                Err(e) => {
                    let delay = backoff_delay(self.backoff_base, attempt);
                    warn!(attempt, error = %e, "History fetch failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        self.cache.insert_as(key, &candles).await;
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("reliance", ".NS"), "RELIANCE.NS");
        assert_eq!(normalize_symbol(" NSE:tcs ", ".NS"), "TCS.NS");
        assert_eq!(normalize_symbol("BSE:500325", ".NS"), "500325.BO");
        assert_eq!(normalize_symbol("INFY.BO", ".NS"), "INFY.BO");
        assert_eq!(normalize_symbol("^NSEI", ".NS"), "^NSEI");
        assert_eq!(normalize_symbol("hdfcbank", ".BO"), "HDFCBANK.BO");
    }

    #[test]
    fn test_base_symbol() {
        assert_eq!(base_symbol("TCS.NS"), "TCS");
        assert_eq!(base_symbol("^NSEI"), "^NSEI");
    }

    #[test]
    fn test_history_range_parse() {
        assert_eq!("6mo".parse::<HistoryRange>().unwrap(), HistoryRange::SixMonths);
        assert_eq!(HistoryRange::FiveYears.to_string(), "5y");
        assert!("10d".parse::<HistoryRange>().is_err());
        assert_eq!(
            serde_json::to_string(&HistoryRange::OneYear).unwrap(),
            "\"1y\""
        );
    }

    #[test]
    fn test_candle_shape() {
        let hammer = Candle {
            timestamp: Utc::now(),
            open: 100.0,
            high: 101.0,
            low: 90.0,
            close: 100.5,
            volume: 1000,
        };
        assert!(hammer.is_bullish());
        assert!((hammer.body() - 0.5).abs() < 1e-9);
        assert!((hammer.lower_wick() - 10.0).abs() < 1e-9);
        assert!((hammer.upper_wick() - 0.5).abs() < 1e-9);
    }

    struct Fixed(Vec<Candle>);

    #[async_trait]
    impl PriceSource for Fixed {
        async fn history(&self, _symbol: &str, _range: HistoryRange) -> Result<Vec<Candle>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_latest_close_default() {
        let candle = |close: f64| Candle {
            timestamp: Utc::now(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1,
        };
        let source = Fixed(vec![candle(10.0), candle(12.5)]);
        assert!((source.latest_close("X.NS").await.unwrap() - 12.5).abs() < 1e-9);

        let empty = Fixed(Vec::new());
        assert!(matches!(
            empty.latest_close("X.NS").await,
            Err(StockError::DataUnavailable { .. })
        ));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_yahoo_history() {
        let client = MarketDataClient::new(
            StockCache::new(Duration::from_secs(60)),
            &SwingConfig::default(),
        );
        let candles = client.history("RELIANCE.NS", HistoryRange::ThreeMonths).await.unwrap();
        assert!(candles.len() > 30);
        assert!(client.latest_close("RELIANCE.NS").await.unwrap() > 0.0);
    }
}

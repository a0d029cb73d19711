//! Technical snapshot computed from daily candles

use crate::error::{Result, StockError};
use crate::market::Candle;
use serde::{Deserialize, Serialize};
use ta::indicators::{
    AverageTrueRange, BollingerBands, MovingAverageConvergenceDivergence, RelativeStrengthIndex,
    SimpleMovingAverage,
};
use ta::{DataItem, Next};

/// Bars required before a snapshot is meaningful
pub const MIN_BARS: usize = 30;

/// Indicator values as of the last bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub close: f64,
    pub prev_close: f64,
    pub rsi: f64,
    pub rsi_prev3: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub bb_percent: f64,
    pub sma5: f64,
    pub sma20: f64,
    pub sma50: f64,
    /// `None` when fewer than 200 bars are available
    pub sma200: Option<f64>,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub macd_hist_prev: f64,
    pub atr: f64,
    pub atr_pct: f64,
    pub volume_ratio: f64,
    pub avg_volume20: f64,
    pub high_60: f64,
    pub low_60: f64,
    pub high_252: f64,
    pub low_252: f64,
    /// Bars since `high_60` was printed
    pub days_from_high: usize,
    pub return_1d: f64,
    pub return_5d: f64,
    pub return_20d: f64,
    pub last_candle: Candle,
    pub prior_candle: Candle,
    /// Lowest low of the five bars before the last one
    pub min_low_prev5: f64,
}

fn run<I: Next<f64, Output = f64>>(mut indicator: I, closes: &[f64]) -> Vec<f64> {
    closes.iter().map(|&c| indicator.next(c)).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn pct_change(from: f64, to: f64) -> f64 {
    if from == 0.0 { 0.0 } else { (to - from) / from * 100.0 }
}

fn tail<T>(values: &[T], n: usize) -> &[T] {
    &values[values.len().saturating_sub(n)..]
}

/// ta rejects bars where open/close fall outside high/low, which split-adjusted
/// Yahoo rows occasionally do
fn data_item(c: &Candle) -> Result<DataItem> {
    let high = c.high.max(c.open).max(c.close);
    let low = c.low.min(c.open).min(c.close);
    Ok(DataItem::builder()
        .open(c.open)
        .high(high)
        .low(low)
        .close(c.close)
        .volume(c.volume as f64)
        .build()?)
}

impl TechnicalSnapshot {
    /// Compute the snapshot from candles ordered oldest first
    pub fn compute(candles: &[Candle]) -> Result<Self> {
        let n = candles.len();
        if n < MIN_BARS {
            return Err(StockError::InsufficientData {
                needed: MIN_BARS,
                got: n,
            });
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume as f64).collect();
        let last = &candles[n - 1];
        let close = last.close;

        let rsi = run(RelativeStrengthIndex::new(14)?, &closes);
        let sma5 = run(SimpleMovingAverage::new(5)?, &closes);
        let sma20 = run(SimpleMovingAverage::new(20)?, &closes);
        let sma50 = run(SimpleMovingAverage::new(50)?, &closes);
        let sma200 = if n >= 200 {
            run(SimpleMovingAverage::new(200)?, &closes).last().copied()
        } else {
            None
        };

        let mut bb = BollingerBands::new(20, 2.0)?;
        let bands = closes.iter().map(|&c| bb.next(c)).last();
        let (bb_upper, bb_middle, bb_lower) = bands
            .map(|b| (b.upper, b.average, b.lower))
            .unwrap_or((close, close, close));
        let width = bb_upper - bb_lower;
        let bb_percent = if width > 0.0 { (close - bb_lower) / width } else { 0.5 };

        let mut macd_ind = MovingAverageConvergenceDivergence::new(12, 26, 9)?;
        let macd: Vec<_> = closes.iter().map(|&c| macd_ind.next(c)).collect();
        let macd_last = &macd[n - 1];

        let mut atr_ind = AverageTrueRange::new(14)?;
        let mut atr = 0.0;
        for candle in candles {
            atr = atr_ind.next(&data_item(candle)?);
        }

        let prev20 = &volumes[n.saturating_sub(21)..n - 1];
        let prev_avg = mean(prev20);
        let volume_ratio = if prev_avg > 0.0 { volumes[n - 1] / prev_avg } else { 1.0 };

        let window60 = tail(candles, 60);
        let (high_idx, high_60) = window60
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, c)| if c.high >= acc.1 { (i, c.high) } else { acc });
        let low_60 = window60.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let window252 = tail(candles, 252);
        let high_252 = window252.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let low_252 = window252.iter().map(|c| c.low).fold(f64::MAX, f64::min);

        let min_low_prev5 = candles[n - 6..n - 1]
            .iter()
            .map(|c| c.low)
            .fold(f64::MAX, f64::min);

        let ret = |bars: usize| pct_change(closes[n - 1 - bars], close);

        Ok(Self {
            close,
            prev_close: closes[n - 2],
            rsi: rsi[n - 1],
            rsi_prev3: rsi[n - 4],
            bb_upper,
            bb_middle,
            bb_lower,
            bb_percent,
            sma5: sma5[n - 1],
            sma20: sma20[n - 1],
            sma50: sma50[n - 1],
            sma200,
            macd: macd_last.macd,
            macd_signal: macd_last.signal,
            macd_hist: macd_last.histogram,
            macd_hist_prev: macd[n - 2].histogram,
            atr,
            atr_pct: if close > 0.0 { atr / close * 100.0 } else { 0.0 },
            volume_ratio,
            avg_volume20: mean(tail(&volumes, 20)),
            high_60,
            low_60,
            high_252,
            low_252,
            days_from_high: window60.len() - 1 - high_idx,
            return_1d: ret(1),
            return_5d: ret(5),
            return_20d: ret(20),
            last_candle: last.clone(),
            prior_candle: candles[n - 2].clone(),
            min_low_prev5,
        })
    }

    /// Percent below the 60-bar high
    pub fn depth_pct(&self) -> f64 {
        if self.high_60 > 0.0 {
            ((self.high_60 - self.close) / self.high_60 * 100.0).max(0.0)
        } else {
            0.0
        }
    }

    /// Average daily traded value in rupees
    pub fn turnover(&self) -> f64 {
        self.avg_volume20 * self.close
    }
}

/// Quant score (0-100) blended with the AI news score
pub fn technical_score(s: &TechnicalSnapshot) -> f64 {
    let mut score: f64 = 50.0;

    if (40.0..=60.0).contains(&s.rsi) {
        score += 5.0;
    } else if s.rsi < 30.0 {
        score += 10.0;
    } else if s.rsi > 70.0 {
        score -= 10.0;
    }

    score += if s.close > s.sma20 { 8.0 } else { -5.0 };
    score += if s.close > s.sma50 { 7.0 } else { -5.0 };
    if s.sma200.is_some_and(|sma| s.close > sma) {
        score += 5.0;
    }
    score += if s.macd_hist > 0.0 { 8.0 } else { -4.0 };

    if s.volume_ratio > 1.5 && s.return_1d > 0.0 {
        score += 7.0;
    }
    if s.return_20d < -15.0 {
        score -= 5.0;
    }

    score.clamp(0.0, 100.0)
}

//! Indicator Engine - Technical indicators over a daily price series
//!
//! Computes one value per bar for every indicator:
//! - RSI (Wilder's smoothing)
//! - MACD line (EMA fast - EMA slow)
//! - Bollinger Bands (upper / lower)
//! - ATR (Average True Range, Wilder's smoothing)
//!
//! Bars without enough lookback are filled from the nearest defined value
//! (forward fill, then backward fill), so the frame never drops a row.

use serde::{Deserialize, Serialize};

use crate::types::{FeatureRow, PriceSeries};

/// Neutral RSI used for columns that never became defined
pub const NEUTRAL_RSI: f64 = 50.0;

/// Indicator periods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub atr_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
        }
    }
}

/// Price series extended with indicator columns, aligned 1:1 by bar
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    pub series: PriceSeries,
    pub rsi: Vec<f64>,
    pub macd: Vec<f64>,
    pub bb_high: Vec<f64>,
    pub bb_low: Vec<f64>,
    pub atr: Vec<f64>,
}

impl IndicatorFrame {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.series.closes()
    }

    /// (RSI, MACD, ATR) for bar `idx`
    pub fn feature_row(&self, idx: usize) -> Option<FeatureRow> {
        if idx >= self.len() {
            return None;
        }
        Some(FeatureRow::new(self.rsi[idx], self.macd[idx], self.atr[idx]))
    }

    pub fn feature_rows(&self) -> Vec<FeatureRow> {
        (0..self.len())
            .map(|i| FeatureRow::new(self.rsi[i], self.macd[i], self.atr[i]))
            .collect()
    }

    pub fn last_feature_row(&self) -> Option<FeatureRow> {
        self.len().checked_sub(1).and_then(|i| self.feature_row(i))
    }

    pub fn latest_rsi(&self) -> Option<f64> {
        self.rsi.last().copied().filter(|v| v.is_finite())
    }

    pub fn mean_atr(&self) -> f64 {
        if self.atr.is_empty() {
            return 0.0;
        }
        self.atr.iter().sum::<f64>() / self.atr.len() as f64
    }
}

/// Stateless indicator calculator
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Derive every indicator column for `series`
    pub fn compute(&self, series: &PriceSeries) -> IndicatorFrame {
        let closes = series.closes();

        let rsi = fill_gaps(self.compute_rsi(&closes), NEUTRAL_RSI);
        let macd = fill_gaps(self.compute_macd(&closes), 0.0);
        let (upper, lower) = self.compute_bollinger(&closes);
        let bb_high = fill_gaps(upper, 0.0);
        let bb_low = fill_gaps(lower, 0.0);
        let atr = fill_gaps(self.compute_atr(series), 0.0);

        tracing::debug!(
            bars = series.len(),
            latest_rsi = rsi.last().copied().unwrap_or(NEUTRAL_RSI),
            "Indicators computed"
        );

        IndicatorFrame {
            series: series.clone(),
            rsi,
            macd,
            bb_high,
            bb_low,
            atr,
        }
    }

    /// RSI using Wilder's smoothing, defined from index `period - 1`
    fn compute_rsi(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let period = self.config.rsi_period.max(1);
        let alpha = 1.0 / period as f64;
        let mut out = vec![None; closes.len()];

        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 0..closes.len() {
            let change = if i == 0 { 0.0 } else { closes[i] - closes[i - 1] };
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            if i == 0 {
                avg_gain = gain;
                avg_loss = loss;
            } else {
                avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
                avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
            }

            if i + 1 >= period {
                let rsi = if avg_loss == 0.0 {
                    100.0
                } else {
                    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
                };
                out[i] = Some(rsi);
            }
        }
        out
    }

    /// MACD line, defined once the slow EMA has `macd_slow` bars
    fn compute_macd(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let fast = ema(closes, self.config.macd_fast);
        let slow = ema(closes, self.config.macd_slow);
        fast.iter()
            .zip(slow.iter())
            .map(|(f, s)| match (f, s) {
                (Some(f), Some(s)) => Some(f - s),
                _ => None,
            })
            .collect()
    }

    /// Bollinger Bands (upper, lower) with population standard deviation
    fn compute_bollinger(&self, closes: &[f64]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
        let period = self.config.bb_period.max(1);
        let multiplier = self.config.bb_std_dev;
        let mut upper = vec![None; closes.len()];
        let mut lower = vec![None; closes.len()];

        for end in period..=closes.len() {
            let window = &closes[end - period..end];
            let sma = window.iter().sum::<f64>() / period as f64;
            let variance =
                window.iter().map(|p| (p - sma).powi(2)).sum::<f64>() / period as f64;
            let std = variance.sqrt();
            upper[end - 1] = Some(sma + multiplier * std);
            lower[end - 1] = Some(sma - multiplier * std);
        }

        (upper, lower)
    }

    /// ATR: mean of the first `period` true ranges, then Wilder's smoothing
    fn compute_atr(&self, series: &PriceSeries) -> Vec<Option<f64>> {
        let period = self.config.atr_period.max(1);
        let bars = &series.bars;
        let mut out = vec![None; bars.len()];
        if bars.len() < period {
            return out;
        }

        let true_ranges: Vec<f64> = bars
            .iter()
            .enumerate()
            .map(|(i, curr)| {
                if i == 0 {
                    curr.high - curr.low
                } else {
                    let prev_close = bars[i - 1].close;
                    (curr.high - curr.low)
                        .max((curr.high - prev_close).abs())
                        .max((curr.low - prev_close).abs())
                }
            })
            .collect();

        let mut atr = true_ranges[..period].iter().sum::<f64>() / period as f64;
        out[period - 1] = Some(atr);
        for i in period..bars.len() {
            atr = (atr * (period as f64 - 1.0) + true_ranges[i]) / period as f64;
            out[i] = Some(atr);
        }
        out
    }
}

/// Recursive EMA seeded with the first value, defined from index `period - 1`
fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let period = period.max(1);
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut out = vec![None; values.len()];
    let mut current = match values.first() {
        Some(v) => *v,
        None => return out,
    };

    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            current = (value - current) * multiplier + current;
        }
        if i + 1 >= period {
            out[i] = Some(current);
        }
    }
    out
}

/// Forward fill, then backward fill; a column with no defined value becomes `neutral`
pub fn fill_gaps(values: Vec<Option<f64>>, neutral: f64) -> Vec<f64> {
    let mut filled: Vec<Option<f64>> = Vec::with_capacity(values.len());
    let mut last = None;
    for v in values {
        let v = v.filter(|x| x.is_finite());
        if v.is_some() {
            last = v;
        }
        filled.push(v.or(last));
    }

    let first_defined = filled.iter().flatten().next().copied();
    filled
        .into_iter()
        .map(|v| v.or(first_defined).unwrap_or(neutral))
        .collect()
}

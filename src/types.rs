//! Core types used throughout Pricecast
//!
//! Price history, indicator rows, forecast requests/responses and market snapshots.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ForecastError, Result};

/// Longest forecast horizon accepted by the pipeline
pub const MAX_HORIZON: u32 = 30;
/// Horizon used when a request omits `days`
pub const DEFAULT_HORIZON: u32 = 7;

/// Instrument symbol: trimmed, uppercase, `[A-Z0-9-]+`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(raw: &str) -> Result<Self> {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ForecastError::Validation(
                "Missing required parameters".to_string(),
            ));
        }
        let valid = symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(ForecastError::Validation(
                "Invalid ticker symbol format".to_string(),
            ));
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number of forecast steps, always within `1..=MAX_HORIZON`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Horizon(u32);

impl Horizon {
    pub fn new(days: u32) -> Result<Self> {
        if !(1..=MAX_HORIZON).contains(&days) {
            return Err(ForecastError::Validation(format!(
                "Days must be between 1 and {}",
                MAX_HORIZON
            )));
        }
        Ok(Self(days))
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Daily OHLC bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Daily bars ascending by date.
///
/// Assumed contiguous in trading days; gaps and duplicate dates are not repaired.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        Self { bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }
}

/// Input row of the tree forecaster
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureRow {
    pub rsi: f64,
    pub macd: f64,
    pub atr: f64,
}

impl FeatureRow {
    pub const NUM_FEATURES: usize = 3;

    pub fn new(rsi: f64, macd: f64, atr: f64) -> Self {
        Self { rsi, macd, atr }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.rsi, self.macd, self.atr]
    }

    pub fn feature_names() -> Vec<&'static str> {
        vec!["rsi", "macd", "atr"]
    }
}

// ============================================================================
// Forecast request / response
// ============================================================================

/// Incoming forecast request (wire shape of `POST /predict`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastRequest {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub days: Option<i64>,
    #[serde(rename = "startDate", default)]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", default)]
    pub end_date: Option<String>,
}

impl ForecastRequest {
    pub fn new(ticker: &str, days: i64, start_date: &str, end_date: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            days: Some(days),
            start_date: Some(start_date.to_string()),
            end_date: Some(end_date.to_string()),
        }
    }

    /// Check every field; nothing is fetched or trained for an invalid request
    pub fn validate(&self) -> Result<ValidatedRequest> {
        let missing = || ForecastError::Validation("Missing required parameters".to_string());

        let start_raw = self.start_date.clone().filter(|s| !s.is_empty());
        let end_raw = self.end_date.clone().filter(|s| !s.is_empty());
        let days = self.days.unwrap_or(DEFAULT_HORIZON as i64);
        let (Some(start_raw), Some(end_raw)) = (start_raw, end_raw) else {
            return Err(missing());
        };
        if self.ticker.trim().is_empty() || days == 0 {
            return Err(missing());
        }

        let ticker = Ticker::parse(&self.ticker)?;
        let days = u32::try_from(days).map_err(|_| {
            ForecastError::Validation(format!("Days must be between 1 and {}", MAX_HORIZON))
        })?;
        let horizon = Horizon::new(days)?;
        let start = parse_date(&start_raw)?;
        let end = parse_date(&end_raw)?;

        Ok(ValidatedRequest {
            ticker,
            horizon,
            start_date: start_raw,
            end_date: end_raw,
            start,
            end,
        })
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| {
            ForecastError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", raw))
        })
}

/// Request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub ticker: Ticker,
    pub horizon: Horizon,
    /// Date strings exactly as supplied (part of the cache key)
    pub start_date: String,
    pub end_date: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ValidatedRequest {
    pub fn cache_key(&self) -> ForecastKey {
        ForecastKey {
            ticker: self.ticker.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            horizon: self.horizon,
        }
    }
}

/// Literal memoization key: no date normalization
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForecastKey {
    pub ticker: Ticker,
    pub start_date: String,
    pub end_date: String,
    pub horizon: Horizon,
}

impl fmt::Display for ForecastKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.ticker, self.start_date, self.end_date, self.horizon
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// First to last forecast step (%)
    pub trend: f64,
    /// Coefficient of variation of the forecast (%)
    pub volatility: f64,
    /// Latest RSI of the history
    pub rsi: f64,
    pub sentiment: f64,
}

/// Complete forecast response; immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub ticker: String,
    pub historical: Vec<f64>,
    pub predictions: Vec<f64>,
    pub metrics: ForecastMetrics,
}

// ============================================================================
// Market snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub value: f64,
    /// Open to close (%)
    pub change: f64,
    pub forecast: Vec<f64>,
    /// First to last forecast step (%)
    pub trend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoverQuote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopMovers {
    pub gainers: Vec<MoverQuote>,
    pub losers: Vec<MoverQuote>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Display name → snapshot
    pub indices: BTreeMap<String, IndexSnapshot>,
    pub movers: TopMovers,
}

// ============================================================================
// News
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    #[serde(rename = "publishedAt")]
    pub published_at: String,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
}

/// Round to two decimals, as every reported metric is
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

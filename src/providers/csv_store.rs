//! File-backed history: one `<TICKER>.csv` per instrument
//!
//! Expected header: `Date,Open,High,Low,Close` (extra columns such as Volume are ignored).

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::{HistoryProvider, ProviderResult};
use crate::error::ProviderError;
use crate::types::{PriceBar, PriceSeries, Ticker};

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
}

pub struct CsvHistoryStore {
    dir: PathBuf,
}

impl CsvHistoryStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, ticker: &Ticker) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker.as_str()))
    }

    fn read_all(path: &Path) -> ProviderResult<Vec<PriceBar>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut bars = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row?;
            // Dates may carry a time suffix ("2024-01-02 00:00:00-05:00")
            let day = row.date.get(..10).unwrap_or(&row.date);
            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map_err(|e| ProviderError::Parse(format!("bad date '{}': {}", row.date, e)))?;
            bars.push(PriceBar {
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
            });
        }
        Ok(bars)
    }
}

#[async_trait]
impl HistoryProvider for CsvHistoryStore {
    async fn get_history(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<PriceSeries> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Err(ProviderError::NotFound(ticker.to_string()));
        }

        let bars = tokio::task::spawn_blocking(move || Self::read_all(&path))
            .await
            .map_err(|e| ProviderError::Io(e.to_string()))??;

        let bars: Vec<PriceBar> = bars
            .into_iter()
            .filter(|b| b.date >= start && b.date < end)
            .collect();
        tracing::debug!(ticker = %ticker, bars = bars.len(), "Loaded CSV history");

        if bars.is_empty() {
            return Err(ProviderError::NotFound(ticker.to_string()));
        }
        Ok(PriceSeries::new(bars))
    }
}

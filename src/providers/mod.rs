//! External collaborators (market data, sentiment, news)
//!
//! Each concern is a trait so services can be driven by any implementation;
//! the adapters here are thin HTTP / file clients.

mod alpha_vantage;
mod csv_store;
mod stocktwits;
mod yahoo;

pub use alpha_vantage::AlphaVantageNewsClient;
pub use csv_store::CsvHistoryStore;
pub use stocktwits::StockTwitsClient;
pub use yahoo::YahooFinanceClient;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;

use crate::error::ProviderError;
use crate::types::{MoverQuote, NewsItem, PriceSeries, Ticker};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Daily OHLC history for a ticker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Bars with `start <= date < end`; `NotFound` when there are none
    async fn get_history(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<PriceSeries>;
}

/// Index history and quotes for the market overview
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Recent daily history, `period` like "6mo" or "1y"
    async fn get_index_history(&self, symbol: &str, period: &str) -> ProviderResult<PriceSeries>;

    /// Latest session quote per symbol; symbols that fail are left out
    async fn get_universe_quotes(&self, symbols: &[String]) -> ProviderResult<Vec<MoverQuote>>;
}

/// Aggregate social sentiment in [-1, 1]
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    async fn sentiment_score(&self, ticker: &Ticker) -> ProviderResult<f64>;
}

/// Recent news, optionally about one ticker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn recent_items(&self, ticker: Option<Ticker>) -> ProviderResult<Vec<NewsItem>>;
}

/// Shared HTTP client settings for all adapters
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("Mozilla/5.0 (compatible; pricecast/", env!("CARGO_PKG_VERSION"), ")"))
        .build()
        .unwrap_or_default()
}

//! Yahoo Finance chart API client
//!
//! One endpoint serves both daily history (`period1`/`period2` or `range`) and the
//! latest session quote used for top movers.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use futures_util::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{http_client, HistoryProvider, MarketDataProvider, ProviderResult};
use crate::error::ProviderError;
use crate::types::{round2, MoverQuote, PriceBar, PriceSeries, Ticker};

pub struct YahooFinanceClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "longName")]
    long_name: Option<String>,
    #[serde(rename = "shortName")]
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Parsed chart: bars plus display name
struct Chart {
    series: PriceSeries,
    name: Option<String>,
}

fn parse_chart(symbol: &str, body: ChartResponse) -> ProviderResult<Chart> {
    if let Some(err) = body.chart.error {
        return Err(if err.code.eq_ignore_ascii_case("Not Found") {
            ProviderError::NotFound(symbol.to_string())
        } else {
            ProviderError::Parse(format!(
                "{}: {}",
                err.code,
                err.description.unwrap_or_default()
            ))
        });
    }

    let result = body
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    // Rows with any missing column (halts, partial sessions) are skipped
    let bars: Vec<PriceBar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some(PriceBar {
                date,
                open: (*quote.open.get(i)?)?,
                high: (*quote.high.get(i)?)?,
                low: (*quote.low.get(i)?)?,
                close: (*quote.close.get(i)?)?,
            })
        })
        .collect();

    if bars.is_empty() {
        return Err(ProviderError::NotFound(symbol.to_string()));
    }

    Ok(Chart {
        series: PriceSeries::new(bars),
        name: result.meta.long_name.or(result.meta.short_name),
    })
}

/// Open-to-close change of the latest session (%)
fn session_quote(symbol: &str, chart: &Chart) -> Option<MoverQuote> {
    let first = chart.series.first()?;
    let last = chart.series.last()?;
    if first.open == 0.0 {
        return None;
    }
    Some(MoverQuote {
        symbol: symbol.to_string(),
        name: chart.name.clone().unwrap_or_else(|| symbol.to_string()),
        price: round2(last.close),
        change: round2((last.close - first.open) / first.open * 100.0),
    })
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

impl YahooFinanceClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_chart(&self, symbol: &str, params: &[(&str, String)]) -> ProviderResult<Chart> {
        let url = format!("{}/{}", self.base_url, symbol);
        let response = self.client.get(&url).query(params).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(symbol.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(symbol, %status, "Chart request failed");
            return Err(ProviderError::Network(format!("{} - {}", status, body)));
        }

        let body: ChartResponse = response.json().await?;
        let chart = parse_chart(symbol, body)?;
        debug!(symbol, bars = chart.series.len(), "Fetched chart");
        Ok(chart)
    }
}

#[async_trait]
impl HistoryProvider for YahooFinanceClient {
    async fn get_history(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<PriceSeries> {
        if end <= start {
            return Err(ProviderError::NotFound(ticker.to_string()));
        }
        let params = [
            ("period1", unix_midnight(start).to_string()),
            ("period2", unix_midnight(end).to_string()),
            ("interval", "1d".to_string()),
        ];
        let chart = self.fetch_chart(ticker.as_str(), &params).await?;

        // period2 is not a strict bound on Yahoo's side
        let bars: Vec<PriceBar> = chart
            .series
            .bars
            .into_iter()
            .filter(|b| b.date >= start && b.date < end)
            .collect();
        if bars.is_empty() {
            return Err(ProviderError::NotFound(ticker.to_string()));
        }
        Ok(PriceSeries::new(bars))
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceClient {
    async fn get_index_history(&self, symbol: &str, period: &str) -> ProviderResult<PriceSeries> {
        let params = [("range", period.to_string()), ("interval", "1d".to_string())];
        Ok(self.fetch_chart(symbol, &params).await?.series)
    }

    async fn get_universe_quotes(&self, symbols: &[String]) -> ProviderResult<Vec<MoverQuote>> {
        let params = [("range", "1d".to_string()), ("interval", "1d".to_string())];
        let fetches = symbols.iter().map(|symbol| {
            let params = &params;
            async move {
                match self.fetch_chart(symbol, params).await {
                    Ok(chart) => session_quote(symbol, &chart),
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Quote fetch failed, skipping");
                        None
                    }
                }
            }
        });

        let quotes: Vec<MoverQuote> = join_all(fetches).await.into_iter().flatten().collect();
        if quotes.is_empty() && !symbols.is_empty() {
            return Err(ProviderError::Network("no quotes could be fetched".to_string()));
        }
        Ok(quotes)
    }
}

//! Market snapshot: index values with short forecasts plus top movers
//!
//! The whole snapshot lives in one cache slot; a fresh slot short-circuits every
//! fetch and training run.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::error::{ForecastError, Result};
use crate::ml_engine::ForecastPipeline;
use crate::providers::MarketDataProvider;
use crate::types::{round2, IndexSnapshot, MarketSnapshot, MoverQuote, TopMovers};

/// (symbol, display name) of every tracked index
pub const TRACKED_INDICES: [(&str, &str); 4] = [
    ("^GSPC", "S&P 500"),
    ("^IXIC", "NASDAQ"),
    ("^DJI", "DOW"),
    ("^RUT", "RUSSELL 2000"),
];

/// Large caps scanned for top movers
pub const MOVER_UNIVERSE: [&str; 20] = [
    "AAPL", "MSFT", "AMZN", "NVDA", "GOOGL", "META", "BRK-B", "XOM", "UNH", "JNJ", "JPM", "V",
    "PG", "MA", "HD", "CVX", "MRK", "ABBV", "LLY", "PFE",
];

#[derive(Debug, Clone)]
pub struct MarketOptions {
    /// History window per index, e.g. "6mo"
    pub period: String,
    pub forecast_steps: usize,
    pub top_n: usize,
    pub ttl: Duration,
}

impl Default for MarketOptions {
    fn default() -> Self {
        Self {
            period: "6mo".to_string(),
            forecast_steps: 5,
            top_n: 5,
            ttl: Duration::from_secs(300),
        }
    }
}

/// Split quotes into gainers (change > 0, descending) and the rest (ascending)
pub fn rank_movers(quotes: Vec<MoverQuote>, top_n: usize) -> TopMovers {
    let (mut gainers, mut losers): (Vec<MoverQuote>, Vec<MoverQuote>) =
        quotes.into_iter().partition(|q| q.change > 0.0);
    gainers.sort_by(|a, b| b.change.total_cmp(&a.change));
    losers.sort_by(|a, b| a.change.total_cmp(&b.change));
    gainers.truncate(top_n);
    losers.truncate(top_n);
    TopMovers { gainers, losers }
}

pub struct MarketSnapshotService {
    provider: Arc<dyn MarketDataProvider>,
    pipeline: ForecastPipeline,
    options: MarketOptions,
    cache: TtlCache<(), Arc<MarketSnapshot>>,
}

impl MarketSnapshotService {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        pipeline: ForecastPipeline,
        options: MarketOptions,
    ) -> Self {
        let cache = TtlCache::new(Some(1), Some(options.ttl));
        Self {
            provider,
            pipeline,
            options,
            cache,
        }
    }

    pub async fn snapshot(&self) -> Result<Arc<MarketSnapshot>> {
        if let Some(hit) = self.cache.get(&()).await {
            debug!("Market snapshot cache hit");
            return Ok(hit);
        }

        let index_jobs = TRACKED_INDICES.iter().map(|(symbol, name)| async move {
            (*name, self.index_snapshot(symbol).await)
        });
        let (index_results, movers) = tokio::join!(join_all(index_jobs), self.top_movers());

        let mut indices = BTreeMap::new();
        for (name, result) in index_results {
            match result {
                Ok(snapshot) => {
                    indices.insert(name.to_string(), snapshot);
                }
                Err(e) => warn!(index = name, error = %e, "Index skipped"),
            }
        }

        if indices.is_empty() {
            return Err(ForecastError::MarketDataUnavailable);
        }

        info!(
            indices = indices.len(),
            gainers = movers.gainers.len(),
            losers = movers.losers.len(),
            "Market snapshot refreshed"
        );
        let snapshot = Arc::new(MarketSnapshot { indices, movers });
        self.cache.insert((), Arc::clone(&snapshot)).await;
        Ok(snapshot)
    }

    async fn index_snapshot(&self, symbol: &str) -> Result<IndexSnapshot> {
        let series = self
            .provider
            .get_index_history(symbol, &self.options.period)
            .await?;
        let last = *series
            .last()
            .ok_or_else(|| ForecastError::NotFound(symbol.to_string()))?;
        let change = if last.open != 0.0 {
            (last.close - last.open) / last.open * 100.0
        } else {
            0.0
        };

        let pipeline = self.pipeline.clone();
        let steps = self.options.forecast_steps;
        let owned_symbol = symbol.to_string();
        let forecast = tokio::task::spawn_blocking(move || {
            pipeline.sequence_forecast(&owned_symbol, &series, steps)
        })
        .await
        .map_err(|e| ForecastError::Model(format!("index forecast task failed: {}", e)))??;

        let trend = match (forecast.first(), forecast.last()) {
            (Some(first), Some(last)) if *first != 0.0 => (last - first) / first * 100.0,
            _ => 0.0,
        };

        Ok(IndexSnapshot {
            value: round2(last.close),
            change: round2(change),
            forecast: forecast.into_iter().map(round2).collect(),
            trend: round2(trend),
        })
    }

    async fn top_movers(&self) -> TopMovers {
        let universe: Vec<String> = MOVER_UNIVERSE.iter().map(|s| s.to_string()).collect();
        match self.provider.get_universe_quotes(&universe).await {
            Ok(quotes) => rank_movers(quotes, self.options.top_n),
            Err(e) => {
                warn!(error = %e, "Top movers unavailable");
                TopMovers::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::ml_engine::models::{SequenceModel, TreeModel};
    use crate::ml_engine::ForecastEngineConfig;
    use crate::providers::MockMarketDataProvider;
    use crate::types::{FeatureRow, PriceBar, PriceSeries};
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use ndarray::{Array1, Array2};

    struct Step;

    impl SequenceModel for Step {
        fn train(&mut self, _: &Array2<f64>, _: &Array1<f64>) -> Result<()> {
            Ok(())
        }
        fn predict_one(&self, window: &[f64]) -> Result<f64> {
            Ok(window.last().copied().unwrap_or(0.0) + 0.01)
        }
        fn name(&self) -> &str {
            "step"
        }
    }

    struct Unused;

    impl TreeModel for Unused {
        fn train(&mut self, _: &[FeatureRow], _: &[f64]) -> Result<()> {
            Ok(())
        }
        fn predict_one(&self, _: &FeatureRow) -> Result<f64> {
            Ok(0.0)
        }
        fn name(&self) -> &str {
            "unused"
        }
    }

    fn quote(symbol: &str, change: f64) -> MoverQuote {
        MoverQuote {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            price: 10.0,
            change,
        }
    }

    fn history(n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PriceSeries::new(
            (0..n)
                .map(|i| {
                    let close = 4000.0 + i as f64 * 5.0;
                    PriceBar {
                        date: start + ChronoDuration::days(i as i64),
                        open: close - 10.0,
                        high: close + 5.0,
                        low: close - 15.0,
                        close,
                    }
                })
                .collect(),
        )
    }

    fn service(provider: MockMarketDataProvider) -> MarketSnapshotService {
        let pipeline = ForecastPipeline::with_models(
            &ForecastEngineConfig::default(),
            Arc::new(|| Box::new(Step) as Box<dyn SequenceModel>),
            Arc::new(|| Box::new(Unused) as Box<dyn TreeModel>),
        );
        MarketSnapshotService::new(Arc::new(provider), pipeline, MarketOptions::default())
    }

    #[test]
    fn test_rank_movers() {
        let quotes = vec![
            quote("A", 1.5),
            quote("B", -2.0),
            quote("C", 0.0),
            quote("D", 3.2),
            quote("E", -0.5),
        ];
        let movers = rank_movers(quotes, 5);
        let gainers: Vec<&str> = movers.gainers.iter().map(|q| q.symbol.as_str()).collect();
        let losers: Vec<&str> = movers.losers.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(gainers, vec!["D", "A"]);
        assert_eq!(losers, vec!["B", "E", "C"]);
    }

    #[test]
    fn test_rank_movers_truncates() {
        let quotes: Vec<MoverQuote> = (0..12)
            .map(|i| quote(&i.to_string(), i as f64 - 5.5))
            .collect();
        let movers = rank_movers(quotes, 5);
        assert_eq!(movers.gainers.len(), 5);
        assert_eq!(movers.losers.len(), 5);
        assert_eq!(movers.gainers[0].change, 5.5);
        assert_eq!(movers.losers[0].change, -5.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_cached_for_ttl() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_get_index_history()
            .times(8)
            .returning(|_, _| Ok(history(120)));
        provider
            .expect_get_universe_quotes()
            .times(2)
            .returning(|_| Ok(vec![quote("AAPL", 1.0), quote("PFE", -1.0)]));

        let svc = service(provider);
        let first = svc.snapshot().await.unwrap();
        assert_eq!(first.indices.len(), 4);
        let sp = &first.indices["S&P 500"];
        assert_eq!(sp.forecast.len(), 5);
        assert!(sp.trend > 0.0);
        assert_eq!(sp.value, 4595.0);

        tokio::time::advance(Duration::from_secs(120)).await;
        let cached = svc.snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&first, &cached));

        tokio::time::advance(Duration::from_secs(200)).await;
        let refreshed = svc.snapshot().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &refreshed));
    }

    #[tokio::test]
    async fn test_failed_index_skipped_and_movers_degrade() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_get_index_history()
            .returning(|symbol, _| {
                if symbol == "^RUT" {
                    Err(ProviderError::Network("down".to_string()))
                } else if symbol == "^DJI" {
                    Ok(history(30))
                } else {
                    Ok(history(90))
                }
            });
        provider
            .expect_get_universe_quotes()
            .returning(|_| Err(ProviderError::Network("down".to_string())));

        let svc = service(provider);
        let snapshot = svc.snapshot().await.unwrap();
        let names: Vec<&str> = snapshot.indices.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["NASDAQ", "S&P 500"]);
        assert!(snapshot.movers.gainers.is_empty());
        assert!(snapshot.movers.losers.is_empty());
    }

    #[tokio::test]
    async fn test_all_indices_failing_is_not_cached() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_get_index_history()
            .times(8)
            .returning(|symbol, _| Err(ProviderError::NotFound(symbol.to_string())));
        provider.expect_get_universe_quotes().returning(|_| Ok(vec![]));

        let svc = service(provider);
        assert_eq!(svc.snapshot().await.unwrap_err(), ForecastError::MarketDataUnavailable);
        assert_eq!(svc.snapshot().await.unwrap_err(), ForecastError::MarketDataUnavailable);
    }
}

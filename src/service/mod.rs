//! Request-level services and their wiring
//!
//! `Services::from_config` is the composition root: it picks provider adapters,
//! sizes caches and hands every service the same engine configuration.

mod forecast;
mod market;
mod news;

pub use forecast::{forecast_metrics, ForecastService, ForecastServiceOptions};
pub use market::{
    rank_movers, MarketOptions, MarketSnapshotService, MOVER_UNIVERSE, TRACKED_INDICES,
};
pub use news::NewsService;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::ForecastCache;
use crate::config::AppConfig;
use crate::ml_engine::{EngineConfigConvertible, ForecastPipeline};
use crate::providers::{
    AlphaVantageNewsClient, CsvHistoryStore, HistoryProvider, StockTwitsClient, YahooFinanceClient,
};

/// Every service behind the CLI and the HTTP API
pub struct Services {
    pub forecast: ForecastService,
    pub market: MarketSnapshotService,
    pub news: NewsService,
}

/// 0 means "no bound" in config
fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Services {
    pub fn from_config(config: &AppConfig) -> Self {
        let engine = config.to_engine_config();
        let pipeline = ForecastPipeline::new(&engine);
        let providers = &config.providers;
        let timeout = providers.request_timeout_secs;

        let yahoo = Arc::new(YahooFinanceClient::new(&providers.yahoo_base_url, timeout));
        let history: Arc<dyn HistoryProvider> = match providers.history.as_str() {
            "csv" => Arc::new(CsvHistoryStore::new(&providers.csv_dir)),
            _ => yahoo.clone() as Arc<dyn HistoryProvider>,
        };

        let api_key = AppConfig::alpha_vantage_api_key();
        if api_key.is_none() {
            tracing::warn!("ALPHA_VANTAGE_API_KEY not set, news feed will be empty");
        }

        let cache = Arc::new(ForecastCache::new(
            Some(config.cache.forecast_capacity),
            non_zero_secs(config.cache.forecast_ttl_secs),
        ));

        let forecast = ForecastService::new(
            history,
            Arc::new(StockTwitsClient::new(&providers.stocktwits_base_url, timeout)),
            pipeline.clone(),
            engine.sentiment,
            cache,
            ForecastServiceOptions {
                min_history: config.forecast.min_history,
                sentiment_capacity: config.cache.sentiment_capacity,
                sentiment_ttl: Duration::from_secs(config.cache.sentiment_ttl_secs),
            },
        );

        let market = MarketSnapshotService::new(
            yahoo,
            pipeline,
            MarketOptions {
                period: config.market.period.clone(),
                forecast_steps: config.market.forecast_steps,
                top_n: config.market.top_n,
                ttl: Duration::from_secs(config.cache.market_ttl_secs),
            },
        );

        let news = NewsService::new(
            Arc::new(AlphaVantageNewsClient::new(
                &providers.alpha_vantage_base_url,
                api_key,
                timeout,
                providers.news_limit,
            )),
            Duration::from_secs(config.cache.news_ttl_secs),
        );

        info!(history = %providers.history, "Services ready");
        Self {
            forecast,
            market,
            news,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_means_unbounded() {
        assert_eq!(non_zero_secs(0), None);
        assert_eq!(non_zero_secs(5), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_from_default_config() {
        let config = AppConfig::defaults().unwrap();
        let services = Services::from_config(&config);
        assert_eq!(services.forecast.cache().len().await, 0);
    }
}

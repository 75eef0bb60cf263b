//! Forecast service: validation, memoization, history, training, sentiment, metrics

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::{ForecastCache, TtlCache};
use crate::error::{ForecastError, ProviderError, Result};
use crate::ml_engine::{ForecastPipeline, SentimentAdjuster};
use crate::providers::{HistoryProvider, SentimentProvider};
use crate::types::{
    round2, ForecastMetrics, ForecastRequest, ForecastResult, Ticker, ValidatedRequest,
};

/// Trend, volatility, RSI and sentiment of a finished forecast, each rounded to 2 decimals
pub fn forecast_metrics(predictions: &[f64], latest_rsi: f64, sentiment: f64) -> ForecastMetrics {
    let (trend, volatility) = match (predictions.first(), predictions.last()) {
        (Some(first), Some(last)) if *first != 0.0 => {
            let n = predictions.len() as f64;
            let mean = predictions.iter().sum::<f64>() / n;
            let variance = predictions.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
            let volatility = if mean != 0.0 {
                variance.sqrt() / mean * 100.0
            } else {
                0.0
            };
            ((last - first) / first * 100.0, volatility)
        }
        _ => (0.0, 0.0),
    };

    ForecastMetrics {
        trend: round2(trend),
        volatility: round2(volatility),
        rsi: round2(latest_rsi),
        sentiment: round2(sentiment),
    }
}

#[derive(Debug, Clone)]
pub struct ForecastServiceOptions {
    /// Fewer bars than this is `InsufficientData`
    pub min_history: usize,
    /// Memoized sentiment scores kept
    pub sentiment_capacity: usize,
    /// How long a memoized score is reused before the provider is asked again
    pub sentiment_ttl: Duration,
}

impl Default for ForecastServiceOptions {
    fn default() -> Self {
        Self {
            min_history: 60,
            sentiment_capacity: 100,
            sentiment_ttl: Duration::from_secs(900),
        }
    }
}

pub struct ForecastService {
    history: Arc<dyn HistoryProvider>,
    sentiment: Arc<dyn SentimentProvider>,
    pipeline: ForecastPipeline,
    adjuster: SentimentAdjuster,
    cache: Arc<ForecastCache>,
    sentiment_memo: TtlCache<Ticker, f64>,
    min_history: usize,
}

impl ForecastService {
    pub fn new(
        history: Arc<dyn HistoryProvider>,
        sentiment: Arc<dyn SentimentProvider>,
        pipeline: ForecastPipeline,
        adjuster: SentimentAdjuster,
        cache: Arc<ForecastCache>,
        options: ForecastServiceOptions,
    ) -> Self {
        Self {
            history,
            sentiment,
            pipeline,
            adjuster,
            cache,
            sentiment_memo: TtlCache::new(
                Some(options.sentiment_capacity.max(1)),
                Some(options.sentiment_ttl),
            ),
            min_history: options.min_history,
        }
    }

    pub fn cache(&self) -> &Arc<ForecastCache> {
        &self.cache
    }

    /// Validate, then serve from cache or compute
    pub async fn forecast(&self, request: &ForecastRequest) -> Result<Arc<ForecastResult>> {
        let request = request.validate()?;
        self.forecast_validated(request).await
    }

    pub async fn forecast_validated(
        &self,
        request: ValidatedRequest,
    ) -> Result<Arc<ForecastResult>> {
        info!(
            ticker = %request.ticker,
            horizon = %request.horizon,
            start = %request.start_date,
            end = %request.end_date,
            "Forecast requested"
        );
        self.cache
            .get_or_compute(request.cache_key(), || self.compute(&request))
            .await
    }

    async fn compute(&self, request: &ValidatedRequest) -> Result<ForecastResult> {
        let ticker = &request.ticker;
        let series = match self.history.get_history(ticker, request.start, request.end).await {
            Ok(series) => series,
            Err(ProviderError::NotFound(_)) => {
                return Err(ForecastError::NotFound(ticker.to_string()))
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "History fetch failed");
                return Err(ForecastError::Collaborator(e));
            }
        };

        if series.is_empty() {
            return Err(ForecastError::NotFound(ticker.to_string()));
        }
        if series.len() < self.min_history {
            return Err(ForecastError::InsufficientData {
                ticker: ticker.to_string(),
                required: self.min_history,
                available: series.len(),
            });
        }

        let pipeline = self.pipeline.clone();
        let symbol = ticker.to_string();
        let horizon = request.horizon;
        let output = tokio::task::spawn_blocking(move || pipeline.run(&symbol, &series, horizon))
            .await
            .map_err(|e| ForecastError::Model(format!("forecast task failed: {}", e)))??;

        let sentiment = self.sentiment_for(ticker).await;
        let predictions = self.adjuster.apply(&output.blended, sentiment);
        let metrics = forecast_metrics(&predictions, output.latest_rsi, sentiment);

        info!(
            ticker = %ticker,
            history = output.historical.len(),
            horizon = predictions.len(),
            trend = metrics.trend,
            sentiment = metrics.sentiment,
            "Forecast computed"
        );

        Ok(ForecastResult {
            ticker: ticker.to_string(),
            historical: output.historical,
            predictions,
            metrics,
        })
    }

    /// Memoized clamped score; provider failures degrade to neutral and are not memoized
    async fn sentiment_for(&self, ticker: &Ticker) -> f64 {
        if let Some(score) = self.sentiment_memo.get(ticker).await {
            return score;
        }
        match self.sentiment.sentiment_score(ticker).await {
            Ok(score) => {
                let score = SentimentAdjuster::clamp_score(score);
                self.sentiment_memo.insert(ticker.clone(), score).await;
                score
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Sentiment unavailable, using neutral");
                0.0
            }
        }
    }
}

//! Integration tests for the forecast pipeline and service

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use ndarray::{Array1, Array2};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    use pricecast::cache::ForecastCache;
    use pricecast::error::{ForecastError, ProviderError, Result};
    use pricecast::features::{IndicatorConfig, IndicatorEngine};
    use pricecast::ml_engine::models::{BoostingConfig, SequenceForecasterConfig};
    use pricecast::ml_engine::rollout::proxy_row;
    use pricecast::ml_engine::{
        EnsembleWeights, ForecastEngineConfig, ForecastPipeline, Normalizer, SentimentAdjuster,
        SequenceModel, TreeDataset, TreeForecaster, TreeModel, WindowedDataset,
    };
    use pricecast::providers::{HistoryProvider, ProviderResult, SentimentProvider};
    use pricecast::service::{ForecastService, ForecastServiceOptions};
    use pricecast::types::{FeatureRow, ForecastRequest, Horizon, PriceBar, PriceSeries, Ticker};

    // ============================================================================
    // Fixtures
    // ============================================================================

    /// Steep rise for 30 bars, then a gentle one; high/low = close ± 2
    fn rising_series(n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = (0..n)
            .map(|i| {
                let close = if i < 30 {
                    100.0 + 2.0 * i as f64
                } else {
                    158.0 + 0.5 * (i as f64 - 29.0)
                };
                PriceBar {
                    date: start + Duration::days(i as i64),
                    open: close,
                    high: close + 2.0,
                    low: close - 2.0,
                    close,
                }
            })
            .collect();
        PriceSeries::new(bars)
    }

    /// Straight line `100 + i`; high/low = close ± 2
    fn linear_series(n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                PriceBar {
                    date: start + Duration::days(i as i64),
                    open: close,
                    high: close + 2.0,
                    low: close - 2.0,
                    close,
                }
            })
            .collect();
        PriceSeries::new(bars)
    }

    /// Adds one full normalized range per step
    struct Ramp;

    impl SequenceModel for Ramp {
        fn train(&mut self, _: &Array2<f64>, _: &Array1<f64>) -> Result<()> {
            Ok(())
        }
        fn predict_one(&self, window: &[f64]) -> Result<f64> {
            Ok(window.last().copied().unwrap_or(0.0) + 1.0)
        }
        fn name(&self) -> &str {
            "ramp"
        }
    }

    fn ramp_pipeline() -> ForecastPipeline {
        let config = ForecastEngineConfig::default();
        let tree = config.tree.clone();
        ForecastPipeline::with_models(
            &config,
            Arc::new(|| Box::new(Ramp) as Box<dyn SequenceModel>),
            Arc::new(move || Box::new(TreeForecaster::new(tree.clone())) as Box<dyn TreeModel>),
        )
    }

    struct CountingHistory {
        series: PriceSeries,
        calls: AtomicUsize,
    }

    impl CountingHistory {
        fn new(series: PriceSeries) -> Arc<Self> {
            Arc::new(Self {
                series,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HistoryProvider for CountingHistory {
        async fn get_history(
            &self,
            ticker: &Ticker,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> ProviderResult<PriceSeries> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if ticker.as_str() == "MISSING" {
                return Err(ProviderError::NotFound(ticker.to_string()));
            }
            Ok(self.series.clone())
        }
    }

    struct FixedSentiment(f64);

    #[async_trait]
    impl SentimentProvider for FixedSentiment {
        async fn sentiment_score(&self, _ticker: &Ticker) -> ProviderResult<f64> {
            Ok(self.0)
        }
    }

    fn service(history: Arc<CountingHistory>, sentiment: f64) -> ForecastService {
        ForecastService::new(
            history,
            Arc::new(FixedSentiment(sentiment)),
            ramp_pipeline(),
            SentimentAdjuster::default(),
            Arc::new(ForecastCache::default()),
            ForecastServiceOptions::default(),
        )
    }

    // ============================================================================
    // Datasets
    // ============================================================================

    #[test]
    fn test_windowed_dataset_shape_and_range() {
        let closes = rising_series(120).closes();
        let dataset = WindowedDataset::build(&closes, 60, (0.0, 1.0)).unwrap();

        assert_eq!(dataset.len(), 60);
        assert_eq!(dataset.windows.dim(), (60, 60));
        assert_eq!(dataset.seed_window.len(), 60);
        assert!(dataset.windows.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(dataset.targets.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_normalizer_round_trip() {
        let closes = rising_series(120).closes();
        let normalizer = Normalizer::fit(&closes, (0.0, 1.0)).unwrap();
        for close in &closes {
            let back = normalizer.inverse(normalizer.transform(*close));
            assert!((back - close).abs() < 1e-9, "{} -> {}", close, back);
        }
    }

    #[test]
    fn test_feature_label_mismatch_is_integrity_error() {
        let rows = vec![FeatureRow::new(50.0, 0.0, 1.0); 3];
        let err = TreeDataset::new(rows.clone(), vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ForecastError::DataIntegrity(_)));

        let mut model = TreeForecaster::new(BoostingConfig::default());
        let err = model.train(&rows, &[1.0]).unwrap_err();
        assert!(matches!(err, ForecastError::DataIntegrity(_)));
    }

    // ============================================================================
    // Ensemble & sentiment
    // ============================================================================

    #[test]
    fn test_blend_weights() {
        let weights = EnsembleWeights::default();
        assert_eq!(weights.blend_one(100.0, 90.0), 96.0);
        assert!(matches!(
            weights.blend(&[1.0, 2.0], &[1.0]),
            Err(ForecastError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_sentiment_factor() {
        let adjuster = SentimentAdjuster::default();
        let forecast = [100.0, 200.0];
        assert_eq!(adjuster.apply(&forecast, 0.0), forecast.to_vec());
        let up = adjuster.apply(&forecast, 1.0);
        let down = adjuster.apply(&forecast, -1.0);
        assert!((up[0] - 110.0).abs() < 1e-9 && (up[1] - 220.0).abs() < 1e-9);
        assert!((down[0] - 90.0).abs() < 1e-9 && (down[1] - 180.0).abs() < 1e-9);
    }

    // ============================================================================
    // Rollout through the pipeline
    // ============================================================================

    #[test]
    fn test_rollout_length_matches_every_horizon() {
        let pipeline = ramp_pipeline();
        let series = rising_series(90);
        for days in [1u32, 2, 7, 15, 30] {
            let output = pipeline.run("AAPL", &series, Horizon::new(days).unwrap()).unwrap();
            assert_eq!(output.blended.len(), days as usize);
            assert_eq!(output.rollout.sequence.len(), days as usize);
            assert_eq!(output.rollout.tree.len(), days as usize);
        }
    }

    #[test]
    fn test_tree_uses_proxy_row_after_first_step() {
        let series = rising_series(120);
        let frame = IndicatorEngine::new(IndicatorConfig::default()).compute(&series);
        let output = ramp_pipeline()
            .run("AAPL", &series, Horizon::new(5).unwrap())
            .unwrap();

        let inputs = &output.rollout.tree_inputs;
        assert_eq!(inputs[0], frame.last_feature_row().unwrap());
        for row in &inputs[1..] {
            assert_eq!(*row, proxy_row(frame.mean_atr()));
            assert_eq!(row.rsi, 50.0);
            assert_eq!(row.macd, 0.0);
        }

        // Identical inputs give identical tree forecasts
        let tree = &output.rollout.tree;
        assert!(tree[1..].iter().all(|t| *t == tree[1]));
    }

    #[test]
    fn test_real_models_produce_finite_forecast() {
        let config = ForecastEngineConfig {
            lookback: 10,
            sequence: SequenceForecasterConfig {
                hidden_1: 8,
                hidden_2: 8,
                dense_units: 4,
                epochs: 3,
                batch_size: 16,
                ..SequenceForecasterConfig::default()
            },
            tree: BoostingConfig {
                n_rounds: 10,
                ..BoostingConfig::default()
            },
            ..ForecastEngineConfig::default()
        };
        let pipeline = ForecastPipeline::new(&config);

        let output = pipeline
            .run("AAPL", &rising_series(60), Horizon::new(3).unwrap())
            .unwrap();
        assert_eq!(output.blended.len(), 3);
        assert!(output.blended.iter().all(|p| p.is_finite()));
        assert_eq!(output.historical.len(), 60);
    }

    #[test]
    fn test_real_tree_collapses_onto_proxy_row() {
        let config = ForecastEngineConfig {
            sequence: SequenceForecasterConfig {
                hidden_1: 8,
                hidden_2: 8,
                dense_units: 4,
                epochs: 2,
                ..SequenceForecasterConfig::default()
            },
            ..ForecastEngineConfig::default()
        };
        let series = linear_series(120);
        let last_close = *series.closes().last().unwrap();

        let output = ForecastPipeline::new(&config)
            .run("AAPL", &series, Horizon::new(5).unwrap())
            .unwrap();
        let tree = &output.rollout.tree;

        // Step one sees the real last row, whose MACD is the largest in history
        assert!((tree[0] - last_close).abs() < 2.0, "tree: {:?}", tree);

        // MACD 0 sits below every training row, so the proxy lands with the
        // earliest bars (labels 101..=126) and stays there
        assert!(tree[1..].iter().all(|t| *t == tree[1]), "tree: {:?}", tree);
        assert!((tree[1] - 113.5).abs() < 1.0, "tree: {:?}", tree);
        assert!(tree[1] < tree[0]);
        assert!(output.blended.iter().all(|p| p.is_finite()));
    }

    // ============================================================================
    // Service: validation, errors, cache
    // ============================================================================

    #[tokio::test]
    async fn test_out_of_range_horizon_rejected_before_fetch() {
        let history = CountingHistory::new(rising_series(120));
        let svc = service(Arc::clone(&history), 0.0);

        for days in [0, 31] {
            let request = ForecastRequest::new("AAPL", days, "2024-01-01", "2024-06-01");
            let err = assert_err!(svc.forecast(&request).await);
            assert!(matches!(err, ForecastError::Validation(_)));
        }
        assert_eq!(history.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_ticker_not_found() {
        let history = CountingHistory::new(rising_series(120));
        let svc = service(history, 0.0);

        let request = ForecastRequest::new("missing", 5, "2024-01-01", "2024-06-01");
        let err = assert_err!(svc.forecast(&request).await);
        assert_eq!(err, ForecastError::NotFound("MISSING".to_string()));
        assert_eq!(err.to_string(), "No data found for ticker MISSING");
    }

    #[tokio::test]
    async fn test_cache_hit_and_field_changes() {
        let history = CountingHistory::new(rising_series(120));
        let svc = service(Arc::clone(&history), 0.0);

        let request = ForecastRequest::new("AAPL", 5, "2024-01-01", "2024-06-01");
        let first = assert_ok!(svc.forecast(&request).await);
        let again = assert_ok!(svc.forecast(&request).await);
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(history.calls(), 1);

        let variants = [
            ForecastRequest::new("MSFT", 5, "2024-01-01", "2024-06-01"),
            ForecastRequest::new("AAPL", 6, "2024-01-01", "2024-06-01"),
            ForecastRequest::new("AAPL", 5, "2024-01-02", "2024-06-01"),
            ForecastRequest::new("AAPL", 5, "2024-01-01", "2024-06-02"),
        ];
        for (i, variant) in variants.iter().enumerate() {
            assert_ok!(svc.forecast(variant).await);
            assert_eq!(history.calls(), i + 2);
        }
        assert_eq!(svc.cache().len().await, 5);
    }

    // ============================================================================
    // End to end
    // ============================================================================

    #[tokio::test]
    async fn test_service_forecast_with_trending_sequence_model() {
        let history = CountingHistory::new(rising_series(120));
        let svc = service(history, 0.0);

        let request = ForecastRequest::new("AAPL", 5, "2024-01-01", "2024-05-01");
        let result = assert_ok!(svc.forecast(&request).await);

        assert_eq!(result.ticker, "AAPL");
        assert_eq!(result.historical.len(), 120);
        assert_eq!(result.predictions.len(), 5);
        assert!(
            result.predictions.windows(2).all(|w| w[1] > w[0]),
            "predictions not increasing: {:?}",
            result.predictions
        );
        assert!(result.metrics.trend > 0.0);
        assert_eq!(result.metrics.rsi, 100.0);
        assert_eq!(result.metrics.sentiment, 0.0);
    }

    #[tokio::test]
    async fn test_end_to_end_sentiment_scales_forecast() {
        let neutral = assert_ok!(
            service(CountingHistory::new(rising_series(120)), 0.0)
                .forecast(&ForecastRequest::new("AAPL", 3, "2024-01-01", "2024-05-01"))
                .await
        );
        let bullish = assert_ok!(
            service(CountingHistory::new(rising_series(120)), 1.0)
                .forecast(&ForecastRequest::new("AAPL", 3, "2024-01-01", "2024-05-01"))
                .await
        );

        for (n, b) in neutral.predictions.iter().zip(&bullish.predictions) {
            assert!((b - n * 1.1).abs() < 1e-6, "{} vs {}", b, n);
        }
        assert_eq!(bullish.metrics.sentiment, 1.0);
    }
}

//! Forecast pipeline: indicators → datasets → training → rollout → blend
//!
//! Every run trains fresh model instances; nothing learned survives the call.
//! The whole run is CPU-bound and meant to execute on the blocking pool.

use super::dataset::{TreeDataset, WindowedDataset};
use super::models::{
    sequence_factory, tree_factory, EnsembleWeights, SequenceModelFactory, TreeModelFactory,
};
use super::rollout::{Rollout, RolloutEngine};
use super::ForecastEngineConfig;
use crate::error::{ForecastError, Result};
use crate::features::{IndicatorEngine, NEUTRAL_RSI};
use crate::types::{Horizon, PriceSeries};

/// Result of one pipeline run, before sentiment adjustment
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Input closes
    pub historical: Vec<f64>,
    pub rollout: Rollout,
    /// Weighted combination of both forecasts
    pub blended: Vec<f64>,
    /// Last RSI of the history (neutral when undefined)
    pub latest_rsi: f64,
}

#[derive(Clone)]
pub struct ForecastPipeline {
    indicators: IndicatorEngine,
    lookback: usize,
    feature_range: (f64, f64),
    weights: EnsembleWeights,
    sequence_models: SequenceModelFactory,
    tree_models: TreeModelFactory,
}

impl ForecastPipeline {
    pub fn new(config: &ForecastEngineConfig) -> Self {
        Self::with_models(
            config,
            sequence_factory(config.sequence.clone()),
            tree_factory(config.tree.clone()),
        )
    }

    /// Same pipeline with caller-provided model constructors
    pub fn with_models(
        config: &ForecastEngineConfig,
        sequence_models: SequenceModelFactory,
        tree_models: TreeModelFactory,
    ) -> Self {
        Self {
            indicators: IndicatorEngine::new(config.indicators.clone()),
            lookback: config.lookback,
            feature_range: config.feature_range,
            weights: config.weights,
            sequence_models,
            tree_models,
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn weights(&self) -> EnsembleWeights {
        self.weights
    }

    /// Full ensemble forecast for `horizon` steps
    pub fn run(
        &self,
        ticker: &str,
        series: &PriceSeries,
        horizon: Horizon,
    ) -> Result<PipelineOutput> {
        let frame = self.indicators.compute(series);
        let closes = frame.closes();

        let dataset = WindowedDataset::build(&closes, self.lookback, self.feature_range)?;
        if dataset.is_empty() {
            return Err(self.insufficient(ticker, closes.len()));
        }
        let tree_data = TreeDataset::from_frame_columns(&frame.feature_rows(), &closes)?;
        let last_row = frame
            .last_feature_row()
            .ok_or_else(|| ForecastError::DataIntegrity("empty indicator frame".to_string()))?;

        let mut sequence_model = (self.sequence_models)();
        sequence_model.train(&dataset.windows, &dataset.targets)?;

        let mut tree_model = (self.tree_models)();
        tree_model.train(&tree_data.features, &tree_data.labels)?;

        tracing::debug!(
            ticker,
            windows = dataset.len(),
            tree_rows = tree_data.len(),
            sequence_model = sequence_model.name(),
            tree_model = tree_model.name(),
            "Models trained"
        );

        let rollout = RolloutEngine::new(&dataset.normalizer).run(
            sequence_model.as_ref(),
            tree_model.as_ref(),
            &dataset.seed_window,
            last_row,
            frame.mean_atr(),
            horizon,
        )?;
        let blended = self.weights.blend(&rollout.sequence, &rollout.tree)?;

        Ok(PipelineOutput {
            historical: closes,
            rollout,
            blended,
            latest_rsi: frame.latest_rsi().unwrap_or(NEUTRAL_RSI),
        })
    }

    /// Sequence-model-only forecast, used for index snapshots
    pub fn sequence_forecast(
        &self,
        symbol: &str,
        series: &PriceSeries,
        steps: usize,
    ) -> Result<Vec<f64>> {
        let frame = self.indicators.compute(series);
        let closes = frame.closes();

        let dataset = WindowedDataset::build(&closes, self.lookback, self.feature_range)?;
        if dataset.is_empty() {
            return Err(self.insufficient(symbol, closes.len()));
        }

        let mut model = (self.sequence_models)();
        model.train(&dataset.windows, &dataset.targets)?;
        tracing::debug!(
            symbol,
            windows = dataset.len(),
            latest_rsi = frame.latest_rsi().unwrap_or(NEUTRAL_RSI),
            "Sequence model trained"
        );

        RolloutEngine::new(&dataset.normalizer).sequence_only(
            model.as_ref(),
            &dataset.seed_window,
            steps,
        )
    }

    fn insufficient(&self, ticker: &str, available: usize) -> ForecastError {
        ForecastError::InsufficientData {
            ticker: ticker.to_string(),
            required: self.lookback + 1,
            available,
        }
    }
}

//! ML Engine - Ensemble price forecasting
//!
//! This module implements:
//! - Windowed / tabular dataset construction with min-max normalization
//! - LSTM sequence forecaster and gradient-boosted tree forecaster
//! - Multi-step rollout and weighted ensemble
//! - Sentiment adjustment of the final forecast

pub mod config_bridge;
pub mod dataset;
pub mod models;
pub mod predictor;
pub mod rollout;
pub mod sentiment;

pub use config_bridge::EngineConfigConvertible;
pub use dataset::{Normalizer, TreeDataset, WindowedDataset};
pub use models::{
    BoostingConfig, EnsembleWeights, SequenceForecaster, SequenceForecasterConfig, SequenceModel,
    TreeForecaster, TreeModel,
};
pub use predictor::{ForecastPipeline, PipelineOutput};
pub use rollout::{Rollout, RolloutEngine};
pub use sentiment::SentimentAdjuster;

use serde::{Deserialize, Serialize};

use crate::features::IndicatorConfig;

/// Global configuration of the forecasting engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastEngineConfig {
    pub indicators: IndicatorConfig,
    /// Window length of the sequence model
    pub lookback: usize,
    /// Normalizer target range
    pub feature_range: (f64, f64),
    pub sequence: SequenceForecasterConfig,
    pub tree: BoostingConfig,
    pub weights: EnsembleWeights,
    pub sentiment: SentimentAdjuster,
}

impl Default for ForecastEngineConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorConfig::default(),
            lookback: 60,
            feature_range: (0.0, 1.0),
            sequence: SequenceForecasterConfig::default(),
            tree: BoostingConfig::default(),
            weights: EnsembleWeights::default(),
            sentiment: SentimentAdjuster::default(),
        }
    }
}

//! ML Engine Configuration Bridge
//!
//! Converts the loaded `AppConfig` sections into a `ForecastEngineConfig`,
//! so engine knobs can come from config files and environment variables.

use crate::config::AppConfig;
use crate::features::IndicatorConfig;
use crate::ml_engine::{
    BoostingConfig, EnsembleWeights, ForecastEngineConfig, SentimentAdjuster,
    SequenceForecasterConfig,
};

/// Conversion from the config system into the engine configuration
pub trait EngineConfigConvertible {
    fn to_engine_config(&self) -> ForecastEngineConfig;
}

impl EngineConfigConvertible for AppConfig {
    fn to_engine_config(&self) -> ForecastEngineConfig {
        let defaults = SequenceForecasterConfig::default();
        ForecastEngineConfig {
            indicators: IndicatorConfig {
                rsi_period: self.features.rsi_period,
                macd_fast: self.features.macd_fast,
                macd_slow: self.features.macd_slow,
                bb_period: self.features.bb_period,
                bb_std_dev: self.features.bb_std_dev,
                atr_period: self.features.atr_period,
            },
            lookback: self.forecast.lookback,
            feature_range: (self.forecast.range_min, self.forecast.range_max),
            sequence: SequenceForecasterConfig {
                hidden_1: self.sequence.hidden_1,
                hidden_2: self.sequence.hidden_2,
                dense_units: self.sequence.dense_units,
                dropout: self.sequence.dropout,
                epochs: self.sequence.epochs,
                batch_size: self.sequence.batch_size,
                learning_rate: self.sequence.learning_rate,
                seed: self.sequence.seed,
                // Adam moments are not exposed
                ..defaults
            },
            tree: BoostingConfig {
                n_rounds: self.tree.n_rounds,
                learning_rate: self.tree.learning_rate,
                max_depth: self.tree.max_depth,
                min_samples_leaf: self.tree.min_samples_leaf,
            },
            weights: EnsembleWeights::new(self.forecast.sequence_weight, self.forecast.tree_weight),
            sentiment: SentimentAdjuster::new(self.forecast.sentiment_strength),
        }
    }
}

impl EngineConfigConvertible for Option<AppConfig> {
    fn to_engine_config(&self) -> ForecastEngineConfig {
        match self {
            Some(config) => config.to_engine_config(),
            None => {
                tracing::warn!("No application config loaded, using engine defaults");
                ForecastEngineConfig::default()
            }
        }
    }
}

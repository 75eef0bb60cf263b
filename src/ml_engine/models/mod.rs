//! Forecasting models
//!
//! Two heterogeneous forecasters trained per request:
//! - `lstm`: stacked LSTM over windows of normalized closes
//! - `boosting`: gradient-boosted regression trees over (RSI, MACD, ATR)
//!
//! Their step outputs are combined with fixed `EnsembleWeights`.

pub mod boosting;
pub mod lstm;

pub use boosting::{BoostingConfig, TreeForecaster};
pub use lstm::{SequenceForecaster, SequenceForecasterConfig};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ForecastError, Result};
use crate::types::FeatureRow;

/// Model over windows of normalized closes; predictions are normalized too
pub trait SequenceModel: Send {
    fn train(&mut self, windows: &Array2<f64>, targets: &Array1<f64>) -> Result<()>;
    fn predict_one(&self, window: &[f64]) -> Result<f64>;
    fn name(&self) -> &str;
}

/// Model over indicator rows; predictions are raw prices
pub trait TreeModel: Send {
    fn train(&mut self, features: &[FeatureRow], labels: &[f64]) -> Result<()>;
    fn predict_one(&self, row: &FeatureRow) -> Result<f64>;
    fn name(&self) -> &str;
}

/// Builds a fresh, untrained sequence model for one request
pub type SequenceModelFactory = Arc<dyn Fn() -> Box<dyn SequenceModel> + Send + Sync>;
/// Builds a fresh, untrained tree model for one request
pub type TreeModelFactory = Arc<dyn Fn() -> Box<dyn TreeModel> + Send + Sync>;

pub fn sequence_factory(config: SequenceForecasterConfig) -> SequenceModelFactory {
    Arc::new(move || Box::new(SequenceForecaster::new(config.clone())) as Box<dyn SequenceModel>)
}

pub fn tree_factory(config: BoostingConfig) -> TreeModelFactory {
    Arc::new(move || Box::new(TreeForecaster::new(config.clone())) as Box<dyn TreeModel>)
}

/// Ensemble weights (applied as-is, not renormalized)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub sequence: f64,
    pub tree: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            sequence: 0.6,
            tree: 0.4,
        }
    }
}

impl EnsembleWeights {
    pub fn new(sequence: f64, tree: f64) -> Self {
        Self { sequence, tree }
    }

    pub fn blend_one(&self, sequence: f64, tree: f64) -> f64 {
        self.sequence * sequence + self.tree * tree
    }

    /// Element-wise blend of two equally long forecasts
    pub fn blend(&self, sequence: &[f64], tree: &[f64]) -> Result<Vec<f64>> {
        if sequence.len() != tree.len() {
            return Err(ForecastError::DataIntegrity(format!(
                "sequence forecast has {} steps, tree forecast {}",
                sequence.len(),
                tree.len()
            )));
        }
        Ok(sequence
            .iter()
            .zip(tree)
            .map(|(s, t)| self.blend_one(*s, *t))
            .collect())
    }
}

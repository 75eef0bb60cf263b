//! Gradient-boosted regression trees using SmartCore
//!
//! Squared-error boosting: start from the mean label, then fit each round's tree
//! to the current residuals and add it scaled by the learning rate.

use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};

use super::TreeModel;
use crate::error::{ForecastError, Result};
use crate::types::FeatureRow;

type RegressionTree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_samples_leaf: 1,
        }
    }
}

/// Boosted tree forecaster over (RSI, MACD, ATR) rows
pub struct TreeForecaster {
    config: BoostingConfig,
    base_score: f64,
    trees: Vec<RegressionTree>,
}

impl TreeForecaster {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            base_score: 0.0,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn params(&self) -> DecisionTreeRegressorParameters {
        DecisionTreeRegressorParameters::default()
            .with_max_depth(self.config.max_depth)
            .with_min_samples_leaf(self.config.min_samples_leaf.max(1))
            .with_min_samples_split(2)
    }
}

/// Convert feature rows to a SmartCore matrix
fn to_dense_matrix(rows: &[FeatureRow]) -> Result<DenseMatrix<f64>> {
    let data: Vec<Vec<f64>> = rows.iter().map(|r| r.to_vec()).collect();
    let slices: Vec<&[f64]> = data.iter().map(|v| v.as_slice()).collect();
    DenseMatrix::from_2d_array(&slices)
        .map_err(|e| ForecastError::Model(format!("feature matrix: {}", e)))
}

impl TreeModel for TreeForecaster {
    fn train(&mut self, features: &[FeatureRow], labels: &[f64]) -> Result<()> {
        if features.len() != labels.len() {
            return Err(ForecastError::DataIntegrity(format!(
                "feature rows ({}) and labels ({}) differ in length",
                features.len(),
                labels.len()
            )));
        }
        if features.is_empty() {
            return Err(ForecastError::Model("no training rows".to_string()));
        }

        let x = to_dense_matrix(features)?;
        let n = labels.len();
        let base_score = labels.iter().sum::<f64>() / n as f64;
        let mut fitted = vec![base_score; n];
        let mut trees = Vec::with_capacity(self.config.n_rounds);
        let params = self.params();

        for round in 0..self.config.n_rounds {
            let residuals: Vec<f64> = labels.iter().zip(&fitted).map(|(y, f)| y - f).collect();

            let tree = RegressionTree::fit(&x, &residuals, params.clone()).map_err(|e| {
                ForecastError::Model(format!("boosting round {} failed: {}", round, e))
            })?;
            let update = tree
                .predict(&x)
                .map_err(|e| ForecastError::Model(format!("boosting round {}: {}", round, e)))?;

            for (f, u) in fitted.iter_mut().zip(update) {
                *f += self.config.learning_rate * u;
            }
            trees.push(tree);
        }

        let mse = labels
            .iter()
            .zip(&fitted)
            .map(|(y, f)| (y - f).powi(2))
            .sum::<f64>()
            / n as f64;
        tracing::debug!(rows = n, rounds = trees.len(), train_mse = mse, "Boosted trees trained");

        self.base_score = base_score;
        self.trees = trees;
        Ok(())
    }

    fn predict_one(&self, row: &FeatureRow) -> Result<f64> {
        if self.trees.is_empty() && self.config.n_rounds > 0 {
            return Err(ForecastError::Model("boosted trees not trained".to_string()));
        }

        let x = to_dense_matrix(std::slice::from_ref(row))?;
        let mut prediction = self.base_score;
        for tree in &self.trees {
            let out = tree
                .predict(&x)
                .map_err(|e| ForecastError::Model(format!("tree inference: {}", e)))?;
            prediction += self.config.learning_rate * out.first().copied().unwrap_or(0.0);
        }
        Ok(prediction)
    }

    fn name(&self) -> &str {
        "GradientBoostedTrees"
    }
}

//! Multi-step rollout
//!
//! The sequence model feeds on its own predictions: each step's output is
//! re-normalized and pushed into the window while the oldest value drops out.
//! The tree model sees the real last indicator row only on the first step; every
//! later step uses the proxy row `(50, 0, mean ATR)`.

use std::collections::VecDeque;

use super::dataset::Normalizer;
use super::models::{SequenceModel, TreeModel};
use crate::error::Result;
use crate::features::NEUTRAL_RSI;
use crate::types::{FeatureRow, Horizon};

/// Forecasts of both models, one value per step
#[derive(Debug, Clone, PartialEq)]
pub struct Rollout {
    /// Sequence forecasts in price units
    pub sequence: Vec<f64>,
    /// Tree forecasts in price units
    pub tree: Vec<f64>,
    /// Row fed to the tree model at each step
    pub tree_inputs: Vec<FeatureRow>,
}

/// Row used for steps after the first, where no real indicators exist
pub fn proxy_row(mean_atr: f64) -> FeatureRow {
    FeatureRow::new(NEUTRAL_RSI, 0.0, mean_atr)
}

pub struct RolloutEngine<'a> {
    normalizer: &'a Normalizer,
}

impl<'a> RolloutEngine<'a> {
    pub fn new(normalizer: &'a Normalizer) -> Self {
        Self { normalizer }
    }

    /// Run both models for `horizon` steps
    pub fn run(
        &self,
        sequence_model: &dyn SequenceModel,
        tree_model: &dyn TreeModel,
        seed_window: &[f64],
        last_row: FeatureRow,
        mean_atr: f64,
        horizon: Horizon,
    ) -> Result<Rollout> {
        let sequence = self.sequence_only(sequence_model, seed_window, horizon.get())?;

        let steps = horizon.get();
        let mut tree = Vec::with_capacity(steps);
        let mut tree_inputs = Vec::with_capacity(steps);
        let mut row = last_row;
        for _ in 0..steps {
            tree.push(tree_model.predict_one(&row)?);
            tree_inputs.push(row);
            row = proxy_row(mean_atr);
        }

        Ok(Rollout {
            sequence,
            tree,
            tree_inputs,
        })
    }

    /// Self-feeding sequence forecast in price units
    pub fn sequence_only(
        &self,
        model: &dyn SequenceModel,
        seed_window: &[f64],
        steps: usize,
    ) -> Result<Vec<f64>> {
        let mut window: VecDeque<f64> = seed_window.iter().copied().collect();
        let mut out = Vec::with_capacity(steps);

        for _ in 0..steps {
            let scaled = model.predict_one(window.make_contiguous())?;
            let price = self.normalizer.inverse(scaled);
            out.push(price);

            window.pop_front();
            window.push_back(self.normalizer.transform(price));
        }

        Ok(out)
    }
}

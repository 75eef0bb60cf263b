//! Dataset - Training sets for the sequence and tree forecasters

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::types::FeatureRow;

/// Min-max scaler fit once per request on the full close series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    data_min: f64,
    data_max: f64,
    range_min: f64,
    range_max: f64,
}

impl Normalizer {
    /// Fit on `values` into `[range.0, range.1]`
    pub fn fit(values: &[f64], range: (f64, f64)) -> Result<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Err(ForecastError::DataIntegrity(
                "cannot fit normalizer on an empty series".to_string(),
            ));
        }
        if finite.len() != values.len() {
            return Err(ForecastError::DataIntegrity(
                "close series contains non-finite values".to_string(),
            ));
        }
        if range.1 <= range.0 {
            return Err(ForecastError::DataIntegrity(format!(
                "invalid feature range ({}, {})",
                range.0, range.1
            )));
        }

        let data_min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let data_max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self {
            data_min,
            data_max,
            range_min: range.0,
            range_max: range.1,
        })
    }

    /// Data range, with a constant series treated as unit range
    fn data_range(&self) -> f64 {
        let range = self.data_max - self.data_min;
        if range == 0.0 {
            1.0
        } else {
            range
        }
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.data_min) / self.data_range() * (self.range_max - self.range_min)
            + self.range_min
    }

    pub fn inverse(&self, scaled: f64) -> f64 {
        (scaled - self.range_min) / (self.range_max - self.range_min) * self.data_range()
            + self.data_min
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.transform(*v)).collect()
    }

    pub fn range(&self) -> (f64, f64) {
        (self.range_min, self.range_max)
    }
}

/// Sliding windows of normalized closes with next-step targets
#[derive(Debug, Clone)]
pub struct WindowedDataset {
    /// n × lookback
    pub windows: Array2<f64>,
    /// n
    pub targets: Array1<f64>,
    pub normalizer: Normalizer,
    /// Last training window, the seed of the rollout. It ends one bar
    /// before the final close, so the first forecast re-predicts that bar.
    pub seed_window: Vec<f64>,
    pub lookback: usize,
}

impl WindowedDataset {
    /// One (window, target) pair per position `lookback..len`
    pub fn build(closes: &[f64], lookback: usize, range: (f64, f64)) -> Result<Self> {
        if lookback == 0 {
            return Err(ForecastError::DataIntegrity(
                "lookback must be positive".to_string(),
            ));
        }

        let normalizer = Normalizer::fit(closes, range)?;
        let scaled = normalizer.transform_all(closes);
        let n = scaled.len().saturating_sub(lookback);

        let mut windows = Array2::zeros((n, lookback));
        let mut targets = Array1::zeros(n);
        for (row, i) in (lookback..scaled.len()).enumerate() {
            for (j, value) in scaled[i - lookback..i].iter().enumerate() {
                windows[[row, j]] = *value;
            }
            targets[row] = scaled[i];
        }

        let seed_window = match n {
            0 => Vec::new(),
            _ => windows.row(n - 1).to_vec(),
        };

        tracing::debug!(samples = n, lookback, "Windowed dataset built");

        Ok(Self {
            windows,
            targets,
            normalizer,
            seed_window,
            lookback,
        })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Indicator rows paired with the next bar's close
#[derive(Debug, Clone)]
pub struct TreeDataset {
    pub features: Vec<FeatureRow>,
    pub labels: Vec<f64>,
}

impl TreeDataset {
    /// Drop the last feature row and shift closes by one bar
    pub fn from_frame_columns(rows: &[FeatureRow], closes: &[f64]) -> Result<Self> {
        if rows.len() != closes.len() {
            return Err(ForecastError::DataIntegrity(format!(
                "{} indicator rows for {} closes",
                rows.len(),
                closes.len()
            )));
        }
        if rows.len() < 2 {
            return Err(ForecastError::DataIntegrity(
                "need at least two bars to pair features with next close".to_string(),
            ));
        }

        Self::new(rows[..rows.len() - 1].to_vec(), closes[1..].to_vec())
    }

    /// Features and labels must line up one-to-one
    pub fn new(features: Vec<FeatureRow>, labels: Vec<f64>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(ForecastError::DataIntegrity(format!(
                "feature rows ({}) and labels ({}) differ in length",
                features.len(),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Convert to ndarray for the models
    pub fn to_ndarray(&self) -> (Array2<f64>, Array1<f64>) {
        let mut x = Array2::zeros((self.features.len(), FeatureRow::NUM_FEATURES));
        for (i, row) in self.features.iter().enumerate() {
            for (j, val) in row.to_vec().into_iter().enumerate() {
                x[[i, j]] = val;
            }
        }
        (x, Array1::from_vec(self.labels.clone()))
    }
}

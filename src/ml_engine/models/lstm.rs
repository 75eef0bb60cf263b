//! Stacked LSTM regressor
//!
//! LSTM(h1, full sequence) → Dropout → LSTM(h2, last state) → Dropout →
//! Dense(d, linear) → Dense(1, linear), trained with Adam on mean squared error.
//! Gate layout inside each LSTM bias is `[input, forget, cell, output]`.

use candle_core::{DType, Device, Tensor};
use candle_nn::{
    linear, loss, lstm, ops, AdamW, LSTMConfig, Linear, Module, Optimizer, ParamsAdamW,
    VarBuilder, VarMap, LSTM, RNN,
};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::SequenceModel;
use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceForecasterConfig {
    pub hidden_1: usize,
    pub hidden_2: usize,
    pub dense_units: usize,
    pub dropout: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub beta_1: f64,
    pub beta_2: f64,
    pub epsilon: f64,
    pub seed: u64,
}

impl Default for SequenceForecasterConfig {
    fn default() -> Self {
        Self {
            hidden_1: 50,
            hidden_2: 50,
            dense_units: 25,
            dropout: 0.2,
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-7,
            seed: 42,
        }
    }
}

fn model_err(err: candle_core::Error) -> ForecastError {
    ForecastError::Model(format!("LSTM: {}", err))
}

// ============================================================================
// Network
// ============================================================================

struct StackedLstm {
    lstm_1: LSTM,
    lstm_2: LSTM,
    dense: Linear,
    output: Linear,
    dropout: f32,
}

impl StackedLstm {
    fn new(config: &SequenceForecasterConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let lstm_1 = lstm(1, config.hidden_1, LSTMConfig::default(), vb.pp("lstm_1"))?;
        let lstm_2 = lstm(
            config.hidden_1,
            config.hidden_2,
            LSTMConfig::default(),
            vb.pp("lstm_2"),
        )?;
        let dense = linear(config.hidden_2, config.dense_units, vb.pp("dense"))?;
        let output = linear(config.dense_units, 1, vb.pp("output"))?;
        Ok(Self {
            lstm_1,
            lstm_2,
            dense,
            output,
            dropout: config.dropout as f32,
        })
    }

    /// `xs` is `(batch, lookback, 1)`; returns `(batch, 1)`.
    fn forward(&self, xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let states = self.lstm_1.seq(xs)?;
        let hidden = self.lstm_1.states_to_tensor(&states)?;
        let hidden = self.apply_dropout(hidden, train)?;

        let states = self.lstm_2.seq(&hidden)?;
        let last = states
            .last()
            .ok_or_else(|| candle_core::Error::Msg("empty input sequence".to_string()))?;
        let last = self.apply_dropout(last.h().clone(), train)?;

        let dense = self.dense.forward(&last)?;
        self.output.forward(&dense)
    }

    fn apply_dropout(&self, xs: Tensor, train: bool) -> candle_core::Result<Tensor> {
        if train && self.dropout > 0.0 {
            ops::dropout(&xs, self.dropout)
        } else {
            Ok(xs)
        }
    }
}

/// Glorot-uniform kernels, zero biases and a forget-gate bias of one,
/// drawn from `rng` so that training is reproducible for a given seed.
fn seed_parameters(varmap: &VarMap, rng: &mut StdRng) -> candle_core::Result<()> {
    let vars = varmap
        .data()
        .lock()
        .map_err(|_| candle_core::Error::Msg("parameter map poisoned".to_string()))?;
    let mut names: Vec<&String> = vars.keys().collect();
    names.sort();

    for name in names {
        let var = &vars[name];
        let dims = var.dims().to_vec();
        let values: Vec<f32> = if name.contains("weight") {
            let fan_out = dims[0];
            let fan_in = dims.get(1).copied().unwrap_or(1);
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            (0..var.elem_count())
                .map(|_| rng.gen_range(-limit..limit) as f32)
                .collect()
        } else if name.ends_with("bias_ih_l0") {
            let hidden = dims[0] / 4;
            (0..dims[0])
                .map(|i| if (hidden..2 * hidden).contains(&i) { 1.0 } else { 0.0 })
                .collect()
        } else {
            vec![0.0; var.elem_count()]
        };
        var.set(&Tensor::from_vec(values, dims.as_slice(), var.device())?)?;
    }
    Ok(())
}

fn batch_tensors(
    windows: &Array2<f64>,
    targets: &Array1<f64>,
    rows: &[usize],
    device: &Device,
) -> candle_core::Result<(Tensor, Tensor)> {
    let lookback = windows.ncols();
    let xs: Vec<f32> = rows
        .iter()
        .flat_map(|&r| windows.row(r).iter().map(|v| *v as f32).collect::<Vec<_>>())
        .collect();
    let ys: Vec<f32> = rows.iter().map(|&r| targets[r] as f32).collect();
    Ok((
        Tensor::from_vec(xs, (rows.len(), lookback, 1), device)?,
        Tensor::from_vec(ys, (rows.len(), 1), device)?,
    ))
}

// ============================================================================
// Forecaster
// ============================================================================

/// LSTM sequence forecaster
pub struct SequenceForecaster {
    config: SequenceForecasterConfig,
    network: Option<StackedLstm>,
    device: Device,
    lookback: usize,
    loss_history: Vec<f64>,
}

impl SequenceForecaster {
    pub fn new(config: SequenceForecasterConfig) -> Self {
        Self {
            config,
            network: None,
            device: Device::Cpu,
            lookback: 0,
            loss_history: Vec::new(),
        }
    }

    /// Mean training loss per epoch
    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    pub fn is_trained(&self) -> bool {
        self.network.is_some()
    }

    fn fit(
        &mut self,
        windows: &Array2<f64>,
        targets: &Array1<f64>,
    ) -> candle_core::Result<StackedLstm> {
        let n = windows.nrows();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
        let network = StackedLstm::new(&self.config, vb)?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        seed_parameters(&varmap, &mut rng)?;

        let params = ParamsAdamW {
            lr: self.config.learning_rate,
            beta1: self.config.beta_1,
            beta2: self.config.beta_2,
            eps: self.config.epsilon,
            weight_decay: 0.0,
        };
        let mut optimizer = AdamW::new(varmap.all_vars(), params)?;
        let batch_size = self.config.batch_size.max(1);
        let mut order: Vec<usize> = (0..n).collect();
        self.loss_history.clear();

        for epoch in 0..self.config.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for rows in order.chunks(batch_size) {
                let (xs, ys) = batch_tensors(windows, targets, rows, &self.device)?;
                let predictions = network.forward(&xs, true)?;
                let batch_loss = loss::mse(&predictions, &ys)?;
                optimizer.backward_step(&batch_loss)?;

                let value = batch_loss.to_scalar::<f32>()? as f64;
                if !value.is_finite() {
                    return Err(candle_core::Error::Msg(format!(
                        "loss diverged at epoch {}",
                        epoch
                    )));
                }
                epoch_loss += value * rows.len() as f64;
            }

            let epoch_loss = epoch_loss / n as f64;
            tracing::trace!(epoch, loss = epoch_loss, "LSTM epoch");
            self.loss_history.push(epoch_loss);
        }

        Ok(network)
    }
}

impl SequenceModel for SequenceForecaster {
    fn train(&mut self, windows: &Array2<f64>, targets: &Array1<f64>) -> Result<()> {
        let (n, lookback) = windows.dim();
        if n == 0 || lookback == 0 {
            return Err(ForecastError::Model("no training windows".to_string()));
        }
        if targets.len() != n {
            return Err(ForecastError::DataIntegrity(format!(
                "{} windows for {} targets",
                n,
                targets.len()
            )));
        }

        let network = self.fit(windows, targets).map_err(model_err)?;

        tracing::debug!(
            samples = n,
            epochs = self.config.epochs,
            final_loss = self.loss_history.last().copied().unwrap_or(f64::NAN),
            "LSTM trained"
        );

        self.lookback = lookback;
        self.network = Some(network);
        Ok(())
    }

    fn predict_one(&self, window: &[f64]) -> Result<f64> {
        let network = self
            .network
            .as_ref()
            .ok_or_else(|| ForecastError::Model("LSTM not trained".to_string()))?;
        if window.len() != self.lookback {
            return Err(ForecastError::DataIntegrity(format!(
                "window of {} values, model expects {}",
                window.len(),
                self.lookback
            )));
        }

        let values: Vec<f32> = window.iter().map(|v| *v as f32).collect();
        let value = Tensor::from_vec(values, (1, self.lookback, 1), &self.device)
            .and_then(|xs| network.forward(&xs, false))
            .and_then(|out| out.flatten_all()?.get(0)?.to_scalar::<f32>())
            .map_err(model_err)? as f64;
        if !value.is_finite() {
            return Err(ForecastError::Model("LSTM produced a non-finite output".to_string()));
        }
        Ok(value)
    }

    fn name(&self) -> &str {
        "LSTM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SequenceForecasterConfig {
        SequenceForecasterConfig {
            hidden_1: 8,
            hidden_2: 8,
            dense_units: 4,
            dropout: 0.0,
            epochs: 40,
            batch_size: 8,
            learning_rate: 0.01,
            ..Default::default()
        }
    }

    fn sine_windows(n: usize, lookback: usize) -> (Array2<f64>, Array1<f64>) {
        let series: Vec<f64> = (0..n + lookback)
            .map(|i| 0.5 + 0.4 * (i as f64 * 0.2).sin())
            .collect();
        let windows = Array2::from_shape_fn((n, lookback), |(r, c)| series[r + c]);
        let targets = Array1::from_shape_fn(n, |r| series[r + lookback]);
        (windows, targets)
    }

    #[test]
    fn test_training_reduces_loss() {
        let (windows, targets) = sine_windows(48, 10);
        let mut model = SequenceForecaster::new(small_config());
        model.train(&windows, &targets).unwrap();

        let history = model.loss_history();
        assert_eq!(history.len(), 40);
        assert!(history.iter().all(|l| l.is_finite()));
        assert!(history[history.len() - 1] < history[0]);
    }

    #[test]
    fn test_same_seed_gives_same_prediction() {
        let (windows, targets) = sine_windows(24, 10);
        let config = SequenceForecasterConfig {
            epochs: 5,
            ..small_config()
        };

        let mut a = SequenceForecaster::new(config.clone());
        let mut b = SequenceForecaster::new(config);
        a.train(&windows, &targets).unwrap();
        b.train(&windows, &targets).unwrap();

        let window: Vec<f64> = windows.row(0).to_vec();
        let pa = a.predict_one(&window).unwrap();
        let pb = b.predict_one(&window).unwrap();
        assert!(pa.is_finite());
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_dropout_only_applies_while_training() {
        let (windows, targets) = sine_windows(24, 10);
        let mut model = SequenceForecaster::new(SequenceForecasterConfig {
            dropout: 0.2,
            epochs: 3,
            ..small_config()
        });
        model.train(&windows, &targets).unwrap();

        let window: Vec<f64> = windows.row(3).to_vec();
        let first = model.predict_one(&window).unwrap();
        let second = model.predict_one(&window).unwrap();
        assert!(first.is_finite());
        assert_eq!(first, second);
    }

    #[test]
    fn test_predict_requires_training() {
        let model = SequenceForecaster::new(small_config());
        assert!(!model.is_trained());
        assert!(matches!(model.predict_one(&[0.1; 10]), Err(ForecastError::Model(_))));
    }

    #[test]
    fn test_window_length_checked() {
        let (windows, targets) = sine_windows(16, 10);
        let mut model = SequenceForecaster::new(SequenceForecasterConfig {
            epochs: 1,
            ..small_config()
        });
        model.train(&windows, &targets).unwrap();
        assert!(model.is_trained());
        assert!(matches!(
            model.predict_one(&[0.1; 5]),
            Err(ForecastError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_empty_training_set_rejected() {
        let mut model = SequenceForecaster::new(small_config());
        let err = model.train(&Array2::zeros((0, 10)), &Array1::zeros(0)).unwrap_err();
        assert!(matches!(err, ForecastError::Model(_)));
    }

    #[test]
    fn test_forget_gate_bias_initialized_to_one() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = SequenceForecasterConfig {
            hidden_1: 4,
            ..small_config()
        };
        StackedLstm::new(&config, vb).unwrap();
        seed_parameters(&varmap, &mut StdRng::seed_from_u64(7)).unwrap();

        let vars = varmap.data().lock().unwrap();
        let bias = vars["lstm_1.bias_ih_l0"].to_vec1::<f32>().unwrap();
        assert_eq!(bias.len(), 16);
        assert!(bias[4..8].iter().all(|v| *v == 1.0));
        assert!(bias[..4].iter().all(|v| *v == 0.0));
        assert!(bias[8..].iter().all(|v| *v == 0.0));

        let recurrent = vars["lstm_1.bias_hh_l0"].to_vec1::<f32>().unwrap();
        assert!(recurrent.iter().all(|v| *v == 0.0));
    }
}

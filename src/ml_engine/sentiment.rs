//! Sentiment adjustment of the blended forecast

use serde::{Deserialize, Serialize};

/// Scales every forecast step by `1 + strength · s`, with `s` clamped to [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentAdjuster {
    pub strength: f64,
}

impl Default for SentimentAdjuster {
    fn default() -> Self {
        Self { strength: 0.1 }
    }
}

impl SentimentAdjuster {
    pub fn new(strength: f64) -> Self {
        Self { strength }
    }

    /// Non-finite scores count as neutral
    pub fn clamp_score(score: f64) -> f64 {
        if score.is_finite() {
            score.clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn factor(&self, score: f64) -> f64 {
        1.0 + self.strength * Self::clamp_score(score)
    }

    pub fn apply(&self, forecast: &[f64], score: f64) -> Vec<f64> {
        let factor = self.factor(score);
        forecast.iter().map(|v| v * factor).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_bounds() {
        let adjuster = SentimentAdjuster::default();
        assert_eq!(adjuster.factor(1.0), 1.1);
        assert_eq!(adjuster.factor(-1.0), 0.9);
        assert_eq!(adjuster.factor(0.0), 1.0);
    }

    #[test]
    fn test_scores_clamped() {
        let adjuster = SentimentAdjuster::default();
        assert_eq!(adjuster.factor(5.0), 1.1);
        assert_eq!(adjuster.factor(-3.0), 0.9);
        assert_eq!(adjuster.factor(f64::NAN), 1.0);
    }

    #[test]
    fn test_apply_scales_every_step() {
        let adjuster = SentimentAdjuster::default();
        let forecast = [100.0, 200.0, 50.0];
        assert_eq!(adjuster.apply(&forecast, 0.0), forecast.to_vec());

        let up = adjuster.apply(&forecast, 1.0);
        let down = adjuster.apply(&forecast, -1.0);
        for i in 0..forecast.len() {
            assert!((up[i] - forecast[i] * 1.1).abs() < 1e-9);
            assert!((down[i] - forecast[i] * 0.9).abs() < 1e-9);
        }
    }
}

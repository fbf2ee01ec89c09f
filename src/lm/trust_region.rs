//! Damping control for the Levenberg-Marquardt iteration.
//!
//! The damping parameter λ plays the role of an inverse trust-region radius:
//! it grows when a trial step fails to reduce the cost as predicted and
//! shrinks after a step that matches the linear model well.

use super::config::LmConfig;

/// Marquardt damping state.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustRegion {
    /// Current value of the damping parameter
    pub lambda: f64,

    /// Minimum allowed value for the damping parameter
    pub lambda_min: f64,

    /// Maximum allowed value for the damping parameter
    pub lambda_max: f64,

    /// Factor to increase lambda by when step is rejected
    pub lambda_increase_factor: f64,

    /// Factor to decrease lambda by when step agrees with the model
    pub lambda_decrease_factor: f64,

    /// Minimum gain ratio required to accept a step
    pub min_gain_ratio: f64,

    /// Gain ratio above which lambda is decreased
    pub good_gain_ratio: f64,
}

impl Default for TrustRegion {
    fn default() -> Self {
        Self::from_config(&LmConfig::default())
    }
}

impl TrustRegion {
    pub fn from_config(config: &LmConfig) -> Self {
        Self {
            lambda: config.initial_lambda,
            lambda_min: config.min_lambda,
            lambda_max: config.max_lambda,
            lambda_increase_factor: config.lambda_up_factor,
            lambda_decrease_factor: config.lambda_down_factor,
            min_gain_ratio: 1e-4,
            good_gain_ratio: 0.75,
        }
    }

    /// Update λ from the gain ratio of a trial step and return whether the
    /// step is accepted.
    pub fn update_lambda(&mut self, gain_ratio: f64) -> bool {
        if gain_ratio.is_finite() && gain_ratio > self.min_gain_ratio {
            if gain_ratio > self.good_gain_ratio {
                self.lambda = (self.lambda * self.lambda_decrease_factor).max(self.lambda_min);
            } else if gain_ratio < 0.25 {
                self.lambda = (self.lambda * self.lambda_increase_factor.sqrt()).min(self.lambda_max);
            }
            true
        } else {
            self.reject();
            false
        }
    }

    /// Increase λ after a failed or unsolvable trial step.
    pub fn reject(&mut self) {
        self.lambda = (self.lambda * self.lambda_increase_factor).min(self.lambda_max);
    }

    pub fn at_max(&self) -> bool {
        self.lambda >= self.lambda_max
    }

    /// Actual over predicted reduction of the cost. A non-finite new cost
    /// gives `-∞`.
    pub fn gain_ratio(current_cost: f64, new_cost: f64, predicted_reduction: f64) -> f64 {
        if !new_cost.is_finite() {
            return f64::NEG_INFINITY;
        }
        let actual_reduction = current_cost - new_cost;
        if predicted_reduction <= 0.0 || predicted_reduction.abs() < f64::MIN_POSITIVE {
            if actual_reduction > 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            actual_reduction / predicted_reduction
        }
    }
}

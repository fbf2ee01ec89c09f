//! Configuration options for the Levenberg-Marquardt algorithm.

use serde::{Deserialize, Serialize};

pub use crate::utils::finite_difference::DiffMethod;

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Maximum number of accepted steps. Default: 100
    pub max_iterations: usize,

    /// Tolerance on the relative reduction of the cost. Default: 1e-8
    pub ftol: f64,

    /// Tolerance on the largest per-parameter relative step. Default: 1e-8
    pub xtol: f64,

    /// Tolerance on the scaled gradient (cosine between the residual vector
    /// and each Jacobian column). Default: 1e-8
    pub gtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-10
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e10
    pub max_lambda: f64,

    /// Finite-difference scheme for the Jacobian. Default: Central
    pub diff_method: DiffMethod,

    /// Relative finite-difference step; `None` uses √ε. Default: None
    pub diff_step: Option<f64>,

    /// Evaluate Jacobian columns on the rayon pool. Default: true
    pub parallel_jacobian: bool,

    /// Return the Jacobian at the solution in [`LmResult`](super::LmResult). Default: false
    pub calc_jacobian: bool,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-10,
            max_lambda: 1e10,
            diff_method: DiffMethod::default(),
            diff_step: None,
            parallel_jacobian: true,
            calc_jacobian: false,
        }
    }
}

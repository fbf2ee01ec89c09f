//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! The driver minimizes `Σ r²` for any [`Problem`]. Jacobians are finite
//! differences, optionally evaluated column-parallel; the damped step and the
//! convergence tests are scaled by the Jacobian column norms, so parameters
//! of very different magnitude (line intensities near 1e-23 next to
//! positions near 1e4) converge together.

use log::{debug, trace};
use ndarray::{Array1, Array2};
use std::fmt;

use crate::error::{Result, SpecFitError};
use crate::problem::Problem;
use crate::utils::finite_difference::{self, DiffMethod};

use super::config::LmConfig;
use super::convergence::{ConvergenceCriteria, ConvergenceStatus, StepMeasures};
use super::step::NormalEquations;
use super::trust_region::TrustRegion;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of accepted steps
    pub iterations: usize,

    /// Number of function evaluations, Jacobian columns included
    pub func_evals: usize,

    /// Whether one of the convergence tests was met
    pub success: bool,

    /// Why the iteration stopped
    pub status: ConvergenceStatus,

    /// A message describing the result
    pub message: String,

    /// The Jacobian matrix at the solution (if requested)
    pub jacobian: Option<Array2<f64>>,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.config.gtol = gtol;
        self
    }

    /// Set the initial damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    pub fn with_lambda_up_factor(mut self, factor: f64) -> Self {
        self.config.lambda_up_factor = factor;
        self
    }

    pub fn with_lambda_down_factor(mut self, factor: f64) -> Self {
        self.config.lambda_down_factor = factor;
        self
    }

    pub fn with_differentiation_method(mut self, method: DiffMethod) -> Self {
        self.config.diff_method = method;
        self
    }

    /// Relative finite-difference step; `None` restores the default.
    pub fn with_diff_step(mut self, step: Option<f64>) -> Self {
        self.config.diff_step = step;
        self
    }

    pub fn with_parallel_jacobian(mut self, parallel: bool) -> Self {
        self.config.parallel_jacobian = parallel;
        self
    }

    pub fn with_calc_jacobian(mut self, calc_jacobian: bool) -> Self {
        self.config.calc_jacobian = calc_jacobian;
        self
    }

    fn jacobian<P: Problem + Sync>(&self, problem: &P, params: &Array1<f64>) -> Result<Array2<f64>> {
        let method = self.config.diff_method;
        let step = self.config.diff_step;
        if self.config.parallel_jacobian {
            finite_difference::jacobian_parallel(problem, params, method, step)
        } else {
            finite_difference::jacobian(problem, params, method, step)
        }
    }

    fn evals_per_jacobian(&self, n_params: usize) -> usize {
        match self.config.diff_method {
            DiffMethod::Forward => n_params + 1,
            DiffMethod::Central => 2 * n_params,
        }
    }

    /// Minimize `Σ r(x)²` starting from `initial_params`.
    ///
    /// A failed residual evaluation aborts the fit with that error. A trial
    /// step whose cost is not finite is rejected like any other step that
    /// increases the cost.
    pub fn minimize<P: Problem + Sync>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
    ) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(SpecFitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let mut params = initial_params;
        let mut residuals = problem.eval(&params)?;
        let mut cost: f64 = residuals.iter().map(|r| r.powi(2)).sum();
        let mut func_evals = 1;
        if !cost.is_finite() {
            return Err(SpecFitError::FunctionEvaluation(
                "Residuals at the starting point are not finite".to_string(),
            ));
        }

        let criteria = ConvergenceCriteria::from_config(&self.config);
        let mut trust_region = TrustRegion::from_config(&self.config);
        let mut iterations = 0;
        let mut status = ConvergenceStatus::Running;

        while !status.is_terminated() {
            if cost == 0.0 {
                status = ConvergenceStatus::FunctionValueConvergence;
                break;
            }
            if iterations >= self.config.max_iterations {
                status = ConvergenceStatus::MaxIterationsReached;
                break;
            }

            let jacobian = self.jacobian(problem, &params)?;
            func_evals += self.evals_per_jacobian(n_params);
            let normal = NormalEquations::new(&jacobian, &residuals)?;

            status = criteria.check_gradient(normal.gradient_cosine());
            if status.is_terminated() {
                break;
            }

            loop {
                let trial = match normal.step(trust_region.lambda) {
                    Ok(trial) => trial,
                    Err(e) => {
                        debug!("{}; raising damping", e);
                        trust_region.reject();
                        if trust_region.at_max() {
                            status = ConvergenceStatus::DampingLimit;
                            break;
                        }
                        continue;
                    }
                };

                let relative_step = normal.relative_step(&trial.step, &params);
                let new_params = &params + &trial.step;
                let new_residuals = problem.eval(&new_params)?;
                func_evals += 1;
                let new_cost: f64 = new_residuals.iter().map(|r| r.powi(2)).sum();

                let ratio = TrustRegion::gain_ratio(cost, new_cost, trial.predicted_reduction);
                trace!(
                    "lambda = {:.3e}, trial cost = {:.6e}, gain ratio = {:.3}",
                    trust_region.lambda,
                    new_cost,
                    ratio
                );

                if trust_region.update_lambda(ratio) {
                    iterations += 1;
                    status = criteria.check_step(&StepMeasures {
                        iterations,
                        relative_step,
                        cost,
                        new_cost,
                    });
                    debug!(
                        "iteration {}: cost {:.6e} -> {:.6e}, lambda = {:.3e}",
                        iterations, cost, new_cost, trust_region.lambda
                    );
                    params = new_params;
                    residuals = new_residuals;
                    cost = new_cost;
                    break;
                }

                status = criteria.check_rejected_step(relative_step);
                if status.is_terminated() {
                    break;
                }
                if trust_region.at_max() {
                    status = ConvergenceStatus::DampingLimit;
                    break;
                }
            }
        }

        if params.iter().any(|p| !p.is_finite()) {
            status = ConvergenceStatus::NumericalError;
        }

        let jacobian = if self.config.calc_jacobian {
            func_evals += self.evals_per_jacobian(n_params);
            Some(self.jacobian(problem, &params)?)
        } else {
            None
        };

        Ok(LmResult {
            params,
            residuals,
            cost,
            iterations,
            func_evals,
            success: status.is_converged(),
            status,
            message: status.description().to_string(),
            jacobian,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// f(x) = a * x + b
    struct LinearModel {
        x_data: Array1<f64>,
        y_data: Array1<f64>,
    }

    impl Problem for LinearModel {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(self
                .x_data
                .iter()
                .zip(self.y_data.iter())
                .map(|(x, y)| params[0] * x + params[1] - y)
                .collect())
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            self.x_data.len()
        }
    }

    /// Rosenbrock as residuals: r = [10 (y − x²), 1 − x]
    struct Rosenbrock;

    impl Problem for Rosenbrock {
        fn eval(&self, p: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(array![10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]])
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            2
        }
    }

    /// A tiny Lorentzian line: y = s · w / π / ((x − c)² + w²)
    struct TinyLine {
        x: Array1<f64>,
        y: Array1<f64>,
    }

    impl TinyLine {
        fn model(p: &Array1<f64>, x: f64) -> f64 {
            p[0] * p[1] / std::f64::consts::PI / ((x - p[2]).powi(2) + p[1] * p[1])
        }

        fn new(truth: &Array1<f64>) -> Self {
            let x: Array1<f64> = (0..201).map(|i| 6000.0 - 0.1 + 0.001 * i as f64).collect();
            let y = x.mapv(|xi| Self::model(truth, xi));
            Self { x, y }
        }
    }

    impl Problem for TinyLine {
        fn eval(&self, p: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(self
                .x
                .iter()
                .zip(self.y.iter())
                .map(|(&xi, &yi)| (Self::model(p, xi) - yi) * 1e21)
                .collect())
        }

        fn parameter_count(&self) -> usize {
            3
        }

        fn residual_count(&self) -> usize {
            self.x.len()
        }
    }

    #[test]
    fn test_linear_fit() {
        let model = LinearModel {
            x_data: array![1.0, 2.0, 3.0, 4.0, 5.0],
            y_data: array![5.1, 7.0, 8.9, 11.2, 13.0],
        };
        let result = LevenbergMarquardt::new().minimize(&model, array![1.0, 1.0]).unwrap();

        assert!(result.success, "{}", result.message);
        // least-squares solution of the data above
        assert_relative_eq!(result.params[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(result.params[1], 3.04, epsilon = 1e-6);
        assert!(result.cost < 0.1);
        assert!(result.jacobian.is_none());
    }

    #[test]
    fn test_rosenbrock() {
        let lm = LevenbergMarquardt::new().with_max_iterations(200).with_parallel_jacobian(false);
        let result = lm.minimize(&Rosenbrock, array![-1.2, 1.0]).unwrap();
        assert!(result.success, "{}", result.message);
        assert_relative_eq!(result.params[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(result.params[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_badly_scaled_parameters() {
        let truth = array![1.0e-23, 0.01, 6000.0];
        let problem = TinyLine::new(&truth);
        let start = array![0.7e-23, 0.013, 6000.002];

        let result = LevenbergMarquardt::new()
            .with_calc_jacobian(true)
            .minimize(&problem, start)
            .unwrap();

        assert!(result.success, "{}", result.message);
        assert_relative_eq!(result.params[0], 1.0e-23, max_relative = 1e-6);
        assert_relative_eq!(result.params[1], 0.01, max_relative = 1e-6);
        assert_relative_eq!(result.params[2], 6000.0, epsilon = 1e-7);
        assert_eq!(result.jacobian.map(|j| j.dim()), Some((201, 3)));
    }

    #[test]
    fn test_max_iterations() {
        let lm = LevenbergMarquardt::new().with_max_iterations(1).with_xtol(0.0).with_ftol(0.0);
        let result = lm.minimize(&Rosenbrock, array![-1.2, 1.0]).unwrap();
        assert!(!result.success);
        assert_eq!(result.status, ConvergenceStatus::MaxIterationsReached);
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = LevenbergMarquardt::new().minimize(&Rosenbrock, array![1.0]).unwrap_err();
        assert!(matches!(err, SpecFitError::DimensionMismatch(_)));
    }

    #[test]
    fn test_exact_start_stops_immediately() {
        let result = LevenbergMarquardt::new().minimize(&Rosenbrock, array![1.0, 1.0]).unwrap();
        assert!(result.success);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.func_evals, 1);
    }
}

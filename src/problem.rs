//! The nonlinear least-squares problem solved by the Levenberg-Marquardt driver.

use ndarray::{Array1, Array2};

use crate::error::Result;
use crate::utils::finite_difference::DiffMethod;

/// A trait representing a nonlinear least squares problem.
///
/// The solver only ever sees unconstrained coordinates; a problem with
/// bounded parameters maps them itself (see
/// [`FitProblem`](crate::fit::FitProblem)).
pub trait Problem {
    /// Evaluate the residuals at the given parameters.
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the Jacobian matrix at the given parameters.
    ///
    /// The default implementation uses finite differences with the
    /// requested scheme.
    fn jacobian(&self, params: &Array1<f64>, method: DiffMethod) -> Result<Array2<f64>>
    where
        Self: Sized,
    {
        crate::utils::finite_difference::jacobian(self, params, method, None)
    }

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}

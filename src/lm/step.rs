//! Step calculation for the Levenberg-Marquardt algorithm.
//!
//! The normal equations are scaled by the Jacobian column norms
//! `s_j = ‖J_j‖` before damping, so the step solves
//!
//! ```text
//! (Â + λ I) δ̂ = −ĝ,   Â = S⁻¹ JᵀJ S⁻¹,   ĝ = S⁻¹ Jᵀ r,   δ = S⁻¹ δ̂
//! ```
//!
//! which is Marquardt's `(JᵀJ + λ diag(JᵀJ)) δ = −Jᵀr` with the conditioning
//! of a unit-diagonal matrix.

use nalgebra::linalg::Cholesky;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Zip};

use crate::error::{Result, SpecFitError};
use crate::utils::matrix_convert::{nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra};

/// Normal-equation quantities at the current point, reused across the trial
/// steps of one iteration.
#[derive(Debug, Clone)]
pub struct NormalEquations {
    /// `S⁻¹ JᵀJ S⁻¹`
    scaled_hessian: DMatrix<f64>,
    /// `S⁻¹ Jᵀ r`
    scaled_gradient: Array1<f64>,
    /// Column norms `s_j` (1 for an all-zero column).
    scale: Array1<f64>,
    /// `max_j |J_jᵀ r| / (‖J_j‖ ‖r‖)`
    gradient_cosine: f64,
    /// `‖r‖`
    residual_norm: f64,
}

/// Result of a Levenberg-Marquardt step calculation.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The step in the problem's coordinates
    pub step: Array1<f64>,

    /// Predicted reduction of `Σ r²` from the linearized model
    pub predicted_reduction: f64,
}

impl NormalEquations {
    pub fn new(jacobian: &Array2<f64>, residuals: &Array1<f64>) -> Result<Self> {
        if jacobian.nrows() != residuals.len() {
            return Err(SpecFitError::DimensionMismatch(format!(
                "Jacobian has {} rows but there are {} residuals",
                jacobian.nrows(),
                residuals.len()
            )));
        }

        let jtj = jacobian.t().dot(jacobian);
        let jtr = jacobian.t().dot(residuals);
        let n = jtj.nrows();

        let scale: Array1<f64> = (0..n)
            .map(|j| {
                let s = jtj[[j, j]].sqrt();
                if s > 0.0 && s.is_finite() {
                    s
                } else {
                    1.0
                }
            })
            .collect();

        let residual_norm = residuals.dot(residuals).sqrt();
        let gradient_cosine = if residual_norm == 0.0 {
            0.0
        } else {
            (0..n)
                .filter(|&j| jtj[[j, j]] > 0.0)
                .map(|j| jtr[j].abs() / (scale[j] * residual_norm))
                .fold(0.0, f64::max)
        };

        let mut scaled = jtj;
        for i in 0..n {
            for j in 0..n {
                scaled[[i, j]] /= scale[i] * scale[j];
            }
        }

        Ok(Self {
            scaled_hessian: ndarray_to_nalgebra(&scaled),
            scaled_gradient: &jtr / &scale,
            scale,
            gradient_cosine,
            residual_norm,
        })
    }

    pub fn gradient_cosine(&self) -> f64 {
        self.gradient_cosine
    }

    /// Largest per-parameter change of `step` taken from `x`.
    ///
    /// Each component counts with the smaller of `|δ_j| / |x_j|` and
    /// `‖J_j‖ |δ_j| / ‖r‖`, its change relative to the parameter or its
    /// effect relative to the residual. A parameter at zero is measured by
    /// the second ratio only. Offsets such as line positions therefore do
    /// not mask widths and intensities that are still moving.
    pub fn relative_step(&self, step: &Array1<f64>, x: &Array1<f64>) -> f64 {
        Zip::from(step)
            .and(x)
            .and(&self.scale)
            .fold(0.0_f64, |largest, &delta, &value, &scale| {
                if delta == 0.0 {
                    return largest;
                }
                let in_value = if value != 0.0 {
                    (delta / value).abs()
                } else {
                    f64::INFINITY
                };
                let in_residual = if self.residual_norm > 0.0 {
                    (scale * delta).abs() / self.residual_norm
                } else {
                    f64::INFINITY
                };
                largest.max(in_value.min(in_residual))
            })
    }

    /// Damped step for the given λ.
    ///
    /// Fails with [`SpecFitError::LinearAlgebraError`] when the damped system
    /// is not positive definite, which the caller treats as a rejected trial.
    pub fn step(&self, lambda: f64) -> Result<StepResult> {
        let n = self.scale.len();
        let mut damped = self.scaled_hessian.clone();
        for i in 0..n {
            damped[(i, i)] += lambda;
        }

        let cholesky = Cholesky::new(damped).ok_or_else(|| {
            SpecFitError::LinearAlgebraError(format!(
                "Damped normal matrix is not positive definite (lambda = {:.3e})",
                lambda
            ))
        })?;
        let rhs = ndarray_vec_to_nalgebra(&-&self.scaled_gradient);
        let scaled_step = nalgebra_vec_to_ndarray(&cholesky.solve(&rhs));

        if scaled_step.iter().any(|v| !v.is_finite()) {
            return Err(SpecFitError::LinearAlgebraError(
                "Non-finite step from the damped normal equations".to_string(),
            ));
        }

        let step_hat = ndarray_vec_to_nalgebra(&scaled_step);
        let curvature = step_hat.dot(&(&self.scaled_hessian * &step_hat));
        let norm_sq = scaled_step.dot(&scaled_step);

        Ok(StepResult {
            step: &scaled_step / &self.scale,
            predicted_reduction: curvature + 2.0 * lambda * norm_sq,
        })
    }
}

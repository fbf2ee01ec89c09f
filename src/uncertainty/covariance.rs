//! # Covariance Matrix Calculations
//!
//! Covariance of the fitted parameters from the Jacobian at the solution,
//! `covar = redchi · (JᵀJ)⁻¹`. The Jacobian must be taken with respect to
//! the external (bounded) parameter values.

use nalgebra::linalg::Cholesky;
use ndarray::{Array1, Array2};

use crate::utils::matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};

/// Smallest squared Cholesky pivot of the unit-diagonal matrix accepted as
/// non-singular.
const MIN_PIVOT: f64 = 1e-14;

/// Calculate the covariance matrix from a Jacobian.
///
/// `JᵀJ` is scaled to unit diagonal before the Cholesky inversion, so
/// columns differing by many orders of magnitude do not lose precision.
/// Returns `None` when a column is identically zero or the scaled matrix is
/// not numerically positive definite.
pub fn calculate_covariance(jacobian: &Array2<f64>, redchi: f64) -> Option<Array2<f64>> {
    let jtj = jacobian.t().dot(jacobian);
    let n = jtj.nrows();
    if n == 0 {
        return Some(Array2::zeros((0, 0)));
    }

    let scale: Array1<f64> = (0..n).map(|j| jtj[[j, j]].sqrt()).collect();
    if scale.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
        return None;
    }

    let scaled = Array2::from_shape_fn((n, n), |(i, j)| jtj[[i, j]] / (scale[i] * scale[j]));
    let cholesky = Cholesky::new(ndarray_to_nalgebra(&scaled))?;
    let l = cholesky.l();
    if (0..n).any(|i| l[(i, i)] * l[(i, i)] < MIN_PIVOT) {
        return None;
    }
    let inverse = cholesky.inverse();
    let inverse = nalgebra_to_ndarray(&inverse);

    let covar = Array2::from_shape_fn((n, n), |(i, j)| {
        inverse[[i, j]] / (scale[i] * scale[j]) * redchi
    });
    if covar.iter().all(|v| v.is_finite()) {
        Some(covar)
    } else {
        None
    }
}

/// Calculate correlation matrix from covariance matrix.
///
/// `correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])`, with 1 on the
/// diagonal.
pub fn calculate_correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
        if denom > 0.0 {
            covar[[i, j]] / denom
        } else {
            0.0
        }
    })
}

/// Square roots of the covariance diagonal; negative entries give 0.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar.diag().mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 })
}

//! Finite-difference Jacobians, serial and column-parallel.

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecFitError};
use crate::problem::Problem;

const DEFAULT_RELATIVE_STEP: f64 = 1.490_116_119_384_765_6e-8;

/// Finite-difference scheme for the Jacobian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiffMethod {
    /// `(f(x + h) − f(x)) / h`, one extra evaluation per column.
    Forward,
    /// `(f(x + h) − f(x − h)) / 2h`, two extra evaluations per column.
    #[default]
    Central,
}

impl DiffMethod {
    /// Step for a coordinate of value `x`: `epsilon · |x|`, or `epsilon`
    /// itself at `x = 0`. `epsilon` defaults to √ε of machine ε.
    /// There is no absolute floor: intensities (~1e-23) and positions (~1e4)
    /// share one vector.
    pub fn step(self, x: f64, epsilon: Option<f64>) -> f64 {
        let relative = epsilon.unwrap_or(DEFAULT_RELATIVE_STEP);
        if x == 0.0 {
            relative
        } else {
            relative * x.abs()
        }
    }
}

fn column<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    base: Option<&Array1<f64>>,
    j: usize,
    method: DiffMethod,
    epsilon: Option<f64>,
) -> Result<Array1<f64>> {
    let h = method.step(params[j], epsilon);
    let mut forward = params.clone();
    forward[j] += h;
    let rf = problem.eval(&forward)?;

    match (method, base) {
        (DiffMethod::Forward, Some(r0)) => Ok((rf - r0) / h),
        _ => {
            let mut backward = params.clone();
            backward[j] -= h;
            let rb = problem.eval(&backward)?;
            Ok((rf - rb) / (2.0 * h))
        }
    }
}

fn assemble(n_residuals: usize, columns: Vec<Array1<f64>>) -> Result<Array2<f64>> {
    let mut jac = Array2::zeros((n_residuals, columns.len()));
    for (j, col) in columns.into_iter().enumerate() {
        if col.len() != n_residuals {
            return Err(SpecFitError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                n_residuals,
                col.len()
            )));
        }
        jac.column_mut(j).assign(&col);
    }
    Ok(jac)
}

/// Jacobian `J[i, j] = ∂r_i/∂x_j`, one column at a time.
pub fn jacobian<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    method: DiffMethod,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let n_residuals = problem.residual_count();
    let base = match method {
        DiffMethod::Forward => Some(problem.eval(params)?),
        DiffMethod::Central => None,
    };
    let columns = (0..params.len())
        .map(|j| column(problem, params, base.as_ref(), j, method, epsilon))
        .collect::<Result<Vec<_>>>()?;
    assemble(n_residuals, columns)
}

/// Same as [`jacobian`] with the columns evaluated on the rayon pool.
/// Columns are collected in index order, so the result does not depend on
/// scheduling.
pub fn jacobian_parallel<P: Problem + Sync + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    method: DiffMethod,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let n_residuals = problem.residual_count();
    let base = match method {
        DiffMethod::Forward => Some(problem.eval(params)?),
        DiffMethod::Central => None,
    };
    let columns = (0..params.len())
        .into_par_iter()
        .map(|j| column(problem, params, base.as_ref(), j, method, epsilon))
        .collect::<Result<Vec<_>>>()?;
    assemble(n_residuals, columns)
}

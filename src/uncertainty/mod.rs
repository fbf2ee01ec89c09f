//! # Uncertainty Calculation
//!
//! Parameter uncertainties from the Jacobian at the fitted point:
//!
//! - covariance `redchi · (JᵀJ)⁻¹`
//! - standard errors and the correlation matrix derived from it
//!
//! No covariance exists when the fit has no degrees of freedom or the
//! Jacobian is singular; callers then report zero standard errors.

mod covariance;

pub use covariance::{calculate_correlation, calculate_covariance, standard_errors_from_covariance};

use ndarray::{Array1, Array2};
use std::collections::HashMap;

use crate::parameters::ParameterVector;

/// Calculator for parameter uncertainties.
#[derive(Debug, Clone, PartialEq)]
pub struct UncertaintyCalculator {
    /// Number of residuals
    pub ndata: usize,
    /// Number of varying parameters
    pub nvarys: usize,
    /// Chi-square value at minimum
    pub chisqr: f64,
}

impl UncertaintyCalculator {
    pub fn new(ndata: usize, nvarys: usize, chisqr: f64) -> Self {
        Self {
            ndata,
            nvarys,
            chisqr,
        }
    }

    /// Degrees of freedom, `None` when there are at least as many varying
    /// parameters as residuals.
    pub fn nfree(&self) -> Option<usize> {
        self.ndata.checked_sub(self.nvarys).filter(|&n| n > 0)
    }

    /// Reduced chi-square; the raw chi-square when there are no degrees of
    /// freedom.
    pub fn redchi(&self) -> f64 {
        match self.nfree() {
            Some(nfree) => self.chisqr / nfree as f64,
            None => self.chisqr,
        }
    }

    /// Covariance of the varying parameters, given the Jacobian with respect
    /// to their external values.
    pub fn covariance(&self, jacobian: &Array2<f64>) -> Option<Array2<f64>> {
        self.nfree()?;
        calculate_covariance(jacobian, self.redchi())
    }
}

/// Standard errors keyed by the names of the varying entries, in the order
/// the covariance was built.
pub fn standard_errors(covar: &Array2<f64>, params: &ParameterVector) -> HashMap<String, f64> {
    let errors: Array1<f64> = standard_errors_from_covariance(covar);
    params
        .varying_names()
        .into_iter()
        .zip(errors.iter())
        .map(|(name, &err)| (name, err))
        .collect()
}

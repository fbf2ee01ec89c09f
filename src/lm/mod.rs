//! Levenberg-Marquardt algorithm implementation.
//!
//! A damped Gauss-Newton solver for `min Σ r(x)²` with finite-difference
//! Jacobians, Marquardt damping scaled by the Jacobian column norms, and
//! MINPACK-style convergence tests.

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod step;
pub mod trust_region;

pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::{DiffMethod, LmConfig};
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
pub use step::{NormalEquations, StepResult};
pub use trust_region::TrustRegion;

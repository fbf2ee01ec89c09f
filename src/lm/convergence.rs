//! Convergence criteria for the Levenberg-Marquardt iteration.
//!
//! All tests are scale invariant. The step test is applied per parameter
//! (see [`NormalEquations::relative_step`](super::step::NormalEquations::relative_step)),
//! and the gradient test uses the cosine between the residual vector and
//! each Jacobian column.

use serde::{Deserialize, Serialize};

use super::config::LmConfig;

/// Possible convergence states of the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// The algorithm is still running.
    Running,

    /// The algorithm has converged due to a small parameter change.
    ParameterConvergence,

    /// The algorithm has converged due to a small function value change.
    FunctionValueConvergence,

    /// The algorithm has converged due to a small gradient.
    GradientConvergence,

    /// The algorithm has terminated due to reaching the maximum number of iterations.
    MaxIterationsReached,

    /// No step could reduce the cost before the damping hit its maximum.
    DampingLimit,

    /// The algorithm has terminated due to a numerical error.
    NumericalError,
}

impl ConvergenceStatus {
    /// Returns true if the optimization has terminated (either converged or failed).
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns true if the optimization has converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
        )
    }

    /// Returns a description of the convergence status.
    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Running => "Optimization is still running",
            ConvergenceStatus::ParameterConvergence => "Converged: small parameter change",
            ConvergenceStatus::FunctionValueConvergence => "Converged: small function value change",
            ConvergenceStatus::GradientConvergence => "Converged: small gradient",
            ConvergenceStatus::MaxIterationsReached => "Terminated: maximum iterations reached",
            ConvergenceStatus::DampingLimit => "Terminated: damping reached its maximum without reducing the cost",
            ConvergenceStatus::NumericalError => "Terminated: numerical error",
        }
    }
}

/// Quantities of one accepted step, as seen by [`ConvergenceCriteria`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMeasures {
    /// Accepted steps so far, this one included.
    pub iterations: usize,
    /// Largest per-parameter relative change of the step.
    pub relative_step: f64,
    pub cost: f64,
    pub new_cost: f64,
}

/// Criteria for determining when the optimization has converged.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceCriteria {
    /// Tolerance for change in parameter values.
    pub xtol: f64,

    /// Tolerance for change in function value.
    pub ftol: f64,

    /// Tolerance for gradient norm.
    pub gtol: f64,

    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self::from_config(&LmConfig::default())
    }
}

impl ConvergenceCriteria {
    pub fn new(xtol: f64, ftol: f64, gtol: f64, max_iterations: usize) -> Self {
        Self {
            xtol,
            ftol,
            gtol,
            max_iterations,
        }
    }

    pub fn from_config(config: &LmConfig) -> Self {
        Self::new(config.xtol, config.ftol, config.gtol, config.max_iterations)
    }

    /// Gradient test, applied before a step is attempted.
    pub fn check_gradient(&self, scaled_gradient: f64) -> ConvergenceStatus {
        if scaled_gradient <= self.gtol {
            ConvergenceStatus::GradientConvergence
        } else {
            ConvergenceStatus::Running
        }
    }

    /// Step test for a trial that did not reduce the cost. Damping shrinks
    /// the trial steps until no parameter would move by more than `xtol`.
    pub fn check_rejected_step(&self, relative_step: f64) -> ConvergenceStatus {
        if relative_step <= self.xtol {
            ConvergenceStatus::ParameterConvergence
        } else {
            ConvergenceStatus::Running
        }
    }

    /// Step tests, applied after a step was accepted.
    pub fn check_step(&self, step: &StepMeasures) -> ConvergenceStatus {
        if step.new_cost == 0.0 {
            return ConvergenceStatus::FunctionValueConvergence;
        }
        if step.relative_step <= self.xtol {
            return ConvergenceStatus::ParameterConvergence;
        }
        let reduction = (step.cost - step.new_cost) / step.cost;
        if reduction.abs() <= self.ftol {
            return ConvergenceStatus::FunctionValueConvergence;
        }
        if step.iterations >= self.max_iterations {
            return ConvergenceStatus::MaxIterationsReached;
        }
        ConvergenceStatus::Running
    }
}

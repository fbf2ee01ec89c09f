//! Multi-spectrum fitting: builds the residual problem, runs the bounded
//! Levenberg-Marquardt solver and writes the result back into the line list
//! and the baseline entries.

use log::{info, warn};
use ndarray::{Array1, Array2};
use std::fmt;

use crate::dataset::Dataset;
use crate::error::{Result, SpecFitError};
use crate::fit::builder::ParameterBuilder;
use crate::fit::config::FitConfig;
use crate::fit::problem::{Coordinates, FitProblem};
use crate::fit::summary::{ResidualSummary, SpectrumSummary};
use crate::lm::{ConvergenceStatus, LevenbergMarquardt, LmConfig};
use crate::parameters::{EntryOrigin, ParameterVector};
use crate::problem::Problem;
use crate::registry::{column_name, TransitionRegistry};
use crate::spectrum::{SimulatedSpectrum, SpectrumModel};
use crate::uncertainty::{calculate_correlation, UncertaintyCalculator};
use crate::utils::finite_difference::jacobian_parallel;

/// Outcome of [`FitOrchestrator::fit`].
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Final vector, standard errors set on the varying entries.
    pub vector: ParameterVector,
    pub success: bool,
    pub status: ConvergenceStatus,
    pub message: String,
    /// Covariance of the varying entries in `vector.varying_names()` order.
    pub covariance: Option<Array2<f64>>,
    /// Residuals per spectrum, dataset order.
    pub residuals: Vec<Array1<f64>>,
    pub chisqr: f64,
    pub redchi: f64,
    pub iterations: usize,
    pub nfev: usize,
    pub ndata: usize,
    pub nvarys: usize,
}

impl FitResult {
    pub fn correlation(&self) -> Option<Array2<f64>> {
        self.covariance.as_ref().map(calculate_correlation)
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Data points: {}", self.ndata)?;
        writeln!(f, "  Varying parameters: {}", self.nvarys)?;
        writeln!(f, "  Chi-square: {:.6e}", self.chisqr)?;
        writeln!(f, "  Reduced chi-square: {:.6e}", self.redchi)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.nfev)?;
        for name in self.vector.varying_names() {
            if let Some(entry) = self.vector.get(&name) {
                match entry.stderr() {
                    Some(err) => writeln!(f, "  {} = {:.8e} +/- {:.2e}", name, entry.value(), err)?,
                    None => writeln!(f, "  {} = {:.8e}", name, entry.value())?,
                }
            }
        }
        Ok(())
    }
}

/// Fits one [`Dataset`] against one [`TransitionRegistry`].
#[derive(Debug, Clone)]
pub struct FitOrchestrator<'a> {
    registry: &'a TransitionRegistry,
    dataset: &'a Dataset,
    config: &'a FitConfig,
}

impl<'a> FitOrchestrator<'a> {
    /// Checks the configuration against the registry up front.
    pub fn new(registry: &'a TransitionRegistry, dataset: &'a Dataset, config: &'a FitConfig) -> Result<Self> {
        if dataset.is_empty() {
            return Err(SpecFitError::Configuration(format!(
                "dataset '{}' has no spectra",
                dataset.name
            )));
        }
        config.validate_against(registry)?;
        Ok(Self {
            registry,
            dataset,
            config,
        })
    }

    pub fn config(&self) -> &FitConfig {
        self.config
    }

    /// Parameter vector for this registry, dataset and configuration.
    pub fn build_parameters(&self) -> Result<ParameterVector> {
        ParameterBuilder::new(self.registry, self.dataset, self.config).build()
    }

    fn problem(&self, vector: ParameterVector) -> FitProblem<'a> {
        FitProblem::new(self.registry, self.dataset, self.config, vector)
    }

    fn check_vector(&self, vector: &mut ParameterVector) -> Result<()> {
        for spectrum in self.dataset.spectra() {
            if vector.layout().spectrum(spectrum.number).is_none() {
                return Err(SpecFitError::Configuration(format!(
                    "parameter vector was not built for spectrum {}",
                    spectrum.number
                )));
            }
        }
        vector.validate_bounds()?;
        vector.resolve_expressions()?;
        Ok(())
    }

    /// Minimize the concatenated residuals over the varying entries.
    ///
    /// Non-convergence is reported through `success` and `message`; the
    /// returned vector is then the best point reached.
    pub fn fit(&self, mut vector: ParameterVector, options: &LmConfig) -> Result<FitResult> {
        self.check_vector(&mut vector)?;

        let nvarys = vector.varying_count();
        let problem = self.problem(vector);
        let ndata = problem.residual_count();
        info!(
            "fitting {} spectra ({} points) with {} varying parameters, profile {:?}",
            self.dataset.len(),
            ndata,
            nvarys,
            self.config.profile
        );

        let (mut vector, success, status, message, iterations, nfev) = if nvarys == 0 {
            (
                problem.template().clone(),
                true,
                ConvergenceStatus::ParameterConvergence,
                "no varying parameters".to_string(),
                0,
                0,
            )
        } else {
            let solver = LevenbergMarquardt::with_config(options.clone());
            let result = solver.minimize(&problem, problem.initial_point()?)?;
            (
                problem.vector_at(&result.params)?,
                result.success,
                result.status,
                result.message,
                result.iterations,
                result.func_evals,
            )
        };

        let residuals = problem.residuals_for(&vector)?;
        let chisqr: f64 = residuals.iter().map(|r| r.dot(r)).sum();
        let uncertainty = UncertaintyCalculator::new(ndata, nvarys, chisqr);

        let covariance = if nvarys == 0 {
            None
        } else {
            let external = self.problem(vector.clone()).with_coordinates(Coordinates::External);
            let jacobian = jacobian_parallel(
                &external,
                &vector.varying_values(),
                options.diff_method,
                options.diff_step,
            )?;
            uncertainty.covariance(&jacobian)
        };
        if covariance.is_none() && nvarys > 0 {
            warn!("covariance unavailable: singular Jacobian or no degrees of freedom");
        }

        for (k, index) in vector.varying_indices().into_iter().enumerate() {
            let stderr = covariance.as_ref().map(|c| c[[k, k]].max(0.0).sqrt());
            vector.set_stderr_at(index, stderr);
        }

        info!(
            "fit finished ({}) after {} iterations: chi-square {:.6e}, reduced {:.6e}",
            message,
            iterations,
            chisqr,
            uncertainty.redchi()
        );

        Ok(FitResult {
            vector,
            success,
            status,
            message,
            covariance,
            residuals,
            chisqr,
            redchi: uncertainty.redchi(),
            iterations,
            nfev,
            ndata,
            nvarys,
        })
    }

    /// Every model component of every spectrum for `vector`.
    pub fn simulate(&self, vector: &ParameterVector) -> Result<Vec<SimulatedSpectrum>> {
        let shape = self.config.line_shape();
        self.dataset
            .spectra()
            .iter()
            .map(|s| {
                SpectrumModel::new(self.registry, s, &shape)
                    .with_weighting(self.config.weight_spectra)
                    .simulate(vector)
            })
            .collect()
    }

    /// Residual statistics per spectrum for a finished fit. Statistics use
    /// the unweighted `model − measured` difference.
    pub fn residual_analysis(&self, result: &FitResult) -> Result<ResidualSummary> {
        let simulated = self.simulate(&result.vector)?;
        let spectra = self
            .dataset
            .spectra()
            .iter()
            .zip(&simulated)
            .map(|(s, sim)| SpectrumSummary::from_simulation(s, sim))
            .collect();
        Ok(ResidualSummary {
            spectra,
            success: result.success,
            message: result.message.clone(),
            chisqr: result.chisqr,
            redchi: result.redchi,
            ndata: result.ndata,
            nvarys: result.nvarys,
        })
    }
}

/// Write fitted values and standard errors back.
///
/// Shared line entries replace the transition's base values, per-spectrum
/// copies become overrides, and spectrum entries go to the dataset's
/// baseline entries. Only varying entries update the stored errors.
pub fn update_params(result: &FitResult, registry: &mut TransitionRegistry, dataset: &mut Dataset) -> Result<()> {
    let vector = &result.vector;
    for (index, origin) in vector.layout().origins().iter().enumerate() {
        let Some(entry) = vector.entry(index) else { continue };
        let value = entry.value();
        let error = entry.vary().then(|| entry.stderr());

        match origin {
            EntryOrigin::Line { key, spectrum } => {
                let transition = registry.get_mut(key.transition)?;
                let diluent = key.diluent.as_deref();
                let column = column_name(key.quantity, diluent);
                let column = match spectrum {
                    None => {
                        transition.params.set(key.quantity, diluent, value);
                        column
                    }
                    Some(n) => {
                        transition.set_override(*n, key.quantity, diluent, value);
                        format!("{}_s{}", column, n)
                    }
                };
                match error {
                    Some(Some(e)) => {
                        transition.uncertainties.insert(column, e);
                    }
                    Some(None) => {
                        transition.uncertainties.remove(&column);
                    }
                    None => {}
                }
            }
            EntryOrigin::Spectrum {
                spectrum_number,
                quantity,
            } => {
                let baseline = dataset.baseline_mut(*spectrum_number).ok_or_else(|| {
                    SpecFitError::Configuration(format!("dataset has no spectrum {}", spectrum_number))
                })?;
                baseline.set(*quantity, value);
                match error {
                    Some(Some(e)) => {
                        baseline.stderr.insert(quantity.column_name(), e);
                    }
                    Some(None) => {
                        baseline.stderr.remove(&quantity.column_name());
                    }
                    None => {}
                }
            }
        }
    }
    Ok(())
}

//! The multi-spectrum fit as a [`Problem`].

use ndarray::{concatenate, Array1, ArrayView1, Axis};
use rayon::prelude::*;

use crate::dataset::Dataset;
use crate::error::{Result, SpecFitError};
use crate::fit::config::FitConfig;
use crate::parameters::ParameterVector;
use crate::problem::Problem;
use crate::registry::TransitionRegistry;
use crate::spectrum::SpectrumModel;

/// Coordinates the solver's vector is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordinates {
    /// Unbounded solver coordinates, mapped through each entry's bounds.
    Internal,
    /// Physical values of the varying entries.
    External,
}

/// Residuals of every spectrum, concatenated in dataset order, as a function
/// of the varying entries of a template vector.
#[derive(Debug, Clone)]
pub struct FitProblem<'a> {
    models: Vec<SpectrumModel<'a>>,
    template: ParameterVector,
    coordinates: Coordinates,
    lengths: Vec<usize>,
}

impl<'a> FitProblem<'a> {
    pub fn new(
        registry: &'a TransitionRegistry,
        dataset: &'a Dataset,
        config: &FitConfig,
        template: ParameterVector,
    ) -> Self {
        let shape = config.line_shape();
        let models = dataset
            .spectra()
            .iter()
            .map(|s| SpectrumModel::new(registry, s, &shape).with_weighting(config.weight_spectra))
            .collect();
        Self {
            models,
            template,
            coordinates: Coordinates::Internal,
            lengths: dataset.spectra().iter().map(|s| s.len()).collect(),
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = coordinates;
        self
    }

    pub fn template(&self) -> &ParameterVector {
        &self.template
    }

    /// Starting point in this problem's coordinates.
    pub fn initial_point(&self) -> Result<Array1<f64>> {
        match self.coordinates {
            Coordinates::Internal => Ok(self.template.varying_internal_values()?),
            Coordinates::External => Ok(self.template.varying_values()),
        }
    }

    /// Copy of the template with the varying entries set from `point`.
    pub fn vector_at(&self, point: &Array1<f64>) -> Result<ParameterVector> {
        let mut vector = self.template.clone();
        match self.coordinates {
            Coordinates::Internal => vector.update_from_internal(point)?,
            Coordinates::External => vector.update_from_external(point)?,
        }
        Ok(vector)
    }

    /// Split a concatenated residual vector back into one array per spectrum.
    pub fn split(&self, residuals: &Array1<f64>) -> Result<Vec<Array1<f64>>> {
        if residuals.len() != self.residual_count() {
            return Err(SpecFitError::DimensionMismatch(format!(
                "expected {} residuals, got {}",
                self.residual_count(),
                residuals.len()
            )));
        }
        let mut start = 0;
        Ok(self
            .lengths
            .iter()
            .map(|&n| {
                let segment = residuals.slice(ndarray::s![start..start + n]).to_owned();
                start += n;
                segment
            })
            .collect())
    }

    /// Per-spectrum residuals for a complete vector.
    pub fn residuals_for(&self, vector: &ParameterVector) -> Result<Vec<Array1<f64>>> {
        self.models.par_iter().map(|m| m.residual(vector)).collect()
    }
}

impl Problem for FitProblem<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let vector = self.vector_at(params)?;
        let segments = self.residuals_for(&vector)?;
        let views: Vec<ArrayView1<f64>> = segments.iter().map(|s| s.view()).collect();
        concatenate(Axis(0), &views)
            .map_err(|e| SpecFitError::FunctionEvaluation(format!("cannot join residuals: {}", e)))
    }

    fn parameter_count(&self) -> usize {
        self.template.varying_count()
    }

    fn residual_count(&self) -> usize {
        self.lengths.iter().sum()
    }
}

//! A single named, bounded scalar of the fit vector.

use crate::parameters::bounds::{Bounds, BoundsError, BoundsTransform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Parameter '{name}' cannot have both an expression and be varied")]
    ExpressionAndVary { name: String },

    #[error("Bounds error: {0}")]
    BoundsError(#[from] BoundsError),

    #[error("Parameter '{name}' = {value} is outside its bounds [{min}, {max}]")]
    OutOfBounds {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Cannot evaluate expression for parameter '{name}': {message}")]
    ExpressionEvaluation { name: String, message: String },

    #[error("Parameter '{name}' not found")]
    ParameterNotFound { name: String },

    #[error("Circular dependency in expression for parameter '{name}'")]
    CircularDependency { name: String },

    #[error("Parameter '{name}' already exists")]
    DuplicateName { name: String },
}

/// One entry of a [`ParameterVector`](crate::parameters::ParameterVector).
///
/// An entry is either varied by the solver, held fixed, or computed from an
/// expression over other entries. Bounds are not enforced on construction
/// or on [`set_bounds`](Self::set_bounds); an out-of-bounds varying entry is
/// reported when a fit starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntry {
    name: String,
    value: f64,
    init_value: f64,
    vary: bool,
    #[serde(default)]
    bounds: Bounds,
    #[serde(default)]
    expr: Option<String>,
    #[serde(default)]
    stderr: Option<f64>,
}

impl ParameterEntry {
    /// Create a varying, unbounded entry.
    ///
    /// ```
    /// use specfit_rs::parameters::ParameterEntry;
    ///
    /// let p = ParameterEntry::new("gamma0_air_2_1_7", 0.07);
    /// assert_eq!(p.name(), "gamma0_air_2_1_7");
    /// assert!(p.vary());
    /// ```
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            init_value: value,
            vary: true,
            bounds: Bounds::default(),
            expr: None,
            stderr: None,
        }
    }

    /// Create a varying entry with bounds. The value is kept as given.
    pub fn with_bounds(name: &str, value: f64, min: f64, max: f64) -> Result<Self, ParameterError> {
        let mut entry = Self::new(name, value);
        entry.bounds = Bounds::new(min, max)?;
        Ok(entry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value, rejecting values outside the bounds.
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        if !self.bounds.is_within_bounds(value) {
            return Err(ParameterError::OutOfBounds {
                name: self.name.clone(),
                value,
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }
        self.value = value;
        Ok(())
    }

    /// Set the value without a bounds check. Used for solver output and
    /// expression results, which are in range by construction or must be
    /// reported as computed.
    pub(crate) fn set_value_unchecked(&mut self, value: f64) {
        self.value = value;
    }

    pub fn init_value(&self) -> f64 {
        self.init_value
    }

    /// Restore the value the entry was created with.
    pub fn reset(&mut self) {
        self.value = self.init_value;
        self.stderr = None;
    }

    pub fn vary(&self) -> bool {
        self.vary
    }

    /// Mark the entry as varying or fixed. An expression-linked entry can
    /// never vary.
    pub fn set_vary(&mut self, vary: bool) -> Result<(), ParameterError> {
        if vary && self.expr.is_some() {
            return Err(ParameterError::ExpressionAndVary {
                name: self.name.clone(),
            });
        }
        self.vary = vary;
        Ok(())
    }

    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    pub fn expr(&self) -> Option<&str> {
        self.expr.as_deref()
    }

    /// Link the entry to an expression, or clear the link. Linking fixes the
    /// entry.
    pub fn set_expr(&mut self, expr: Option<&str>) {
        self.expr = expr.map(str::to_string);
        if self.expr.is_some() {
            self.vary = false;
        }
    }

    pub fn stderr(&self) -> Option<f64> {
        self.stderr
    }

    pub fn set_stderr(&mut self, stderr: Option<f64>) {
        self.stderr = stderr;
    }

    pub fn bounds_transform(&self) -> BoundsTransform {
        BoundsTransform::new(self.bounds)
    }

    /// Current value in internal (unbounded) coordinates.
    pub fn to_internal(&self) -> Result<f64, ParameterError> {
        self.bounds_transform()
            .to_internal(self.value)
            .map_err(|_| ParameterError::OutOfBounds {
                name: self.name.clone(),
                value: self.value,
                min: self.bounds.min,
                max: self.bounds.max,
            })
    }

    /// Map an internal value back to this entry's external domain.
    pub fn from_internal(&self, internal_value: f64) -> f64 {
        self.bounds_transform().to_external(internal_value)
    }
}

use thiserror::Error;

use crate::parameters::parameter::ParameterError;

/// Error types for the specfit-rs library.
#[derive(Error, Debug)]
pub enum SpecFitError {
    /// Malformed fit configuration, e.g. a vary or constrain spec that names
    /// a molecule, isotope or transition the registry does not hold.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required input column or value is absent and has no defined default.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// A transition referenced by a spectrum or parameter is not in the registry.
    #[error("Missing transition: molecule {molecule}, isotope {isotope}, index {index}")]
    MissingTransition {
        molecule: u32,
        isotope: u32,
        index: usize,
    },

    /// A varying parameter starts outside its own bounds.
    #[error("Parameter '{name}' = {value} violates its bounds [{min}, {max}]")]
    BoundViolation {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Error indicating a mismatch in array dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error for parameter-related problems.
    #[error("Parameter error: {0}")]
    ParameterError(String),

    /// Error during residual or model evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Linear algebra error.
    #[error("Linear algebra error: {0}")]
    LinearAlgebraError(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// CSV reading/writing error.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl From<ParameterError> for SpecFitError {
    fn from(err: ParameterError) -> Self {
        match err {
            ParameterError::OutOfBounds {
                name,
                value,
                min,
                max,
            } => SpecFitError::BoundViolation {
                name,
                value,
                min,
                max,
            },
            other => SpecFitError::ParameterError(other.to_string()),
        }
    }
}

/// Result type alias for specfit-rs operations.
pub type Result<T> = std::result::Result<T, SpecFitError>;

//! # specfit-rs
//!
//! `specfit-rs` fits absorption line-shape models to sets of measured
//! spectra. Line parameters can be shared across spectra recorded at
//! different pressures, temperatures and compositions, or fitted per
//! spectrum, together with per-spectrum baselines, etalons, mole fractions
//! and frequency shifts.
//!
//! The library provides:
//! - Voigt, speed-dependent Voigt and Hartmann-Tran profiles with optional
//!   first-order line mixing
//! - A line-list registry with per-diluent coefficients and temperature
//!   scaling, read from and written to CSV
//! - A named, bounded parameter vector with expression links
//! - A bounded Levenberg-Marquardt solver with covariance-based uncertainties
//!
//! ## Basic Usage
//!
//! ```
//! use ndarray::Array1;
//! use specfit_rs::lineshape::{LineShapeModel, ProfileKind};
//! use specfit_rs::registry::{DiluentCoefficients, LineParameters, Transition, TransitionId, TransitionRegistry};
//! use specfit_rs::spectrum::DiluentMix;
//!
//! let mut registry = TransitionRegistry::new();
//! let params = LineParameters::new(6000.0, 1e-23).with_diluent(
//!     "air",
//!     DiluentCoefficients { gamma0: 0.07, n_gamma0: 0.75, ..Default::default() },
//! );
//! registry.insert(Transition::new(TransitionId::new(2, 1, 0), params)).unwrap();
//!
//! let line = registry.resolve(2, 1, 0, 296.0).unwrap();
//! let grid = Array1::linspace(5999.0, 6001.0, 201);
//! let sigma = LineShapeModel::new(ProfileKind::Voigt)
//!     .simulate(&grid, &line, 296.0, 1.0, &DiluentMix::air())
//!     .unwrap();
//! assert!(sigma[100] > sigma[0]);
//! ```

// Public modules
pub mod constants;
pub mod error;

// Parameter system
pub mod parameters;

// Solver
pub mod lm;
pub mod problem;
pub mod uncertainty;
pub mod utils;

// Spectroscopy
pub mod dataset;
pub mod fit;
pub mod lineshape;
pub mod registry;
pub mod simulate;
pub mod spectrum;

// Re-exports for convenience
pub use dataset::Dataset;
pub use error::{Result, SpecFitError};
pub use fit::{update_params, FitConfig, FitOrchestrator, FitResult};
pub use lineshape::{LineShapeModel, ProfileKind};
pub use lm::LevenbergMarquardt;
pub use parameters::ParameterVector;
pub use problem::Problem;
pub use registry::TransitionRegistry;
pub use spectrum::{Spectrum, SpectrumModel};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

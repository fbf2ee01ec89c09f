//! # Multi-Spectrum Fitting
//!
//! Everything between a line list plus a set of measured spectra and the
//! updated line list:
//!
//! - [`FitConfig`]: profile, thresholds, constrain flags, vary specs and
//!   bound limits, serializable to JSON
//! - [`ParameterBuilder`]: the parameter vector and its layout
//! - [`FitProblem`]: concatenated per-spectrum residuals
//! - [`FitOrchestrator`]: runs the solver, computes the covariance
//! - [`update_params`]: writes the result back
//!
//! ## Example
//!
//! ```no_run
//! use specfit_rs::fit::{update_params, FitConfig, FitOrchestrator, VarySpec};
//! use specfit_rs::lineshape::ProfileKind;
//! use specfit_rs::lm::LmConfig;
//! use specfit_rs::registry::{LineListReader, LineQuantity};
//! use specfit_rs::spectrum::SpectrumReader;
//! use specfit_rs::Dataset;
//!
//! # fn main() -> specfit_rs::Result<()> {
//! let mut registry = LineListReader::new().read_path("linelist.csv")?;
//! let spectrum = SpectrumReader::new("wavenumber", "alpha")
//!     .read_path("spectrum_1.csv", 1)?
//!     .with_mole_fraction(2, 0.01);
//! let mut dataset = Dataset::new("co2").with_spectrum(spectrum)?;
//!
//! let config = FitConfig::new(ProfileKind::Voigt)
//!     .with_vary_line(LineQuantity::Sw, VarySpec::isotopes(&[(2, 1)]))
//!     .with_vary_line(LineQuantity::Gamma0, VarySpec::isotopes(&[(2, 1)]));
//!
//! let result = {
//!     let fit = FitOrchestrator::new(&registry, &dataset, &config)?;
//!     fit.fit(fit.build_parameters()?, &LmConfig::default())?
//! };
//! println!("{}", result);
//! update_params(&result, &mut registry, &mut dataset)?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod orchestrator;
pub mod problem;
pub mod summary;

pub use builder::ParameterBuilder;
pub use config::{
    ConstrainFlags, FitConfig, Limit, LimitConfig, LimitKind, TransitionVary, VaryConfig, VarySpec,
};
pub use orchestrator::{update_params, FitOrchestrator, FitResult};
pub use problem::{Coordinates, FitProblem};
pub use summary::{write_baseline_list, write_baseline_list_path, write_trace, ResidualSummary, SpectrumSummary};

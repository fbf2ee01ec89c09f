//! Measured spectra and their forward model.
//!
//! A [`Spectrum`] holds the samples and recording conditions of one
//! measurement. [`SpectrumModel`] combines the line absorption of the
//! selected transitions with the baseline polynomial, etalons and optional
//! collision-induced absorption to produce a signal comparable to the
//! measured one.

pub mod baseline;
pub mod cia;
pub mod io;
pub mod model;
#[allow(clippy::module_inception)]
pub mod spectrum;

pub use baseline::{BaselineEntry, SpectrumQuantity};
pub use cia::CiaTable;
pub use io::{FrequencyUnit, PressureUnit, SignalUnit, SpectrumReader, TemperatureUnit, UncertaintyUnit};
pub use model::{SimulatedSpectrum, SpectrumModel};
pub use spectrum::{DiluentMix, Etalon, SignalKind, Spectrum};

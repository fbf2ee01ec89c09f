//! Fits of synthetic CO2 spectra
//!
//! Data are simulated from a known line list, then fitted from a perturbed
//! copy of it.

mod baseline;
mod multi_spectrum;
mod single_spectrum;

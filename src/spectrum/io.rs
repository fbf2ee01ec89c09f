//! CSV ingestion of measured spectra.

use csv::StringRecord;
use log::{debug, warn};
use ndarray::Array1;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;

use crate::constants::{SPEED_OF_LIGHT, TORR_PER_ATM};
use crate::error::{Result, SpecFitError};
use crate::spectrum::spectrum::{SignalKind, Spectrum};

/// Unit of the frequency column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyUnit {
    Wavenumber,
    MHz,
}

/// What the signal column holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalUnit {
    /// Absorption coefficient (ppm/cm).
    Alpha,
    /// Ring-down time (µs), converted to ppm/cm.
    RingdownMicroseconds,
    Transmittance { path_length: f64 },
}

/// What the uncertainty column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncertaintyUnit {
    /// Same unit as the converted signal.
    Absolute,
    /// Relative standard deviation of the raw signal in percent.
    RelativePercent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureUnit {
    Atm,
    Torr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Kelvin,
    Celsius,
}

/// Ring-down time (µs) to absorption coefficient (ppm/cm): `1 / (c τ)`.
pub fn ringdown_to_alpha(tau_us: f64) -> f64 {
    1e12 / (SPEED_OF_LIGHT * tau_us)
}

/// Frequency (MHz) to wavenumber (cm⁻¹).
pub fn mhz_to_wavenumber(mhz: f64) -> f64 {
    mhz * 1e6 / SPEED_OF_LIGHT
}

/// Reads a spectrum from a CSV table with configurable columns and units.
///
/// Rows are sorted by frequency. Pressure and temperature columns, when
/// present, are averaged into the nominal conditions; otherwise the
/// spectrum keeps its defaults (296 K, 1 atm).
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumReader {
    pub frequency_column: String,
    pub frequency_unit: FrequencyUnit,
    pub signal_column: String,
    pub signal_unit: SignalUnit,
    pub uncertainty_column: Option<(String, UncertaintyUnit)>,
    pub pressure_column: Option<(String, PressureUnit)>,
    pub temperature_column: Option<(String, TemperatureUnit)>,
}

impl SpectrumReader {
    pub fn new(frequency_column: &str, signal_column: &str) -> Self {
        Self {
            frequency_column: frequency_column.to_string(),
            frequency_unit: FrequencyUnit::Wavenumber,
            signal_column: signal_column.to_string(),
            signal_unit: SignalUnit::Alpha,
            uncertainty_column: None,
            pressure_column: None,
            temperature_column: None,
        }
    }

    pub fn with_frequency_unit(mut self, unit: FrequencyUnit) -> Self {
        self.frequency_unit = unit;
        self
    }

    pub fn with_signal_unit(mut self, unit: SignalUnit) -> Self {
        self.signal_unit = unit;
        self
    }

    pub fn with_uncertainty_column(mut self, column: &str, unit: UncertaintyUnit) -> Self {
        self.uncertainty_column = Some((column.to_string(), unit));
        self
    }

    pub fn with_pressure_column(mut self, column: &str, unit: PressureUnit) -> Self {
        self.pressure_column = Some((column.to_string(), unit));
        self
    }

    pub fn with_temperature_column(mut self, column: &str, unit: TemperatureUnit) -> Self {
        self.temperature_column = Some((column.to_string(), unit));
        self
    }

    /// Read `path`; the spectrum is named after the file stem.
    pub fn read_path<P: AsRef<Path>>(&self, path: P, number: u32) -> Result<Spectrum> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("spectrum_{}", number));
        let file = File::open(path)?;
        self.read(file, &name, number)
    }

    pub fn read<R: io::Read>(&self, reader: R, name: &str, number: u32) -> Result<Spectrum> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let columns = header_map(&headers);

        let find = |column: &str| {
            columns
                .get(column)
                .copied()
                .ok_or_else(|| SpecFitError::MissingData(format!("spectrum table has no '{}' column", column)))
        };
        let fi = find(&self.frequency_column)?;
        let si = find(&self.signal_column)?;
        let ui = self.uncertainty_column.as_ref().map(|(c, _)| find(c)).transpose()?;
        let pi = self.pressure_column.as_ref().map(|(c, _)| find(c)).transpose()?;
        let ti = self.temperature_column.as_ref().map(|(c, _)| find(c)).transpose()?;

        let mut rows: Vec<(f64, f64, Option<f64>)> = Vec::new();
        let mut pressure_sum = 0.0;
        let mut temperature_sum = 0.0;
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let line = row + 2;
            let cell = |i: usize| -> Result<f64> {
                let text = record.get(i).unwrap_or("");
                text.parse::<f64>().map_err(|_| {
                    SpecFitError::Configuration(format!(
                        "line {}: '{}' is not a number in column '{}'",
                        line,
                        text,
                        headers.get(i).unwrap_or("")
                    ))
                })
            };

            let nu = match self.frequency_unit {
                FrequencyUnit::Wavenumber => cell(fi)?,
                FrequencyUnit::MHz => mhz_to_wavenumber(cell(fi)?),
            };
            let raw = cell(si)?;
            let signal = match self.signal_unit {
                SignalUnit::Alpha | SignalUnit::Transmittance { .. } => raw,
                SignalUnit::RingdownMicroseconds => ringdown_to_alpha(raw),
            };
            let uncertainty = match (ui, &self.uncertainty_column) {
                (Some(i), Some((_, UncertaintyUnit::Absolute))) => Some(cell(i)?),
                (Some(i), Some((_, UncertaintyUnit::RelativePercent))) => Some(signal.abs() * cell(i)? / 100.0),
                _ => None,
            };
            if let (Some(i), Some((_, unit))) = (pi, &self.pressure_column) {
                pressure_sum += match unit {
                    PressureUnit::Atm => cell(i)?,
                    PressureUnit::Torr => cell(i)? / TORR_PER_ATM,
                };
            }
            if let (Some(i), Some((_, unit))) = (ti, &self.temperature_column) {
                temperature_sum += match unit {
                    TemperatureUnit::Kelvin => cell(i)?,
                    TemperatureUnit::Celsius => cell(i)? + 273.15,
                };
            }
            rows.push((nu, signal, uncertainty));
        }

        if rows.is_empty() {
            return Err(SpecFitError::MissingData(format!("spectrum table '{}' has no rows", name)));
        }
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        let count = rows.len() as f64;

        let frequency: Array1<f64> = rows.iter().map(|r| r.0).collect();
        let signal: Array1<f64> = rows.iter().map(|r| r.1).collect();
        let mut spectrum = Spectrum::new(name, number, frequency, signal)?;

        if ui.is_some() {
            let uncertainty: Array1<f64> = rows.iter().map(|r| r.2.unwrap_or(0.0)).collect();
            if uncertainty.iter().any(|&u| u <= 0.0) {
                warn!("spectrum '{}' has non-positive uncertainties; weighting will reject it", name);
            }
            spectrum = spectrum.with_uncertainty(uncertainty)?;
        }
        if pi.is_some() {
            spectrum.pressure = pressure_sum / count;
        }
        if ti.is_some() {
            spectrum.temperature = temperature_sum / count;
        }
        if let SignalUnit::Transmittance { path_length } = self.signal_unit {
            spectrum = spectrum.with_signal_kind(SignalKind::Transmittance { path_length });
        }

        debug!(
            "read spectrum '{}': {} points, {:.3} K, {:.5} atm",
            name,
            spectrum.len(),
            spectrum.temperature,
            spectrum.pressure
        );
        Ok(spectrum)
    }
}

fn header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().trim_start_matches('\u{feff}').to_string(), i))
        .collect()
}

//! Tabulated collision-induced absorption.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::io;

use crate::constants::{AMAGAT_TEMPERATURE, PPM};
use crate::error::{Result, SpecFitError};

/// Binary absorption coefficient `k(ν)` (cm⁻¹ amagat⁻²) of a species pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiaTable {
    /// Colliding species, named by molecule formula or diluent name.
    pub species: (String, String),
    frequency: Vec<f64>,
    coefficient: Vec<f64>,
}

impl CiaTable {
    /// Frequencies must be strictly increasing.
    pub fn new(species_a: &str, species_b: &str, frequency: Vec<f64>, coefficient: Vec<f64>) -> Result<Self> {
        if frequency.len() != coefficient.len() || frequency.is_empty() {
            return Err(SpecFitError::Configuration(format!(
                "CIA table {}-{}: {} frequencies and {} coefficients",
                species_a,
                species_b,
                frequency.len(),
                coefficient.len()
            )));
        }
        if frequency.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SpecFitError::Configuration(format!(
                "CIA table {}-{}: frequencies must be strictly increasing",
                species_a, species_b
            )));
        }
        Ok(Self {
            species: (species_a.to_string(), species_b.to_string()),
            frequency,
            coefficient,
        })
    }

    /// Read a two-column table (`frequency_column`, `coefficient_column`).
    pub fn read_csv<R: io::Read>(
        reader: R,
        species: (&str, &str),
        frequency_column: &str,
        coefficient_column: &str,
    ) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = reader.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == name)
                .ok_or_else(|| SpecFitError::MissingData(format!("CIA table has no '{}' column", name)))
        };
        let fi = position(frequency_column)?;
        let ci = position(coefficient_column)?;

        let mut frequency = Vec::new();
        let mut coefficient = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let parse = |i: usize| -> Result<f64> {
                record
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| SpecFitError::Configuration(format!("CIA table line {}: bad number", row + 2)))
            };
            frequency.push(parse(fi)?);
            coefficient.push(parse(ci)?);
        }
        Self::new(species.0, species.1, frequency, coefficient)
    }

    /// Linear interpolation; the end values hold outside the table.
    pub fn coefficient_at(&self, nu: f64) -> f64 {
        let n = self.frequency.len();
        if nu <= self.frequency[0] {
            return self.coefficient[0];
        }
        if nu >= self.frequency[n - 1] {
            return self.coefficient[n - 1];
        }
        // first index with frequency > nu; 1..n-1 here
        let hi = self.frequency.partition_point(|&f| f <= nu);
        let lo = hi - 1;
        let t = (nu - self.frequency[lo]) / (self.frequency[hi] - self.frequency[lo]);
        self.coefficient[lo] + t * (self.coefficient[hi] - self.coefficient[lo])
    }

    /// Absorption (ppm/cm) on `grid` for the given species fractions.
    pub fn absorption(&self, grid: &Array1<f64>, temperature: f64, pressure: f64, fraction_a: f64, fraction_b: f64) -> Array1<f64> {
        let amagat = pressure * AMAGAT_TEMPERATURE / temperature;
        let density = (amagat * fraction_a) * (amagat * fraction_b);
        grid.mapv(|nu| PPM * self.coefficient_at(nu) * density)
    }
}

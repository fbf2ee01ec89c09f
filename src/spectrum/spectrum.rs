//! Measured spectra and the conditions they were recorded at.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::REFERENCE_TEMPERATURE;
use crate::error::{Result, SpecFitError};
use crate::registry::molecule_name;
use crate::spectrum::cia::CiaTable;

const MIX_TOLERANCE: f64 = 1e-9;

/// Bath-gas composition: diluent names with their fractions.
///
/// ```
/// use specfit_rs::spectrum::DiluentMix;
///
/// let mix = DiluentMix::new([("air", 0.8)]).unwrap();
/// assert_eq!(mix.fraction("self"), Some(0.2));
/// assert!(DiluentMix::new([("air", 0.8), ("He", 0.3)]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiluentMix {
    components: Vec<(String, f64)>,
}

impl DiluentMix {
    /// Build a mix from `(name, fraction)` pairs. When the fractions sum to
    /// less than one and no `self` entry is given, `self` takes the rest.
    pub fn new<I, S>(components: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut mix: Vec<(String, f64)> = Vec::new();
        for (name, fraction) in components {
            let name = name.into();
            if !fraction.is_finite() || fraction < 0.0 {
                return Err(SpecFitError::Configuration(format!(
                    "diluent '{}' has invalid fraction {}",
                    name, fraction
                )));
            }
            if mix.iter().any(|(n, _)| *n == name) {
                return Err(SpecFitError::Configuration(format!("diluent '{}' listed twice", name)));
            }
            mix.push((name, fraction));
        }

        let total: f64 = mix.iter().map(|(_, f)| f).sum();
        if total > 1.0 + MIX_TOLERANCE {
            return Err(SpecFitError::Configuration(format!(
                "diluent fractions sum to {} (> 1)",
                total
            )));
        }
        if total < 1.0 - MIX_TOLERANCE && !mix.iter().any(|(n, _)| n == "self") {
            mix.push(("self".to_string(), 1.0 - total));
        }
        Ok(Self { components: mix })
    }

    pub fn air() -> Self {
        Self {
            components: vec![("air".to_string(), 1.0)],
        }
    }

    pub fn self_broadened() -> Self {
        Self {
            components: vec![("self".to_string(), 1.0)],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.components.iter().map(|(n, f)| (n.as_str(), *f))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|(n, _)| n.as_str())
    }

    pub fn fraction(&self, name: &str) -> Option<f64> {
        self.components.iter().find(|(n, _)| n == name).map(|(_, f)| *f)
    }
}

impl Default for DiluentMix {
    fn default() -> Self {
        Self::air()
    }
}

/// An additive instrumental sinusoid `amplitude · sin(2π ν / period + phase)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Etalon {
    pub amplitude: f64,
    /// Free spectral range (cm⁻¹).
    pub period: f64,
    /// Phase (rad).
    pub phase: f64,
}

impl Etalon {
    pub fn new(amplitude: f64, period: f64, phase: f64) -> Self {
        Self {
            amplitude,
            period,
            phase,
        }
    }

    #[inline]
    pub fn eval(&self, nu: f64) -> f64 {
        self.amplitude * (2.0 * std::f64::consts::PI * nu / self.period + self.phase).sin()
    }
}

/// What the signal column holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SignalKind {
    /// Absorption coefficient in ppm/cm.
    Alpha,
    /// Transmitted fraction through `path_length` cm.
    Transmittance { path_length: f64 },
}

/// One measured spectrum.
///
/// Samples are fixed at construction; everything else is set with the
/// `with_*` builders and checked by [`validate`](Self::validate).
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub name: String,
    pub number: u32,
    frequency: Array1<f64>,
    signal: Array1<f64>,
    uncertainty: Option<Array1<f64>>,
    /// Nominal temperature (K).
    pub temperature: f64,
    /// Nominal pressure (atm).
    pub pressure: f64,
    /// Mole fraction per molecule id. Only molecules listed here are simulated.
    pub mole_fractions: BTreeMap<u32, f64>,
    pub diluents: DiluentMix,
    /// Baseline polynomial coefficients in `ν − center`, constant term first.
    pub baseline: Vec<f64>,
    pub etalons: Vec<Etalon>,
    /// Added to every frequency point before the absorption is evaluated (cm⁻¹).
    pub x_shift: f64,
    /// Transitions up to this far outside the measured range are simulated (cm⁻¹).
    pub wave_range: f64,
    /// Transitions weaker than this are not simulated.
    pub intensity_threshold: f64,
    pub natural_abundance: bool,
    /// Residual multiplier.
    pub weight: f64,
    pub signal_kind: SignalKind,
    pub cia: Vec<CiaTable>,
}

impl Spectrum {
    /// Create a spectrum from its samples. Frequencies must be strictly
    /// monotonic and both arrays must have the same length.
    pub fn new(name: &str, number: u32, frequency: Array1<f64>, signal: Array1<f64>) -> Result<Self> {
        if frequency.len() != signal.len() {
            return Err(SpecFitError::Configuration(format!(
                "spectrum '{}': {} frequencies but {} signal values",
                name,
                frequency.len(),
                signal.len()
            )));
        }
        if frequency.is_empty() {
            return Err(SpecFitError::Configuration(format!("spectrum '{}' has no samples", name)));
        }
        let increasing = frequency.windows(2).into_iter().all(|w| w[1] > w[0]);
        let decreasing = frequency.windows(2).into_iter().all(|w| w[1] < w[0]);
        if !(increasing || decreasing) {
            return Err(SpecFitError::Configuration(format!(
                "spectrum '{}': frequencies are not strictly monotonic",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            number,
            frequency,
            signal,
            uncertainty: None,
            temperature: REFERENCE_TEMPERATURE,
            pressure: 1.0,
            mole_fractions: BTreeMap::new(),
            diluents: DiluentMix::air(),
            baseline: vec![0.0],
            etalons: Vec::new(),
            x_shift: 0.0,
            wave_range: 5.0,
            intensity_threshold: 1e-30,
            natural_abundance: true,
            weight: 1.0,
            signal_kind: SignalKind::Alpha,
            cia: Vec::new(),
        })
    }

    pub fn with_uncertainty(mut self, uncertainty: Array1<f64>) -> Result<Self> {
        if uncertainty.len() != self.frequency.len() {
            return Err(SpecFitError::Configuration(format!(
                "spectrum '{}': {} uncertainties for {} samples",
                self.name,
                uncertainty.len(),
                self.frequency.len()
            )));
        }
        self.uncertainty = Some(uncertainty);
        Ok(self)
    }

    /// Replace the measured signal, keeping the grid and every setting.
    pub fn with_signal(mut self, signal: Array1<f64>) -> Result<Self> {
        if signal.len() != self.frequency.len() {
            return Err(SpecFitError::Configuration(format!(
                "spectrum '{}': {} signal values for {} samples",
                self.name,
                signal.len(),
                self.frequency.len()
            )));
        }
        self.signal = signal;
        Ok(self)
    }

    pub fn with_conditions(mut self, temperature: f64, pressure: f64) -> Self {
        self.temperature = temperature;
        self.pressure = pressure;
        self
    }

    pub fn with_mole_fraction(mut self, molecule: u32, fraction: f64) -> Self {
        self.mole_fractions.insert(molecule, fraction);
        self
    }

    pub fn with_diluents(mut self, diluents: DiluentMix) -> Self {
        self.diluents = diluents;
        self
    }

    pub fn with_baseline(mut self, coefficients: Vec<f64>) -> Self {
        self.baseline = coefficients;
        self
    }

    /// Resize the baseline polynomial to `order`, keeping existing coefficients.
    pub fn with_baseline_order(mut self, order: usize) -> Self {
        self.baseline.resize(order + 1, 0.0);
        self
    }

    pub fn with_etalon(mut self, etalon: Etalon) -> Self {
        self.etalons.push(etalon);
        self
    }

    pub fn with_x_shift(mut self, shift: f64) -> Self {
        self.x_shift = shift;
        self
    }

    pub fn with_wave_range(mut self, range: f64) -> Self {
        self.wave_range = range;
        self
    }

    pub fn with_intensity_threshold(mut self, threshold: f64) -> Self {
        self.intensity_threshold = threshold;
        self
    }

    pub fn with_natural_abundance(mut self, enabled: bool) -> Self {
        self.natural_abundance = enabled;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Switch the signal kind. A transmittance spectrum whose baseline is
    /// still the default zero constant gets a unit baseline.
    pub fn with_signal_kind(mut self, kind: SignalKind) -> Self {
        if matches!(kind, SignalKind::Transmittance { .. }) && self.baseline == [0.0] {
            self.baseline = vec![1.0];
        }
        self.signal_kind = kind;
        self
    }

    pub fn with_cia(mut self, table: CiaTable) -> Self {
        self.cia.push(table);
        self
    }

    pub fn frequency(&self) -> &Array1<f64> {
        &self.frequency
    }

    pub fn signal(&self) -> &Array1<f64> {
        &self.signal
    }

    pub fn uncertainty(&self) -> Option<&Array1<f64>> {
        self.uncertainty.as_ref()
    }

    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    pub fn min_frequency(&self) -> f64 {
        self.frequency.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_frequency(&self) -> f64 {
        self.frequency.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Midpoint of the measured range; the baseline polynomial is expanded
    /// around it.
    pub fn center(&self) -> f64 {
        0.5 * (self.min_frequency() + self.max_frequency())
    }

    pub fn baseline_order(&self) -> usize {
        self.baseline.len().saturating_sub(1)
    }

    /// Fraction of a named species: a molecule in `mole_fractions` (looked
    /// up by its formula) or a diluent of the mix.
    pub fn species_fraction(&self, species: &str, mole_fractions: &BTreeMap<u32, f64>) -> Option<f64> {
        mole_fractions
            .iter()
            .find(|(&id, _)| molecule_name(id) == Some(species))
            .map(|(_, &x)| x)
            .or_else(|| self.diluents.fraction(species))
    }

    /// Check conditions, selection settings and the CIA species.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(SpecFitError::Configuration(format!("spectrum '{}': {}", self.name, message)));

        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return fail(format!("temperature must be > 0 K, got {}", self.temperature));
        }
        if !(self.pressure.is_finite() && self.pressure >= 0.0) {
            return fail(format!("pressure must be >= 0 atm, got {}", self.pressure));
        }
        if self.baseline.is_empty() {
            return fail("baseline needs at least a constant term".to_string());
        }
        if !(self.wave_range.is_finite() && self.wave_range >= 0.0) {
            return fail(format!("invalid wave range {}", self.wave_range));
        }
        if !(self.weight.is_finite() && self.weight >= 0.0) {
            return fail(format!("invalid weight {}", self.weight));
        }
        for (molecule, fraction) in &self.mole_fractions {
            if !(0.0..=1.0).contains(fraction) {
                return fail(format!("mole fraction {} of molecule {} is outside [0, 1]", fraction, molecule));
            }
        }
        for (k, etalon) in self.etalons.iter().enumerate() {
            if etalon.period == 0.0 || !etalon.period.is_finite() {
                return fail(format!("etalon {} has invalid period {}", k + 1, etalon.period));
            }
        }
        if let Some(u) = &self.uncertainty {
            if u.iter().any(|&v| !(v.is_finite() && v > 0.0)) {
                return fail("uncertainties must be positive and finite".to_string());
            }
        }
        if let SignalKind::Transmittance { path_length } = self.signal_kind {
            if !(path_length.is_finite() && path_length > 0.0) {
                return fail(format!("invalid path length {}", path_length));
            }
        }
        for table in &self.cia {
            for species in [&table.species.0, &table.species.1] {
                if self.species_fraction(species, &self.mole_fractions).is_none() {
                    return fail(format!("CIA species '{}' is neither a listed molecule nor a diluent", species));
                }
            }
        }
        Ok(())
    }
}

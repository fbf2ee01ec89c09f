//! Simulated signal and residual of one spectrum.

use log::debug;
use ndarray::Array1;
use std::collections::BTreeMap;

use crate::constants::{number_density, PPM};
use crate::error::{Result, SpecFitError};
use crate::lineshape::LineShapeModel;
use crate::parameters::{ParameterVector, SpectrumLayout};
use crate::registry::{ResolvedTransition, TransitionRegistry};
use crate::spectrum::spectrum::{Etalon, SignalKind, Spectrum};

/// Model components of one spectrum on its measured frequency grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedSpectrum {
    pub spectrum_number: u32,
    pub frequency: Array1<f64>,
    pub measured: Array1<f64>,
    /// Line absorption (ppm/cm).
    pub absorption: Array1<f64>,
    /// Collision-induced absorption (ppm/cm).
    pub cia: Array1<f64>,
    pub baseline: Array1<f64>,
    pub etalon: Array1<f64>,
    /// Signal comparable to `measured`.
    pub model: Array1<f64>,
    pub residual: Array1<f64>,
}

/// Evaluates one spectrum against a parameter vector.
///
/// The transitions it simulates are the ones recorded for this spectrum in
/// the vector's layout; [`select`](Self::select) is only consulted when a
/// vector is built.
#[derive(Debug, Clone)]
pub struct SpectrumModel<'a> {
    registry: &'a TransitionRegistry,
    spectrum: &'a Spectrum,
    shape: LineShapeModel,
    weighted: bool,
}

impl<'a> SpectrumModel<'a> {
    /// The shape model's intensity threshold is replaced by the spectrum's.
    pub fn new(registry: &'a TransitionRegistry, spectrum: &'a Spectrum, shape: &LineShapeModel) -> Self {
        Self {
            registry,
            spectrum,
            shape: shape.clone().with_intensity_threshold(spectrum.intensity_threshold),
            weighted: false,
        }
    }

    /// Divide residuals by the per-point uncertainty when the spectrum has one.
    pub fn with_weighting(mut self, weighted: bool) -> Self {
        self.weighted = weighted;
        self
    }

    pub fn spectrum(&self) -> &Spectrum {
        self.spectrum
    }

    /// `[min(ν) − wave_range, max(ν) + wave_range]`
    pub fn window(&self) -> (f64, f64) {
        (
            self.spectrum.min_frequency() - self.spectrum.wave_range,
            self.spectrum.max_frequency() + self.spectrum.wave_range,
        )
    }

    /// Transitions this spectrum simulates: molecule present in the mole
    /// fractions, pressure-shifted center inside the window and resolved
    /// intensity at or above the threshold. Registry order.
    pub fn select(&self) -> Result<Vec<ResolvedTransition>> {
        let (lo, hi) = self.window();
        let s = self.spectrum;
        let mut selected = Vec::new();
        for transition in self.registry.iter() {
            if !s.mole_fractions.contains_key(&transition.id.molecule) {
                continue;
            }
            let resolved = self
                .registry
                .resolve_with(transition.id, s.temperature, s.natural_abundance, Some(s.number))?;
            if resolved.intensity < s.intensity_threshold {
                continue;
            }
            let widths = self.shape.widths(&resolved, s.temperature, s.pressure, &s.diluents)?;
            let center = resolved.nu + widths.htp.delta0;
            if center < lo || center > hi {
                continue;
            }
            selected.push(resolved);
        }
        debug!(
            "spectrum {}: {} of {} transitions selected in [{:.4}, {:.4}]",
            s.number,
            selected.len(),
            self.registry.len(),
            lo,
            hi
        );
        Ok(selected)
    }

    fn layout<'v>(&self, vector: &'v ParameterVector) -> Result<&'v SpectrumLayout> {
        vector.layout().spectrum(self.spectrum.number).ok_or_else(|| {
            SpecFitError::Configuration(format!(
                "parameter vector has no entries for spectrum {}",
                self.spectrum.number
            ))
        })
    }

    /// Simulate every model component with the values in `vector`.
    pub fn simulate(&self, vector: &ParameterVector) -> Result<SimulatedSpectrum> {
        let s = self.spectrum;
        let layout = self.layout(vector)?;
        let nu = s.frequency();
        let n = nu.len();

        let x_shift = layout.x_shift.map_or(s.x_shift, |i| vector.value_at(i));
        let mut mole_fractions = s.mole_fractions.clone();
        for (&molecule, &entry) in &layout.mole_fractions {
            mole_fractions.insert(molecule, vector.value_at(entry));
        }
        let shifted = nu.mapv(|v| v + x_shift);

        // lines
        let density = number_density(s.pressure, s.temperature);
        let mut absorption = Array1::zeros(n);
        for binding in &layout.lines {
            let transition = self.registry.get(binding.id)?;
            let mut params = transition.params_for(Some(s.number));
            for slot in &binding.slots {
                params.set(slot.quantity, slot.diluent.as_deref(), vector.value_at(slot.entry));
            }
            let resolved = self
                .registry
                .resolve_params(transition, &params, s.temperature, s.natural_abundance)?;
            let fraction = mole_fractions.get(&binding.id.molecule).copied().unwrap_or(0.0);
            self.shape.accumulate(
                &shifted,
                &resolved,
                s.temperature,
                s.pressure,
                &s.diluents,
                PPM * density * fraction,
                &mut absorption,
            )?;
        }

        let cia = self.cia(&shifted, &mole_fractions)?;

        // baseline and etalons on the measured axis
        let coefficients: Vec<f64> = if layout.baseline.is_empty() {
            s.baseline.clone()
        } else {
            layout.baseline.iter().map(|&i| vector.value_at(i)).collect()
        };
        let center = s.center();
        let baseline = nu.mapv(|v| {
            let dx = v - center;
            coefficients.iter().rev().fold(0.0, |acc, &a| acc * dx + a)
        });

        let etalons: Vec<Etalon> = if layout.etalons.is_empty() {
            s.etalons.clone()
        } else {
            layout
                .etalons
                .iter()
                .map(|&[a, p, ph]| Etalon::new(vector.value_at(a), vector.value_at(p), vector.value_at(ph)))
                .collect()
        };
        let etalon = nu.mapv(|v| etalons.iter().map(|e| e.eval(v)).sum::<f64>());

        let alpha = &absorption + &cia;
        let model = match s.signal_kind {
            SignalKind::Alpha => &alpha + &baseline + &etalon,
            SignalKind::Transmittance { path_length } => {
                let transmitted = alpha.mapv(|a| (-a / PPM * path_length).exp());
                &baseline * &transmitted + &etalon
            }
        };

        let mut residual = (&model - s.signal()) * s.weight;
        if self.weighted {
            if let Some(u) = s.uncertainty() {
                residual = residual / u;
            }
        }

        Ok(SimulatedSpectrum {
            spectrum_number: s.number,
            frequency: nu.clone(),
            measured: s.signal().clone(),
            absorption,
            cia,
            baseline,
            etalon,
            model,
            residual,
        })
    }

    /// Weighted `simulated − measured`.
    pub fn residual(&self, vector: &ParameterVector) -> Result<Array1<f64>> {
        Ok(self.simulate(vector)?.residual)
    }

    fn cia(&self, grid: &Array1<f64>, mole_fractions: &BTreeMap<u32, f64>) -> Result<Array1<f64>> {
        let s = self.spectrum;
        let mut total = Array1::zeros(grid.len());
        for table in &s.cia {
            let fraction = |name: &str| {
                s.species_fraction(name, mole_fractions).ok_or_else(|| {
                    SpecFitError::Configuration(format!(
                        "spectrum {}: unknown CIA species '{}'",
                        s.number, name
                    ))
                })
            };
            let a = fraction(&table.species.0)?;
            let b = fraction(&table.species.1)?;
            total += &table.absorption(grid, s.temperature, s.pressure, a, b);
        }
        Ok(total)
    }
}

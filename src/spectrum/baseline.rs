//! Per-spectrum nuisance parameters.

use std::collections::BTreeMap;
use std::fmt;

use crate::spectrum::spectrum::{Etalon, Spectrum};

/// A fittable scalar that belongs to one spectrum rather than to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpectrumQuantity {
    /// Polynomial coefficient of order `k`.
    Baseline(usize),
    /// Amplitude of etalon `k` (0-based).
    EtalonAmplitude(usize),
    EtalonPeriod(usize),
    EtalonPhase(usize),
    /// Mole fraction of a molecule id.
    MoleFraction(u32),
    XShift,
}

/// `a`, `b`, … `z`, then `c26`, `c27`, …
fn baseline_label(order: usize) -> String {
    if order < 26 {
        ((b'a' + order as u8) as char).to_string()
    } else {
        format!("c{}", order)
    }
}

impl SpectrumQuantity {
    /// Column name in the baseline list, e.g. `baseline_b` or `etalon_1_amp`.
    pub fn column_name(&self) -> String {
        match *self {
            SpectrumQuantity::Baseline(k) => format!("baseline_{}", baseline_label(k)),
            SpectrumQuantity::EtalonAmplitude(k) => format!("etalon_{}_amp", k + 1),
            SpectrumQuantity::EtalonPeriod(k) => format!("etalon_{}_period", k + 1),
            SpectrumQuantity::EtalonPhase(k) => format!("etalon_{}_phase", k + 1),
            SpectrumQuantity::MoleFraction(m) => format!("molefraction_{}", m),
            SpectrumQuantity::XShift => "x_shift".to_string(),
        }
    }

    pub fn parameter_name(&self, spectrum_number: u32) -> String {
        format!("{}_{}", self.column_name(), spectrum_number)
    }
}

impl fmt::Display for SpectrumQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.column_name())
    }
}

/// Baseline, etalon, mole-fraction and shift values of one spectrum, as
/// initially given and as updated after a fit.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineEntry {
    pub spectrum_number: u32,
    pub baseline: Vec<f64>,
    pub etalons: Vec<Etalon>,
    pub mole_fractions: BTreeMap<u32, f64>,
    pub x_shift: f64,
    /// Standard errors keyed by column name.
    pub stderr: BTreeMap<String, f64>,
}

impl BaselineEntry {
    pub fn from_spectrum(spectrum: &Spectrum) -> Self {
        Self {
            spectrum_number: spectrum.number,
            baseline: spectrum.baseline.clone(),
            etalons: spectrum.etalons.clone(),
            mole_fractions: spectrum.mole_fractions.clone(),
            x_shift: spectrum.x_shift,
            stderr: BTreeMap::new(),
        }
    }

    /// Every quantity of this entry: mole fractions, shift, baseline, etalons.
    pub fn quantities(&self) -> Vec<SpectrumQuantity> {
        let mut out: Vec<SpectrumQuantity> = self
            .mole_fractions
            .keys()
            .map(|&m| SpectrumQuantity::MoleFraction(m))
            .collect();
        out.push(SpectrumQuantity::XShift);
        out.extend((0..self.baseline.len()).map(SpectrumQuantity::Baseline));
        for k in 0..self.etalons.len() {
            out.push(SpectrumQuantity::EtalonAmplitude(k));
            out.push(SpectrumQuantity::EtalonPeriod(k));
            out.push(SpectrumQuantity::EtalonPhase(k));
        }
        out
    }

    pub fn value(&self, quantity: SpectrumQuantity) -> Option<f64> {
        match quantity {
            SpectrumQuantity::Baseline(k) => self.baseline.get(k).copied(),
            SpectrumQuantity::EtalonAmplitude(k) => self.etalons.get(k).map(|e| e.amplitude),
            SpectrumQuantity::EtalonPeriod(k) => self.etalons.get(k).map(|e| e.period),
            SpectrumQuantity::EtalonPhase(k) => self.etalons.get(k).map(|e| e.phase),
            SpectrumQuantity::MoleFraction(m) => self.mole_fractions.get(&m).copied(),
            SpectrumQuantity::XShift => Some(self.x_shift),
        }
    }

    /// Returns `false` if the quantity does not exist in this entry.
    pub fn set(&mut self, quantity: SpectrumQuantity, value: f64) -> bool {
        let slot = match quantity {
            SpectrumQuantity::Baseline(k) => self.baseline.get_mut(k),
            SpectrumQuantity::EtalonAmplitude(k) => self.etalons.get_mut(k).map(|e| &mut e.amplitude),
            SpectrumQuantity::EtalonPeriod(k) => self.etalons.get_mut(k).map(|e| &mut e.period),
            SpectrumQuantity::EtalonPhase(k) => self.etalons.get_mut(k).map(|e| &mut e.phase),
            SpectrumQuantity::MoleFraction(m) => self.mole_fractions.get_mut(&m),
            SpectrumQuantity::XShift => Some(&mut self.x_shift),
        };
        match slot {
            Some(v) => {
                *v = value;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn entry() -> BaselineEntry {
        let spectrum = Spectrum::new("s", 3, Array1::linspace(1.0, 2.0, 5), Array1::zeros(5))
            .unwrap()
            .with_mole_fraction(2, 0.01)
            .with_baseline(vec![10.0, 0.5])
            .with_etalon(Etalon::new(0.1, 1.2, 0.0));
        BaselineEntry::from_spectrum(&spectrum)
    }

    #[test]
    fn test_names() {
        assert_eq!(SpectrumQuantity::Baseline(0).parameter_name(3), "baseline_a_3");
        assert_eq!(SpectrumQuantity::Baseline(2).column_name(), "baseline_c");
        assert_eq!(SpectrumQuantity::Baseline(30).column_name(), "baseline_c30");
        assert_eq!(SpectrumQuantity::EtalonPhase(0).parameter_name(1), "etalon_1_phase_1");
        assert_eq!(SpectrumQuantity::MoleFraction(7).parameter_name(2), "molefraction_7_2");
        assert_eq!(SpectrumQuantity::XShift.parameter_name(4), "x_shift_4");
    }

    #[test]
    fn test_quantities_and_values() {
        let mut e = entry();
        let q = e.quantities();
        assert_eq!(q.len(), 1 + 1 + 2 + 3);
        assert_eq!(q[0], SpectrumQuantity::MoleFraction(2));
        assert_eq!(e.value(SpectrumQuantity::Baseline(1)), Some(0.5));
        assert_eq!(e.value(SpectrumQuantity::EtalonPeriod(0)), Some(1.2));

        assert!(e.set(SpectrumQuantity::EtalonAmplitude(0), 0.3));
        assert_eq!(e.etalons[0].amplitude, 0.3);
        assert!(!e.set(SpectrumQuantity::Baseline(5), 1.0));
        assert!(!e.set(SpectrumQuantity::MoleFraction(1), 1.0));
    }
}

//! A set of spectra fitted together, with their nuisance parameters.

use std::collections::BTreeSet;

use crate::error::{Result, SpecFitError};
use crate::spectrum::{BaselineEntry, Spectrum};

/// Spectra in registration order plus one [`BaselineEntry`] per spectrum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub name: String,
    spectra: Vec<Spectrum>,
    baselines: Vec<BaselineEntry>,
}

impl Dataset {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Validate and register a spectrum. Spectrum numbers must be unique.
    pub fn add_spectrum(&mut self, spectrum: Spectrum) -> Result<()> {
        spectrum.validate()?;
        if self.spectra.iter().any(|s| s.number == spectrum.number) {
            return Err(SpecFitError::Configuration(format!(
                "spectrum number {} is used twice",
                spectrum.number
            )));
        }
        self.baselines.push(BaselineEntry::from_spectrum(&spectrum));
        self.spectra.push(spectrum);
        Ok(())
    }

    pub fn with_spectrum(mut self, spectrum: Spectrum) -> Result<Self> {
        self.add_spectrum(spectrum)?;
        Ok(self)
    }

    pub fn spectra(&self) -> &[Spectrum] {
        &self.spectra
    }

    pub fn spectrum(&self, number: u32) -> Option<&Spectrum> {
        self.spectra.iter().find(|s| s.number == number)
    }

    pub fn baselines(&self) -> &[BaselineEntry] {
        &self.baselines
    }

    pub fn baseline(&self, number: u32) -> Option<&BaselineEntry> {
        self.baselines.iter().find(|b| b.spectrum_number == number)
    }

    pub fn baseline_mut(&mut self, number: u32) -> Option<&mut BaselineEntry> {
        self.baselines.iter_mut().find(|b| b.spectrum_number == number)
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Total number of samples.
    pub fn point_count(&self) -> usize {
        self.spectra.iter().map(Spectrum::len).sum()
    }

    /// Molecule ids with a mole fraction in any spectrum.
    pub fn molecules(&self) -> BTreeSet<u32> {
        self.spectra
            .iter()
            .flat_map(|s| s.mole_fractions.keys().copied())
            .collect()
    }

    /// Largest baseline polynomial order over all spectra.
    pub fn max_baseline_order(&self) -> usize {
        self.spectra.iter().map(Spectrum::baseline_order).max().unwrap_or(0)
    }
}

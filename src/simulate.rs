//! Synthetic spectra: the forward model evaluated on a spectrum's grid,
//! optionally with Gaussian noise.

use log::debug;
use ndarray::Array1;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::dataset::Dataset;
use crate::error::{Result, SpecFitError};
use crate::fit::{FitConfig, FitOrchestrator};
use crate::registry::TransitionRegistry;
use crate::spectrum::Spectrum;

/// Noise added to a simulated signal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum NoiseSpec {
    #[default]
    None,
    /// Standard deviation in signal units.
    Absolute(f64),
    /// Peak line absorption over the noise standard deviation.
    Snr(f64),
}

impl NoiseSpec {
    fn sigma(self, peak: f64) -> Result<f64> {
        let sigma = match self {
            NoiseSpec::None => 0.0,
            NoiseSpec::Absolute(sigma) => sigma,
            NoiseSpec::Snr(snr) if snr > 0.0 => peak / snr,
            NoiseSpec::Snr(snr) => {
                return Err(SpecFitError::Configuration(format!("SNR must be positive, got {}", snr)))
            }
        };
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(SpecFitError::Configuration(format!("invalid noise level {}", sigma)));
        }
        Ok(sigma)
    }
}

/// Simulates spectra from a line list with a given profile.
#[derive(Debug, Clone)]
pub struct SpectrumSimulator<'a> {
    registry: &'a TransitionRegistry,
    config: FitConfig,
    noise: NoiseSpec,
}

impl<'a> SpectrumSimulator<'a> {
    /// Only the profile, line-mixing and wing-cutoff settings of `config`
    /// matter here.
    pub fn new(registry: &'a TransitionRegistry, config: FitConfig) -> Self {
        Self {
            registry,
            config,
            noise: NoiseSpec::None,
        }
    }

    pub fn with_noise(mut self, noise: NoiseSpec) -> Self {
        self.noise = noise;
        self
    }

    /// Copy of `template` whose signal is the model on its grid plus noise.
    /// With noise, the per-point uncertainty is set to the noise level.
    pub fn simulate<R: Rng + ?Sized>(&self, template: &Spectrum, rng: &mut R) -> Result<Spectrum> {
        let dataset = Dataset::new(&template.name).with_spectrum(template.clone())?;
        let orchestrator = FitOrchestrator::new(self.registry, &dataset, &self.config)?;
        let vector = orchestrator.build_parameters()?;
        let simulated = orchestrator
            .simulate(&vector)?
            .pop()
            .ok_or_else(|| SpecFitError::FunctionEvaluation("simulation returned no spectrum".to_string()))?;

        let lines = &simulated.absorption + &simulated.cia;
        let peak = lines.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let sigma = self.noise.sigma(peak)?;
        debug!(
            "simulated spectrum {}: peak absorption {:.4e}, noise sigma {:.4e}",
            template.number, peak, sigma
        );

        let spectrum = template.clone();
        if sigma == 0.0 {
            return spectrum.with_signal(simulated.model);
        }
        let normal = Normal::new(0.0, sigma)
            .map_err(|e| SpecFitError::Configuration(format!("noise distribution: {}", e)))?;
        let noisy = simulated.model.mapv(|v| v + normal.sample(rng));
        spectrum
            .with_signal(noisy)?
            .with_uncertainty(Array1::from_elem(template.len(), sigma))
    }
}

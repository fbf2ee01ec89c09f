//! Fit configuration: profile, constraint flags, vary specs and bound
//! limits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fs::File;
use std::path::Path;

use crate::error::{Result, SpecFitError};
use crate::lineshape::{LineShapeModel, ProfileKind};
use crate::parameters::Bounds;
use crate::registry::{LineQuantity, TransitionId, TransitionRegistry};
use crate::spectrum::SpectrumQuantity;

/// Whether each line-quantity family is shared across spectra.
///
/// Temperature exponents have no flag: they are always shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstrainFlags {
    pub nu: bool,
    pub sw: bool,
    pub gamma0: bool,
    pub delta0: bool,
    #[serde(rename = "SD_gamma")]
    pub sd_gamma: bool,
    #[serde(rename = "SD_delta")]
    pub sd_delta: bool,
    #[serde(rename = "nuVC")]
    pub nu_vc: bool,
    pub eta: bool,
    pub linemixing: bool,
}

impl Default for ConstrainFlags {
    fn default() -> Self {
        Self {
            nu: true,
            sw: true,
            gamma0: true,
            delta0: true,
            sd_gamma: true,
            sd_delta: true,
            nu_vc: true,
            eta: true,
            linemixing: true,
        }
    }
}

impl ConstrainFlags {
    /// Whether `quantity` gets one entry shared by every spectrum.
    pub fn is_shared(&self, quantity: LineQuantity) -> bool {
        match quantity {
            LineQuantity::Nu => self.nu,
            LineQuantity::Sw => self.sw,
            LineQuantity::Gamma0 => self.gamma0,
            LineQuantity::Delta0 => self.delta0,
            LineQuantity::SdGamma => self.sd_gamma,
            LineQuantity::SdDelta => self.sd_delta,
            LineQuantity::NuVc => self.nu_vc,
            LineQuantity::Eta => self.eta,
            LineQuantity::LineMixing => self.linemixing,
            LineQuantity::NGamma0
            | LineQuantity::NDelta0
            | LineQuantity::NGamma2
            | LineQuantity::NDelta2
            | LineQuantity::NNuVc => true,
        }
    }

    /// Set every flag at once.
    pub fn all(shared: bool) -> Self {
        Self {
            nu: shared,
            sw: shared,
            gamma0: shared,
            delta0: shared,
            sd_gamma: shared,
            sd_delta: shared,
            nu_vc: shared,
            eta: shared,
            linemixing: shared,
        }
    }
}

/// Per-transition vary override.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionVary {
    pub id: TransitionId,
    pub vary: bool,
}

/// Which transitions vary one line quantity: `{molecule: {isotope: bool}}`
/// plus per-transition overrides. Anything not listed is fixed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarySpec {
    pub isotopes: BTreeMap<u32, BTreeMap<u32, bool>>,
    pub transitions: Vec<TransitionVary>,
}

impl VarySpec {
    /// Vary every isotope listed in `pairs`.
    pub fn isotopes(pairs: &[(u32, u32)]) -> Self {
        let mut spec = Self::default();
        for &(molecule, isotope) in pairs {
            spec.isotopes.entry(molecule).or_default().insert(isotope, true);
        }
        spec
    }

    pub fn with_transition(mut self, id: TransitionId, vary: bool) -> Self {
        self.transitions.push(TransitionVary { id, vary });
        self
    }

    /// The last matching transition override wins over the isotope flag.
    pub fn is_varied(&self, id: TransitionId) -> bool {
        if let Some(t) = self.transitions.iter().rev().find(|t| t.id == id) {
            return t.vary;
        }
        self.isotopes
            .get(&id.molecule)
            .and_then(|isotopes| isotopes.get(&id.isotope))
            .copied()
            .unwrap_or(false)
    }

    fn validate(&self, label: &str, registry: &TransitionRegistry) -> Result<()> {
        let molecules = registry.molecules();
        for (&molecule, isotopes) in &self.isotopes {
            if !molecules.contains(&molecule) {
                return Err(SpecFitError::Configuration(format!(
                    "vary spec for '{}' names molecule {}, which has no transitions",
                    label, molecule
                )));
            }
            for &isotope in isotopes.keys() {
                if !registry.has_isotope(molecule, isotope) {
                    return Err(SpecFitError::Configuration(format!(
                        "vary spec for '{}' names isotope {} of molecule {}, which has no transitions",
                        label, isotope, molecule
                    )));
                }
            }
        }
        for t in &self.transitions {
            if !registry.contains(t.id) {
                return Err(SpecFitError::Configuration(format!(
                    "vary spec for '{}' names transition {}, which is not in the line list",
                    label, t.id
                )));
            }
        }
        Ok(())
    }
}

/// Which per-spectrum quantities vary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaryConfig {
    /// Line quantities keyed by label (`nu`, `sw`, `gamma0`, `SD_gamma`, `y`, …).
    pub lines: BTreeMap<String, VarySpec>,
    pub baseline: bool,
    /// Mole fraction per molecule id.
    pub molefraction: BTreeMap<u32, bool>,
    pub x_shift: bool,
    pub etalon_amplitude: bool,
    pub etalon_period: bool,
    pub etalon_phase: bool,
}

impl Default for VaryConfig {
    fn default() -> Self {
        Self {
            lines: BTreeMap::new(),
            baseline: true,
            molefraction: BTreeMap::new(),
            x_shift: false,
            etalon_amplitude: false,
            etalon_period: false,
            etalon_phase: false,
        }
    }
}

impl VaryConfig {
    pub fn with_line(mut self, quantity: LineQuantity, spec: VarySpec) -> Self {
        self.lines.insert(quantity.label().to_string(), spec);
        self
    }

    pub fn line_spec(&self, quantity: LineQuantity) -> Option<&VarySpec> {
        self.lines.get(quantity.label())
    }

    pub fn spectrum_quantity(&self, quantity: SpectrumQuantity) -> bool {
        match quantity {
            SpectrumQuantity::Baseline(_) => self.baseline,
            SpectrumQuantity::EtalonAmplitude(_) => self.etalon_amplitude,
            SpectrumQuantity::EtalonPeriod(_) => self.etalon_period,
            SpectrumQuantity::EtalonPhase(_) => self.etalon_phase,
            SpectrumQuantity::MoleFraction(m) => self.molefraction.get(&m).copied().unwrap_or(false),
            SpectrumQuantity::XShift => self.x_shift,
        }
    }
}

/// How a [`Limit`] turns a starting value into bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// `[V − F, V + F]`
    Additive,
    /// `[V/F, V·F]`, sorted for negative V
    Multiplicative,
    /// `[−F, F]` whatever V is
    Symmetric,
}

/// Bound policy of one parameter category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    pub enabled: bool,
    pub factor: f64,
}

impl Limit {
    pub const fn disabled(factor: f64) -> Self {
        Self {
            enabled: false,
            factor,
        }
    }

    pub const fn enabled(factor: f64) -> Self {
        Self { enabled: true, factor }
    }

    /// Bounds for a parameter starting at `value`. `None` means unbounded:
    /// either the limit is disabled or a multiplicative limit meets `V = 0`.
    pub fn bounds(&self, kind: LimitKind, value: f64) -> Option<Bounds> {
        if !self.enabled {
            return None;
        }
        match kind {
            LimitKind::Additive => Some(Bounds::additive(value, self.factor)),
            LimitKind::Multiplicative => Bounds::multiplicative(value, self.factor),
            LimitKind::Symmetric => Some(Bounds::additive(0.0, self.factor)),
        }
    }
}

/// Bound policy per category. Every limit is disabled by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    pub nu: Limit,
    pub sw: Limit,
    pub gamma0: Limit,
    pub n_gamma0: Limit,
    pub delta0: Limit,
    pub n_delta0: Limit,
    #[serde(rename = "SD_gamma")]
    pub sd_gamma: Limit,
    pub n_gamma2: Limit,
    #[serde(rename = "SD_delta")]
    pub sd_delta: Limit,
    pub n_delta2: Limit,
    #[serde(rename = "nuVC")]
    pub nu_vc: Limit,
    #[serde(rename = "n_nuVC")]
    pub n_nu_vc: Limit,
    pub eta: Limit,
    pub linemixing: Limit,
    pub baseline: Limit,
    pub molefraction: Limit,
    pub x_shift: Limit,
    pub etalon_amplitude: Limit,
    pub etalon_period: Limit,
    pub etalon_phase: Limit,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            nu: Limit::disabled(0.1),
            sw: Limit::disabled(2.0),
            gamma0: Limit::disabled(3.0),
            n_gamma0: Limit::disabled(50.0),
            delta0: Limit::disabled(2.0),
            n_delta0: Limit::disabled(50.0),
            sd_gamma: Limit::disabled(2.0),
            n_gamma2: Limit::disabled(50.0),
            sd_delta: Limit::disabled(50.0),
            n_delta2: Limit::disabled(50.0),
            nu_vc: Limit::disabled(2.0),
            n_nu_vc: Limit::disabled(50.0),
            eta: Limit::disabled(50.0),
            linemixing: Limit::disabled(50.0),
            baseline: Limit::disabled(10.0),
            molefraction: Limit::disabled(1.1),
            x_shift: Limit::disabled(0.5),
            etalon_amplitude: Limit::disabled(2.0),
            etalon_period: Limit::disabled(2.0),
            etalon_phase: Limit::disabled(2.0 * PI),
        }
    }
}

impl LimitConfig {
    /// Enable every category with its current factor.
    pub fn all_enabled() -> Self {
        let d = Self::default();
        let on = |l: Limit| Limit::enabled(l.factor);
        Self {
            nu: on(d.nu),
            sw: on(d.sw),
            gamma0: on(d.gamma0),
            n_gamma0: on(d.n_gamma0),
            delta0: on(d.delta0),
            n_delta0: on(d.n_delta0),
            sd_gamma: on(d.sd_gamma),
            n_gamma2: on(d.n_gamma2),
            sd_delta: on(d.sd_delta),
            n_delta2: on(d.n_delta2),
            nu_vc: on(d.nu_vc),
            n_nu_vc: on(d.n_nu_vc),
            eta: on(d.eta),
            linemixing: on(d.linemixing),
            baseline: on(d.baseline),
            molefraction: on(d.molefraction),
            x_shift: on(d.x_shift),
            etalon_amplitude: on(d.etalon_amplitude),
            etalon_period: on(d.etalon_period),
            etalon_phase: on(d.etalon_phase),
        }
    }

    pub fn line(&self, quantity: LineQuantity) -> (LimitKind, &Limit) {
        let limit = match quantity {
            LineQuantity::Nu => return (LimitKind::Additive, &self.nu),
            LineQuantity::Sw => &self.sw,
            LineQuantity::Gamma0 => &self.gamma0,
            LineQuantity::NGamma0 => &self.n_gamma0,
            LineQuantity::Delta0 => &self.delta0,
            LineQuantity::NDelta0 => &self.n_delta0,
            LineQuantity::SdGamma => &self.sd_gamma,
            LineQuantity::NGamma2 => &self.n_gamma2,
            LineQuantity::SdDelta => &self.sd_delta,
            LineQuantity::NDelta2 => &self.n_delta2,
            LineQuantity::NuVc => &self.nu_vc,
            LineQuantity::NNuVc => &self.n_nu_vc,
            LineQuantity::Eta => &self.eta,
            LineQuantity::LineMixing => &self.linemixing,
        };
        (LimitKind::Multiplicative, limit)
    }

    pub fn spectrum(&self, quantity: SpectrumQuantity) -> (LimitKind, &Limit) {
        match quantity {
            SpectrumQuantity::Baseline(_) => (LimitKind::Multiplicative, &self.baseline),
            SpectrumQuantity::MoleFraction(_) => (LimitKind::Multiplicative, &self.molefraction),
            SpectrumQuantity::XShift => (LimitKind::Additive, &self.x_shift),
            SpectrumQuantity::EtalonAmplitude(_) => (LimitKind::Multiplicative, &self.etalon_amplitude),
            SpectrumQuantity::EtalonPeriod(_) => (LimitKind::Multiplicative, &self.etalon_period),
            SpectrumQuantity::EtalonPhase(_) => (LimitKind::Symmetric, &self.etalon_phase),
        }
    }

    fn named(&self) -> [(&'static str, Limit); 20] {
        [
            ("nu", self.nu),
            ("sw", self.sw),
            ("gamma0", self.gamma0),
            ("n_gamma0", self.n_gamma0),
            ("delta0", self.delta0),
            ("n_delta0", self.n_delta0),
            ("SD_gamma", self.sd_gamma),
            ("n_gamma2", self.n_gamma2),
            ("SD_delta", self.sd_delta),
            ("n_delta2", self.n_delta2),
            ("nuVC", self.nu_vc),
            ("n_nuVC", self.n_nu_vc),
            ("eta", self.eta),
            ("linemixing", self.linemixing),
            ("baseline", self.baseline),
            ("molefraction", self.molefraction),
            ("x_shift", self.x_shift),
            ("etalon_amplitude", self.etalon_amplitude),
            ("etalon_period", self.etalon_period),
            ("etalon_phase", self.etalon_phase),
        ]
    }

    /// Every factor must be finite and positive, enabled or not.
    pub fn validate(&self) -> Result<()> {
        for (name, limit) in self.named() {
            if !(limit.factor.is_finite() && limit.factor > 0.0) {
                return Err(SpecFitError::Configuration(format!(
                    "limit factor for '{}' must be finite and positive, got {}",
                    name, limit.factor
                )));
            }
        }
        Ok(())
    }
}

/// Everything that shapes the parameter vector of a fit.
///
/// The same configuration over the same registry and dataset always
/// produces the same vector topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub profile: ProfileKind,
    /// Apply first-order line mixing. Without it `y` entries are fixed.
    pub linemixing: bool,
    /// Transitions whose strongest resolved intensity over the dataset is
    /// below this are simulated but never varied.
    pub fit_intensity: f64,
    /// Divide residuals by per-point uncertainties where present.
    pub weight_spectra: bool,
    /// Wing cutoff in Voigt half widths. `None` evaluates every point.
    pub wing_cutoff: Option<f64>,
    pub constrain: ConstrainFlags,
    pub vary: VaryConfig,
    pub limits: LimitConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            profile: ProfileKind::Voigt,
            linemixing: false,
            fit_intensity: 1e-26,
            weight_spectra: false,
            wing_cutoff: None,
            constrain: ConstrainFlags::default(),
            vary: VaryConfig::default(),
            limits: LimitConfig::default(),
        }
    }
}

impl FitConfig {
    pub fn new(profile: ProfileKind) -> Self {
        Self {
            profile,
            ..Default::default()
        }
    }

    pub fn with_vary_line(mut self, quantity: LineQuantity, spec: VarySpec) -> Self {
        self.vary = self.vary.with_line(quantity, spec);
        self
    }

    /// Line-shape evaluator for this configuration. Its intensity threshold
    /// is replaced per spectrum.
    pub fn line_shape(&self) -> LineShapeModel {
        LineShapeModel::new(self.profile)
            .with_line_mixing(self.linemixing)
            .with_wing_cutoff(self.wing_cutoff)
    }

    /// Whether the configured profile uses `quantity` at all.
    pub fn uses(&self, quantity: LineQuantity) -> bool {
        match quantity {
            LineQuantity::SdGamma | LineQuantity::NGamma2 | LineQuantity::SdDelta | LineQuantity::NDelta2 => {
                self.profile.uses_speed_dependence()
            }
            LineQuantity::NuVc | LineQuantity::NNuVc | LineQuantity::Eta => self.profile.uses_narrowing(),
            LineQuantity::LineMixing => self.linemixing,
            _ => true,
        }
    }

    /// Structural checks that need no registry.
    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        if !(self.fit_intensity.is_finite() && self.fit_intensity >= 0.0) {
            return Err(SpecFitError::Configuration(format!(
                "fit_intensity must be finite and non-negative, got {}",
                self.fit_intensity
            )));
        }
        if let Some(cutoff) = self.wing_cutoff {
            if !(cutoff.is_finite() && cutoff > 0.0) {
                return Err(SpecFitError::Configuration(format!(
                    "wing_cutoff must be finite and positive, got {}",
                    cutoff
                )));
            }
        }
        for label in self.vary.lines.keys() {
            if LineQuantity::from_label(label).is_none() {
                return Err(SpecFitError::Configuration(format!(
                    "unknown line quantity '{}' in vary spec",
                    label
                )));
            }
        }
        Ok(())
    }

    /// Check every vary spec against the line list.
    pub fn validate_against(&self, registry: &TransitionRegistry) -> Result<()> {
        self.validate()?;
        for (label, spec) in &self.vary.lines {
            spec.validate(label, registry)?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        serde_json::to_writer_pretty(File::create(path)?, self)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

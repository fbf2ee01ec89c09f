//! Transition records, their per-diluent coefficients and resolution to a
//! given temperature.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::C2;
use crate::registry::isotopes::IsotopeInfo;

/// Key of a transition in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionId {
    pub molecule: u32,
    pub isotope: u32,
    pub index: usize,
}

impl TransitionId {
    pub fn new(molecule: u32, isotope: u32, index: usize) -> Self {
        Self {
            molecule,
            isotope,
            index,
        }
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.molecule, self.isotope, self.index)
    }
}

/// The fittable scalar quantities of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LineQuantity {
    Nu,
    Sw,
    Gamma0,
    NGamma0,
    Delta0,
    NDelta0,
    SdGamma,
    NGamma2,
    SdDelta,
    NDelta2,
    NuVc,
    NNuVc,
    Eta,
    LineMixing,
}

impl LineQuantity {
    /// Quantities stored once per diluent, in line-list column order.
    pub const PER_DILUENT: [LineQuantity; 12] = [
        LineQuantity::Gamma0,
        LineQuantity::NGamma0,
        LineQuantity::Delta0,
        LineQuantity::NDelta0,
        LineQuantity::SdGamma,
        LineQuantity::NGamma2,
        LineQuantity::SdDelta,
        LineQuantity::NDelta2,
        LineQuantity::NuVc,
        LineQuantity::NNuVc,
        LineQuantity::Eta,
        LineQuantity::LineMixing,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LineQuantity::Nu => "nu",
            LineQuantity::Sw => "sw",
            LineQuantity::Gamma0 => "gamma0",
            LineQuantity::NGamma0 => "n_gamma0",
            LineQuantity::Delta0 => "delta0",
            LineQuantity::NDelta0 => "n_delta0",
            LineQuantity::SdGamma => "SD_gamma",
            LineQuantity::NGamma2 => "n_gamma2",
            LineQuantity::SdDelta => "SD_delta",
            LineQuantity::NDelta2 => "n_delta2",
            LineQuantity::NuVc => "nuVC",
            LineQuantity::NNuVc => "n_nuVC",
            LineQuantity::Eta => "eta",
            LineQuantity::LineMixing => "y",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        std::iter::once(LineQuantity::Nu)
            .chain(std::iter::once(LineQuantity::Sw))
            .chain(Self::PER_DILUENT)
            .find(|q| q.label() == label)
    }

    pub fn is_per_diluent(self) -> bool {
        !matches!(self, LineQuantity::Nu | LineQuantity::Sw)
    }

    /// Temperature exponents are always shared across spectra.
    pub fn is_temperature_exponent(self) -> bool {
        matches!(
            self,
            LineQuantity::NGamma0
                | LineQuantity::NDelta0
                | LineQuantity::NGamma2
                | LineQuantity::NDelta2
                | LineQuantity::NNuVc
        )
    }
}

impl fmt::Display for LineQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Line-list column name of a quantity, `{label}` or `{label}_{diluent}`.
pub fn column_name(quantity: LineQuantity, diluent: Option<&str>) -> String {
    match diluent {
        Some(d) => format!("{}_{}", quantity.label(), d),
        None => quantity.label().to_string(),
    }
}

/// Broadening, shift, narrowing and mixing coefficients for one diluent,
/// tabulated at the reference temperature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiluentCoefficients {
    pub gamma0: f64,
    pub n_gamma0: f64,
    pub delta0: f64,
    pub n_delta0: f64,
    pub sd_gamma: f64,
    pub n_gamma2: f64,
    pub sd_delta: f64,
    pub n_delta2: f64,
    pub nu_vc: f64,
    pub n_nu_vc: f64,
    pub eta: f64,
    pub y: f64,
}

impl DiluentCoefficients {
    pub fn get(&self, quantity: LineQuantity) -> Option<f64> {
        let v = match quantity {
            LineQuantity::Gamma0 => self.gamma0,
            LineQuantity::NGamma0 => self.n_gamma0,
            LineQuantity::Delta0 => self.delta0,
            LineQuantity::NDelta0 => self.n_delta0,
            LineQuantity::SdGamma => self.sd_gamma,
            LineQuantity::NGamma2 => self.n_gamma2,
            LineQuantity::SdDelta => self.sd_delta,
            LineQuantity::NDelta2 => self.n_delta2,
            LineQuantity::NuVc => self.nu_vc,
            LineQuantity::NNuVc => self.n_nu_vc,
            LineQuantity::Eta => self.eta,
            LineQuantity::LineMixing => self.y,
            LineQuantity::Nu | LineQuantity::Sw => return None,
        };
        Some(v)
    }

    /// Returns `false` for quantities that are not per-diluent.
    pub fn set(&mut self, quantity: LineQuantity, value: f64) -> bool {
        let slot = match quantity {
            LineQuantity::Gamma0 => &mut self.gamma0,
            LineQuantity::NGamma0 => &mut self.n_gamma0,
            LineQuantity::Delta0 => &mut self.delta0,
            LineQuantity::NDelta0 => &mut self.n_delta0,
            LineQuantity::SdGamma => &mut self.sd_gamma,
            LineQuantity::NGamma2 => &mut self.n_gamma2,
            LineQuantity::SdDelta => &mut self.sd_delta,
            LineQuantity::NDelta2 => &mut self.n_delta2,
            LineQuantity::NuVc => &mut self.nu_vc,
            LineQuantity::NNuVc => &mut self.n_nu_vc,
            LineQuantity::Eta => &mut self.eta,
            LineQuantity::LineMixing => &mut self.y,
            LineQuantity::Nu | LineQuantity::Sw => return false,
        };
        *slot = value;
        true
    }

    /// Scale to `temperature` and fold the speed-dependent ratios into
    /// absolute per-atmosphere widths.
    fn resolve(&self, temperature: f64, reference_temperature: f64) -> ResolvedDiluent {
        let ratio = reference_temperature / temperature;
        let gamma0 = self.gamma0 * ratio.powf(self.n_gamma0);
        let delta0 = self.delta0 * ratio.powf(self.n_delta0);
        ResolvedDiluent {
            gamma0,
            delta0,
            gamma2: self.sd_gamma * self.gamma0 * ratio.powf(self.n_gamma2),
            delta2: self.sd_delta * self.delta0 * ratio.powf(self.n_delta2),
            nu_vc: self.nu_vc * ratio.powf(self.n_nu_vc),
            eta: self.eta,
            y: self.y,
        }
    }
}

/// Per-atmosphere coefficients of one diluent at the spectrum temperature.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResolvedDiluent {
    pub gamma0: f64,
    pub delta0: f64,
    pub gamma2: f64,
    pub delta2: f64,
    pub nu_vc: f64,
    pub eta: f64,
    pub y: f64,
}

/// Reference-temperature parameters of a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineParameters {
    pub nu: f64,
    pub sw: f64,
    #[serde(default)]
    pub elower: Option<f64>,
    pub diluents: BTreeMap<String, DiluentCoefficients>,
}

impl LineParameters {
    pub fn new(nu: f64, sw: f64) -> Self {
        Self {
            nu,
            sw,
            elower: None,
            diluents: BTreeMap::new(),
        }
    }

    pub fn with_diluent(mut self, name: &str, coefficients: DiluentCoefficients) -> Self {
        self.diluents.insert(name.to_string(), coefficients);
        self
    }

    pub fn with_elower(mut self, elower: f64) -> Self {
        self.elower = Some(elower);
        self
    }

    /// The diluent whose coefficients stand in for `name`: `name` itself, or
    /// `air` when the transition has no coefficients for `name`.
    pub fn effective_diluent<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.diluents.contains_key(name) {
            Some(name)
        } else if self.diluents.contains_key("air") {
            Some("air")
        } else {
            None
        }
    }

    pub fn get(&self, quantity: LineQuantity, diluent: Option<&str>) -> Option<f64> {
        match (quantity, diluent) {
            (LineQuantity::Nu, _) => Some(self.nu),
            (LineQuantity::Sw, _) => Some(self.sw),
            (q, Some(d)) => self.diluents.get(d).and_then(|c| c.get(q)),
            (_, None) => None,
        }
    }

    /// Returns `false` when the quantity/diluent pair does not exist.
    pub fn set(&mut self, quantity: LineQuantity, diluent: Option<&str>, value: f64) -> bool {
        match (quantity, diluent) {
            (LineQuantity::Nu, _) => {
                self.nu = value;
                true
            }
            (LineQuantity::Sw, _) => {
                self.sw = value;
                true
            }
            (q, Some(d)) => self.diluents.get_mut(d).map_or(false, |c| c.set(q, value)),
            (_, None) => false,
        }
    }

    /// Line intensity at `temperature`. Without a lower-state energy the
    /// tabulated value is returned unchanged.
    pub fn intensity_at(&self, temperature: f64, reference_temperature: f64, q_exponent: f64) -> f64 {
        let Some(elower) = self.elower else {
            return self.sw;
        };
        if temperature == reference_temperature {
            return self.sw;
        }
        let partition = (reference_temperature / temperature).powf(q_exponent);
        let boltzmann = (-C2 * elower / temperature).exp() / (-C2 * elower / reference_temperature).exp();
        let stimulated =
            (1.0 - (-C2 * self.nu / temperature).exp()) / (1.0 - (-C2 * self.nu / reference_temperature).exp());
        self.sw * partition * boltzmann * stimulated
    }

    /// Resolve to the physical parameters used by the line-shape model.
    pub fn resolve(
        &self,
        id: TransitionId,
        temperature: f64,
        reference_temperature: f64,
        isotope: &IsotopeInfo,
        natural_abundance: bool,
        abundance_weighted: bool,
    ) -> ResolvedTransition {
        let mut intensity = self.intensity_at(temperature, reference_temperature, isotope.q_exponent);
        match (natural_abundance, abundance_weighted) {
            (true, false) => intensity *= isotope.abundance,
            (false, true) if isotope.abundance > 0.0 => intensity /= isotope.abundance,
            _ => {}
        }

        ResolvedTransition {
            id,
            nu: self.nu,
            intensity,
            mass: isotope.mass,
            diluents: self
                .diluents
                .iter()
                .map(|(name, c)| (name.clone(), c.resolve(temperature, reference_temperature)))
                .collect(),
        }
    }
}

/// A transition with intensity and widths evaluated at one temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTransition {
    pub id: TransitionId,
    pub nu: f64,
    pub intensity: f64,
    pub mass: f64,
    pub diluents: BTreeMap<String, ResolvedDiluent>,
}

impl ResolvedTransition {
    /// Coefficients for `name`, falling back to `air`.
    pub fn diluent(&self, name: &str) -> Option<&ResolvedDiluent> {
        self.diluents.get(name).or_else(|| self.diluents.get("air"))
    }
}

/// Key of an override value: quantity plus diluent (if per-diluent).
pub type QuantityKey = (LineQuantity, Option<String>);

/// A line-list entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub id: TransitionId,
    pub params: LineParameters,
    /// Whether `sw` already includes the natural isotope abundance.
    pub abundance_weighted: bool,
    /// Values fitted independently per spectrum, keyed by spectrum number.
    pub overrides: BTreeMap<u32, BTreeMap<QuantityKey, f64>>,
    /// Standard errors keyed by output column name.
    pub uncertainties: BTreeMap<String, f64>,
}

impl Transition {
    pub fn new(id: TransitionId, params: LineParameters) -> Self {
        Self {
            id,
            params,
            abundance_weighted: true,
            overrides: BTreeMap::new(),
            uncertainties: BTreeMap::new(),
        }
    }

    /// Parameters as seen by one spectrum, with its overrides applied.
    pub fn params_for(&self, spectrum: Option<u32>) -> LineParameters {
        let mut params = self.params.clone();
        if let Some(overrides) = spectrum.and_then(|n| self.overrides.get(&n)) {
            for ((quantity, diluent), value) in overrides {
                params.set(*quantity, diluent.as_deref(), *value);
            }
        }
        params
    }

    /// Value of a quantity as seen by one spectrum.
    pub fn value_for(&self, quantity: LineQuantity, diluent: Option<&str>, spectrum: Option<u32>) -> Option<f64> {
        let key = (quantity, diluent.map(str::to_string));
        spectrum
            .and_then(|n| self.overrides.get(&n))
            .and_then(|o| o.get(&key).copied())
            .or_else(|| self.params.get(quantity, diluent))
    }

    pub fn set_override(&mut self, spectrum: u32, quantity: LineQuantity, diluent: Option<&str>, value: f64) {
        self.overrides
            .entry(spectrum)
            .or_default()
            .insert((quantity, diluent.map(str::to_string)), value);
    }
}

//! Forward simulation of single-transition absorption profiles.
//!
//! Voigt (VP), speed-dependent Voigt (SDVP) and Hartmann-Tran (HTP) are all
//! evaluated by the same pCqSDHC kernel. The reduced profiles zero the terms
//! they do not use, so HTP collapses exactly onto SDVP, and SDVP onto VP.

pub mod faddeeva;
pub mod htp;

pub use faddeeva::faddeeva;
pub use htp::{pcqsdhc, HtpWidths};

use log::warn;
use ndarray::{s, Array1, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{AMU, BOLTZMANN, MIN_DOPPLER_HWHM, SPEED_OF_LIGHT};
use crate::error::{Result, SpecFitError};
use crate::registry::ResolvedTransition;
use crate::spectrum::DiluentMix;

/// Line profile family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileKind {
    #[serde(rename = "VP")]
    Voigt,
    #[serde(rename = "SDVP")]
    SpeedDependentVoigt,
    #[serde(rename = "HTP")]
    HartmannTran,
}

impl ProfileKind {
    pub fn uses_speed_dependence(self) -> bool {
        !matches!(self, ProfileKind::Voigt)
    }

    pub fn uses_narrowing(self) -> bool {
        matches!(self, ProfileKind::HartmannTran)
    }

    pub fn short_name(self) -> &'static str {
        match self {
            ProfileKind::Voigt => "VP",
            ProfileKind::SpeedDependentVoigt => "SDVP",
            ProfileKind::HartmannTran => "HTP",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for ProfileKind {
    type Err = SpecFitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VP" | "VOIGT" => Ok(ProfileKind::Voigt),
            "SDVP" => Ok(ProfileKind::SpeedDependentVoigt),
            "HTP" => Ok(ProfileKind::HartmannTran),
            other => Err(SpecFitError::Configuration(format!("unknown profile '{}'", other))),
        }
    }
}

/// Doppler HWHM (cm⁻¹) of a line at `nu` (cm⁻¹) for a molecule of `mass`
/// (amu) at `temperature` (K). Non-positive or non-finite results are
/// replaced by [`MIN_DOPPLER_HWHM`].
pub fn doppler_hwhm(nu: f64, temperature: f64, mass: f64) -> f64 {
    let width = nu / SPEED_OF_LIGHT * (2.0 * BOLTZMANN * temperature * std::f64::consts::LN_2 / (mass * AMU)).sqrt();
    if width.is_finite() && width > 0.0 {
        width
    } else {
        warn!(
            "Doppler width {} at nu={} T={} replaced by {}",
            width, nu, temperature, MIN_DOPPLER_HWHM
        );
        MIN_DOPPLER_HWHM
    }
}

/// Line widths of one transition at the spectrum conditions, plus its
/// line-mixing coefficient.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineWidths {
    pub htp: HtpWidths,
    pub y: f64,
}

impl LineWidths {
    /// Voigt HWHM (Olivero-Longbothum).
    pub fn voigt_hwhm(&self) -> f64 {
        let fl = self.htp.gamma0.abs();
        let fg = self.htp.doppler;
        0.5346 * fl + (0.2166 * fl * fl + fg * fg).sqrt()
    }
}

/// Evaluates absorption cross-sections (cm²/molecule) for one profile.
#[derive(Debug, Clone, PartialEq)]
pub struct LineShapeModel {
    pub profile: ProfileKind,
    /// Apply the first-order line-mixing term.
    pub line_mixing: bool,
    /// Transitions with a resolved intensity below this contribute nothing.
    pub intensity_threshold: f64,
    /// Points farther than this many Voigt half widths from the shifted line
    /// center are skipped. `None` evaluates the whole grid.
    pub wing_cutoff: Option<f64>,
}

impl LineShapeModel {
    pub fn new(profile: ProfileKind) -> Self {
        Self {
            profile,
            line_mixing: true,
            intensity_threshold: 1e-30,
            wing_cutoff: None,
        }
    }

    pub fn with_line_mixing(mut self, enabled: bool) -> Self {
        self.line_mixing = enabled;
        self
    }

    pub fn with_intensity_threshold(mut self, threshold: f64) -> Self {
        self.intensity_threshold = threshold;
        self
    }

    pub fn with_wing_cutoff(mut self, cutoff: Option<f64>) -> Self {
        self.wing_cutoff = cutoff;
        self
    }

    /// Pressure-scaled widths summed over the diluent mix, gated by the
    /// profile kind.
    pub fn widths(
        &self,
        transition: &ResolvedTransition,
        temperature: f64,
        pressure: f64,
        mix: &DiluentMix,
    ) -> Result<LineWidths> {
        let mut htp = HtpWidths {
            doppler: doppler_hwhm(transition.nu, temperature, transition.mass),
            ..Default::default()
        };
        let mut y = 0.0;

        for (name, fraction) in mix.iter() {
            let d = transition.diluent(name).ok_or_else(|| {
                SpecFitError::MissingData(format!(
                    "transition {} has no coefficients for diluent '{}' or air",
                    transition.id, name
                ))
            })?;
            htp.gamma0 += fraction * d.gamma0;
            htp.delta0 += fraction * d.delta0;
            htp.gamma2 += fraction * d.gamma2;
            htp.delta2 += fraction * d.delta2;
            htp.nu_vc += fraction * d.nu_vc;
            htp.eta += fraction * d.eta;
            y += fraction * d.y;
        }

        htp.gamma0 *= pressure;
        htp.delta0 *= pressure;
        htp.gamma2 *= pressure;
        htp.delta2 *= pressure;
        htp.nu_vc *= pressure;
        y *= pressure;

        if !self.profile.uses_speed_dependence() {
            htp.gamma2 = 0.0;
            htp.delta2 = 0.0;
        }
        if !self.profile.uses_narrowing() {
            htp.nu_vc = 0.0;
            htp.eta = 0.0;
        }
        if !self.line_mixing {
            y = 0.0;
        }

        Ok(LineWidths { htp, y })
    }

    /// Add `scale` times the cross-section of `transition` to `out`.
    #[allow(clippy::too_many_arguments)]
    pub fn accumulate(
        &self,
        grid: &Array1<f64>,
        transition: &ResolvedTransition,
        temperature: f64,
        pressure: f64,
        mix: &DiluentMix,
        scale: f64,
        out: &mut Array1<f64>,
    ) -> Result<()> {
        if grid.len() != out.len() {
            return Err(SpecFitError::DimensionMismatch(format!(
                "grid has {} points, output has {}",
                grid.len(),
                out.len()
            )));
        }
        if transition.intensity < self.intensity_threshold {
            return Ok(());
        }

        let widths = self.widths(transition, temperature, pressure, mix)?;
        let center = transition.nu + widths.htp.delta0;
        let reach = self.wing_cutoff.map(|c| c * widths.voigt_hwhm());
        let factor = scale * transition.intensity;

        let within = |nu: f64| reach.map_or(true, |r| (nu - center).abs() <= r);
        let mut inside = grid
            .iter()
            .enumerate()
            .filter(|&(_, &nu)| within(nu))
            .map(|(i, _)| i);
        let Some(first) = inside.next() else {
            return Ok(());
        };
        let last = inside.last().unwrap_or(first);

        // contiguous on monotonic grids; the check inside covers any other order
        let window = s![first..=last];
        Zip::from(out.slice_mut(window))
            .and(grid.slice(window))
            .for_each(|o, &nu| {
                if within(nu) {
                    let profile = pcqsdhc(transition.nu, &widths.htp, nu);
                    *o += factor * (profile.re + widths.y * profile.im);
                }
            });
        Ok(())
    }

    /// Absorption cross-section (cm²/molecule) of one transition on `grid`.
    pub fn simulate(
        &self,
        grid: &Array1<f64>,
        transition: &ResolvedTransition,
        temperature: f64,
        pressure: f64,
        mix: &DiluentMix,
    ) -> Result<Array1<f64>> {
        let mut out = Array1::zeros(grid.len());
        self.accumulate(grid, transition, temperature, pressure, mix, 1.0, &mut out)?;
        Ok(out)
    }
}

/// Cross-section of one transition with the given profile, line mixing on
/// and the default intensity threshold.
pub fn simulate(
    grid: &Array1<f64>,
    transition: &ResolvedTransition,
    temperature: f64,
    pressure: f64,
    mix: &DiluentMix,
    profile: ProfileKind,
) -> Result<Array1<f64>> {
    LineShapeModel::new(profile).simulate(grid, transition, temperature, pressure, mix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ResolvedDiluent, TransitionId};
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn transition(intensity: f64, air: ResolvedDiluent) -> ResolvedTransition {
        let mut diluents = BTreeMap::new();
        diluents.insert("air".to_string(), air);
        ResolvedTransition {
            id: TransitionId::new(2, 1, 0),
            nu: 6000.0,
            intensity,
            mass: 43.98983,
            diluents,
        }
    }

    fn grid() -> Array1<f64> {
        Array1::linspace(5999.9, 6000.1, 201)
    }

    fn full_air() -> ResolvedDiluent {
        ResolvedDiluent {
            gamma0: 0.07,
            delta0: -0.006,
            gamma2: 0.007,
            delta2: 0.0006,
            nu_vc: 0.01,
            eta: 0.2,
            y: 0.01,
        }
    }

    #[test]
    fn test_doppler_width_co2() {
        // CO2 near 6000 cm⁻¹ at 296 K has a Doppler HWHM of about 0.0056 cm⁻¹
        let width = doppler_hwhm(6000.0, 296.0, 43.98983);
        assert_relative_eq!(width, 5.5737e-3, max_relative = 1e-4);
        assert_eq!(doppler_hwhm(6000.0, 0.0, 43.98983), MIN_DOPPLER_HWHM);
    }

    #[test]
    fn test_below_threshold_is_exact_zero() {
        let mix = DiluentMix::air();
        let model = LineShapeModel::new(ProfileKind::Voigt).with_intensity_threshold(1e-25);
        let out = model
            .simulate(&grid(), &transition(1e-26, full_air()), 296.0, 1.0, &mix)
            .unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_htp_collapses_to_vp_without_extra_terms() {
        let mix = DiluentMix::air();
        let vp_only = ResolvedDiluent {
            gamma0: 0.07,
            delta0: -0.006,
            ..Default::default()
        };
        let t = transition(1e-23, vp_only);
        let vp = simulate(&grid(), &t, 296.0, 0.5, &mix, ProfileKind::Voigt).unwrap();
        let htp = simulate(&grid(), &t, 296.0, 0.5, &mix, ProfileKind::HartmannTran).unwrap();
        for (a, b) in vp.iter().zip(htp.iter()) {
            assert_eq!(a, b);
        }

        // VP ignores the speed-dependent and narrowing terms altogether
        let full = transition(1e-23, ResolvedDiluent { y: 0.0, ..full_air() });
        let vp_full = simulate(&grid(), &full, 296.0, 0.5, &mix, ProfileKind::Voigt).unwrap();
        for (a, b) in vp.iter().zip(vp_full.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_profile_gating() {
        let model = LineShapeModel::new(ProfileKind::SpeedDependentVoigt).with_line_mixing(false);
        let widths = model
            .widths(&transition(1e-23, full_air()), 296.0, 2.0, &DiluentMix::air())
            .unwrap();
        assert_relative_eq!(widths.htp.gamma0, 0.14);
        assert_relative_eq!(widths.htp.gamma2, 0.014);
        assert_eq!(widths.htp.nu_vc, 0.0);
        assert_eq!(widths.htp.eta, 0.0);
        assert_eq!(widths.y, 0.0);
    }

    #[test]
    fn test_zero_pressure_is_gaussian() {
        let t = transition(1e-23, full_air());
        let out = simulate(&grid(), &t, 296.0, 0.0, &DiluentMix::air(), ProfileKind::HartmannTran).unwrap();
        let gd = doppler_hwhm(6000.0, 296.0, t.mass);
        let peak = 1e-23 * (std::f64::consts::LN_2 / std::f64::consts::PI).sqrt() / gd;
        assert_relative_eq!(out[100], peak, max_relative = 1e-5);
    }

    #[test]
    fn test_line_mixing_adds_dispersive_part() {
        let mix = DiluentMix::air();
        let with = transition(1e-23, full_air());
        let without = transition(1e-23, ResolvedDiluent { y: 0.0, ..full_air() });
        let a = simulate(&grid(), &with, 296.0, 1.0, &mix, ProfileKind::Voigt).unwrap();
        let b = simulate(&grid(), &without, 296.0, 1.0, &mix, ProfileKind::Voigt).unwrap();
        let diff: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum();
        assert!(diff > 0.0);
        // the dispersive part integrates to roughly zero around the line
        let net: f64 = a.iter().zip(b.iter()).map(|(x, y)| x - y).sum();
        assert!(net.abs() < 0.2 * diff);
    }

    #[test]
    fn test_wing_cutoff_zeroes_far_points() {
        let mix = DiluentMix::air();
        let t = transition(1e-23, full_air());
        let model = LineShapeModel::new(ProfileKind::Voigt).with_wing_cutoff(Some(1.0));
        let out = model.simulate(&grid(), &t, 296.0, 0.1, &mix).unwrap();
        let widths = model.widths(&t, 296.0, 0.1, &mix).unwrap();
        let center = 6000.0 + widths.htp.delta0;
        for (&nu, &v) in grid().iter().zip(out.iter()) {
            if (nu - center).abs() > widths.voigt_hwhm() {
                assert_eq!(v, 0.0);
            } else {
                assert!(v > 0.0);
            }
        }
    }

    #[test]
    fn test_accumulate_adds_on_any_grid_order() {
        let mix = DiluentMix::air();
        let t = transition(1e-23, full_air());
        let model = LineShapeModel::new(ProfileKind::Voigt).with_wing_cutoff(Some(2.0));
        let ascending = model.simulate(&grid(), &t, 296.0, 0.1, &mix).unwrap();

        let descending_grid: Array1<f64> = grid().iter().rev().copied().collect();
        let mut out: Array1<f64> = ascending.iter().rev().copied().collect();
        model
            .accumulate(&descending_grid, &t, 296.0, 0.1, &mix, 2.0, &mut out)
            .unwrap();
        for (&a, &d) in ascending.iter().rev().zip(out.iter()) {
            assert_relative_eq!(d, 3.0 * a, max_relative = 1e-14);
        }
        assert!(out.iter().any(|&v| v == 0.0));

        // a cutoff window that misses the grid leaves the output alone
        let far = Array1::linspace(6010.0, 6011.0, 11);
        let mut out = Array1::zeros(11);
        model.accumulate(&far, &t, 296.0, 0.1, &mix, 1.0, &mut out).unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_profile_kind_parsing() {
        assert_eq!("htp".parse::<ProfileKind>().unwrap(), ProfileKind::HartmannTran);
        assert_eq!("VP".parse::<ProfileKind>().unwrap(), ProfileKind::Voigt);
        assert!("Rautian".parse::<ProfileKind>().is_err());
        assert_eq!(
            serde_json::to_string(&ProfileKind::SpeedDependentVoigt).unwrap(),
            "\"SDVP\""
        );
    }
}

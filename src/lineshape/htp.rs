//! Partially-correlated quadratic speed-dependent hard-collision profile
//! (pCqSDHC), the complex form of the Hartmann-Tran profile.
//!
//! Follows the evaluation scheme of Tran, Ngo and Hartmann, JQSRT 129
//! (2013) 199, including its four numerical regimes. The returned value is
//! normalized so that its real part integrates to one over wavenumber.

use num_complex::Complex64;
use std::f64::consts::{LN_2, PI};

use crate::lineshape::faddeeva::faddeeva;

/// Widths of one line at the spectrum conditions (cm⁻¹).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HtpWidths {
    /// Doppler half width at half maximum.
    pub doppler: f64,
    pub gamma0: f64,
    pub delta0: f64,
    pub gamma2: f64,
    pub delta2: f64,
    pub nu_vc: f64,
    pub eta: f64,
}

/// `w(iz)`, the form in which the profile uses the probability function.
#[inline]
fn w_of_iz(z: Complex64) -> Complex64 {
    faddeeva(Complex64::new(-z.im, z.re))
}

/// Complex pCqSDHC profile of a line centered at `nu0`, evaluated at `nu`.
pub fn pcqsdhc(nu0: f64, widths: &HtpWidths, nu: f64) -> Complex64 {
    let HtpWidths {
        doppler,
        gamma0,
        delta0,
        gamma2,
        delta2,
        nu_vc,
        eta,
    } = *widths;

    let i = Complex64::i();
    let rpi = PI.sqrt();
    let cte = LN_2.sqrt() / doppler;
    let c0 = Complex64::new(gamma0, delta0);
    let c2 = Complex64::new(gamma2, delta2);
    let c0t = (1.0 - eta) * (c0 - 1.5 * c2) + nu_vc;
    let c2t = (1.0 - eta) * c2;
    let detuning = i * (nu0 - nu);

    let (a_term, b_term) = if c2t.norm() == 0.0 {
        // no speed dependence
        let z1 = (detuning + c0t) * cte;
        let w1 = w_of_iz(z1);
        let a = rpi * cte * w1;
        let b = if z1.norm() <= 4e3 {
            rpi * cte * ((1.0 - z1 * z1) * w1 + z1 / rpi)
        } else {
            cte * (rpi * w1 + 0.5 / z1 - 0.75 / (z1 * z1 * z1))
        };
        (a, b)
    } else {
        let x = (detuning + c0t) / c2t;
        let y = 1.0 / ((2.0 * cte * c2t) * (2.0 * cte * c2t));
        let csqrt_y = (gamma2 - i * delta2) / (2.0 * cte * (1.0 - eta) * (gamma2 * gamma2 + delta2 * delta2));

        if x.norm() <= 3e-8 * y.norm() {
            let z1 = (detuning + c0t) * cte;
            let z2 = (x + y).sqrt() + csqrt_y;
            let w1 = w_of_iz(z1);
            let w2 = w_of_iz(z2);
            let a = rpi * cte * (w1 - w2);
            let b = (-1.0 + rpi / (2.0 * csqrt_y) * (1.0 - z1 * z1) * w1
                - rpi / (2.0 * csqrt_y) * (1.0 - z2 * z2) * w2)
                / c2t;
            (a, b)
        } else if y.norm() <= 1e-15 * x.norm() {
            let z1 = (x + y).sqrt();
            let w1 = w_of_iz(z1);
            let sqrt_x = x.sqrt();
            if sqrt_x.norm() <= 4e3 {
                let wb = w_of_iz(sqrt_x);
                let core = 1.0 / rpi - sqrt_x * wb;
                let a = (2.0 * rpi / c2t) * core;
                let b = (1.0 / c2t) * (-1.0 + 2.0 * rpi * (1.0 - x - 2.0 * y) * core + 2.0 * rpi * z1 * w1);
                (a, b)
            } else {
                let asymptote = 1.0 / x - 1.5 / (x * x);
                let a = (1.0 / c2t) * asymptote;
                let b = (1.0 / c2t) * (-1.0 + (1.0 - x - 2.0 * y) * asymptote + 2.0 * rpi * z1 * w1);
                (a, b)
            }
        } else {
            let z1 = (x + y).sqrt() - csqrt_y;
            let z2 = z1 + 2.0 * csqrt_y;
            let w1 = w_of_iz(z1);
            let w2 = w_of_iz(z2);
            let a = rpi * cte * (w1 - w2);
            let b = (-1.0 + rpi / (2.0 * csqrt_y) * (1.0 - z1 * z1) * w1
                - rpi / (2.0 * csqrt_y) * (1.0 - z2 * z2) * w2)
                / c2t;
            (a, b)
        }
    };

    (1.0 / PI) * (a_term / (1.0 - (nu_vc - eta * (c0 - 1.5 * c2)) * a_term + eta * c2 * b_term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn integrate(widths: &HtpWidths, half_range: f64, step: f64) -> f64 {
        let n = (half_range / step) as i64;
        (-n..=n).map(|k| pcqsdhc(0.0, widths, k as f64 * step).re * step).sum()
    }

    #[test]
    fn test_gaussian_limit() {
        let widths = HtpWidths {
            doppler: 0.01,
            ..Default::default()
        };
        let peak = (LN_2 / PI).sqrt() / 0.01;
        assert_relative_eq!(pcqsdhc(0.0, &widths, 0.0).re, peak, max_relative = 1e-5);

        let off = pcqsdhc(0.0, &widths, 0.01).re;
        assert_relative_eq!(off, peak * 0.5, max_relative = 1e-5);
    }

    #[test]
    fn test_lorentzian_limit() {
        let widths = HtpWidths {
            doppler: 1e-12,
            gamma0: 0.05,
            ..Default::default()
        };
        let expected = 0.05 / PI / (0.05 * 0.05 + 0.02 * 0.02);
        assert_relative_eq!(pcqsdhc(0.0, &widths, 0.02).re, expected, max_relative = 1e-5);
    }

    #[test]
    fn test_normalization() {
        let cases = [
            HtpWidths {
                doppler: 0.01,
                gamma0: 0.005,
                delta0: -0.001,
                ..Default::default()
            },
            HtpWidths {
                doppler: 0.01,
                gamma0: 0.005,
                delta0: -0.001,
                gamma2: 0.0005,
                delta2: 0.0001,
                nu_vc: 0.002,
                eta: 0.1,
            },
        ];
        for widths in cases {
            // tails beyond ±20 cm⁻¹ hold about 2Γ/(20π) of the area
            let area = integrate(&widths, 20.0, 2e-4);
            assert!((area - 1.0).abs() < 2e-4, "area {area} for {widths:?}");
        }
    }

    #[test]
    fn test_speed_dependence_narrows_peak() {
        let vp = HtpWidths {
            doppler: 0.01,
            gamma0: 0.02,
            ..Default::default()
        };
        let sdvp = HtpWidths {
            gamma2: 0.004,
            ..vp
        };
        assert!(pcqsdhc(0.0, &sdvp, 0.0).re > pcqsdhc(0.0, &vp, 0.0).re);
    }

    #[test]
    fn test_continuity_in_eta() {
        let base = HtpWidths {
            doppler: 0.01,
            gamma0: 0.05,
            delta0: -0.001,
            gamma2: 0.005,
            delta2: 0.0002,
            ..Default::default()
        };
        let tiny = HtpWidths { eta: 1e-9, ..base };
        let a = pcqsdhc(0.0, &base, 0.01);
        let b = pcqsdhc(0.0, &tiny, 0.01);
        assert!((a - b).norm() < 1e-6 * a.norm());
    }
}

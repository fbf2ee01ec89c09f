//! Profiles evaluated on resolved CO2 transitions.

use crate::test_helpers::co2_registry;
use approx::assert_relative_eq;
use ndarray::Array1;
use specfit_rs::lineshape::{doppler_hwhm, LineShapeModel, ProfileKind};
use specfit_rs::spectrum::DiluentMix;

fn area(grid: &Array1<f64>, sigma: &Array1<f64>) -> f64 {
    let dx = grid[1] - grid[0];
    dx * (sigma.sum() - 0.5 * (sigma[0] + sigma[sigma.len() - 1]))
}

#[test]
fn test_profiles_conserve_line_area() {
    let registry = co2_registry();
    let line = registry.resolve(2, 1, 0, 296.0).unwrap();
    let grid = Array1::linspace(5960.0, 6040.0, 40_001);

    for profile in [ProfileKind::Voigt, ProfileKind::SpeedDependentVoigt, ProfileKind::HartmannTran] {
        let sigma = LineShapeModel::new(profile)
            .simulate(&grid, &line, 296.0, 1.0, &DiluentMix::air())
            .unwrap();
        // the Lorentzian wings beyond ±40 cm⁻¹ hold about 0.1 % of the area
        assert_relative_eq!(area(&grid, &sigma), line.intensity, max_relative = 3e-3);
    }
}

#[test]
fn test_speed_dependence_raises_the_peak() {
    let registry = co2_registry();
    let line = registry.resolve(2, 1, 0, 296.0).unwrap();
    let grid = Array1::linspace(5999.0, 6001.0, 2001);
    let mix = DiluentMix::air();

    let vp = LineShapeModel::new(ProfileKind::Voigt)
        .simulate(&grid, &line, 296.0, 1.0, &mix)
        .unwrap();
    let sdvp = LineShapeModel::new(ProfileKind::SpeedDependentVoigt)
        .simulate(&grid, &line, 296.0, 1.0, &mix)
        .unwrap();
    let peak = |a: &Array1<f64>| a.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    assert!(peak(&sdvp) > peak(&vp));
}

#[test]
fn test_hartmann_tran_without_extra_terms_matches_voigt() {
    let mut registry = co2_registry();
    registry
        .get_mut(crate::test_helpers::strong())
        .unwrap()
        .params
        .diluents
        .get_mut("air")
        .unwrap()
        .sd_gamma = 0.0;
    let line = registry.resolve(2, 1, 0, 296.0).unwrap();
    let grid = Array1::linspace(5999.5, 6000.5, 501);
    let mix = DiluentMix::air();

    let vp = LineShapeModel::new(ProfileKind::Voigt)
        .simulate(&grid, &line, 296.0, 0.5, &mix)
        .unwrap();
    let htp = LineShapeModel::new(ProfileKind::HartmannTran)
        .simulate(&grid, &line, 296.0, 0.5, &mix)
        .unwrap();
    for (a, b) in vp.iter().zip(htp.iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-9);
    }
}

#[test]
fn test_zero_pressure_peak_is_doppler() {
    let registry = co2_registry();
    let line = registry.resolve(2, 1, 0, 296.0).unwrap();
    let grid = Array1::linspace(5999.9, 6000.1, 201);
    let sigma = LineShapeModel::new(ProfileKind::Voigt)
        .simulate(&grid, &line, 296.0, 0.0, &DiluentMix::air())
        .unwrap();

    let hwhm = doppler_hwhm(line.nu, 296.0, line.mass);
    let expected = line.intensity * (std::f64::consts::LN_2 / std::f64::consts::PI).sqrt() / hwhm;
    assert_relative_eq!(sigma[100], expected, max_relative = 1e-5);
}

#[test]
fn test_lines_below_threshold_contribute_nothing() {
    let registry = co2_registry();
    let line = registry.resolve(2, 1, 1, 296.0).unwrap();
    let grid = Array1::linspace(6000.0, 6000.7, 71);
    let sigma = LineShapeModel::new(ProfileKind::HartmannTran)
        .with_intensity_threshold(1e-20)
        .simulate(&grid, &line, 296.0, 1.0, &DiluentMix::air())
        .unwrap();
    assert!(sigma.iter().all(|&v| v == 0.0));
}

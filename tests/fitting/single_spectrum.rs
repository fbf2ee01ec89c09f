//! One noisy spectrum, Voigt and speed-dependent Voigt fits.

use crate::test_helpers::{co2_registry, scale, stored, strong, synthetic, template};
use approx::{assert_abs_diff_eq, assert_relative_eq};
use specfit_rs::fit::{update_params, FitConfig, FitOrchestrator, VarySpec};
use specfit_rs::lineshape::ProfileKind;
use specfit_rs::lm::LmConfig;
use specfit_rs::registry::LineQuantity;
use specfit_rs::simulate::NoiseSpec;
use specfit_rs::Dataset;

const PRESSURE: f64 = 0.3;

fn vary_all(config: FitConfig, quantities: &[LineQuantity]) -> FitConfig {
    quantities
        .iter()
        .fold(config, |c, &q| c.with_vary_line(q, VarySpec::isotopes(&[(2, 1)])))
}

#[test]
fn test_voigt_fit_recovers_the_strong_line() {
    let truth = co2_registry();
    let config = vary_all(
        FitConfig::new(ProfileKind::Voigt),
        &[LineQuantity::Nu, LineQuantity::Sw, LineQuantity::Gamma0],
    );
    let spectrum = synthetic(&truth, &template(1, PRESSURE), &config, NoiseSpec::Snr(1000.0), 42);
    let mut dataset = Dataset::new("single").with_spectrum(spectrum).unwrap();

    let mut registry = co2_registry();
    scale(&mut registry, strong(), LineQuantity::Sw, 0.9);
    scale(&mut registry, strong(), LineQuantity::Gamma0, 0.85);
    // a wrong, fixed pressure shift; nu absorbs it
    scale(&mut registry, strong(), LineQuantity::Delta0, 2.0 / 3.0);
    registry.get_mut(strong()).unwrap().params.nu += 0.002;

    let result = {
        let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
        orchestrator
            .fit(orchestrator.build_parameters().unwrap(), &LmConfig::default())
            .unwrap()
    };
    assert!(result.success, "{}", result.message);
    // nu, sw and gamma0 of both lines plus the baseline offset
    assert_eq!(result.nvarys, 7);
    assert!(result.covariance.is_some());

    let v = &result.vector;
    assert_relative_eq!(v.value("sw_2_1_0").unwrap(), 1e-23, max_relative = 1e-2);
    assert_relative_eq!(v.value("gamma0_air_2_1_0").unwrap(), 0.07, max_relative = 2e-2);
    // only the pressure-shifted center is observable at one pressure
    let center = v.value("nu_2_1_0").unwrap() + PRESSURE * v.value("delta0_air_2_1_0").unwrap();
    assert_abs_diff_eq!(center, 6000.0 + PRESSURE * -0.006, epsilon = 2e-4);

    let stderr = v.get("sw_2_1_0").unwrap().stderr().unwrap();
    assert!(stderr > 0.0 && stderr < 1e-25);

    update_params(&result, &mut registry, &mut dataset).unwrap();
    assert_relative_eq!(stored(&registry, strong(), LineQuantity::Sw), v.value("sw_2_1_0").unwrap());
    let transition = registry.get(strong()).unwrap();
    assert!(transition.uncertainties.contains_key("sw"));
    assert!(transition.uncertainties.contains_key("gamma0_air"));
    assert!(!transition.uncertainties.contains_key("delta0_air"));
}

#[test]
fn test_speed_dependent_fit_recovers_sd_gamma() {
    let truth = co2_registry();
    let config = vary_all(
        FitConfig::new(ProfileKind::SpeedDependentVoigt),
        &[LineQuantity::Sw, LineQuantity::Gamma0, LineQuantity::SdGamma],
    );
    // at 1 atm the collisional width dominates and the speed dependence shows
    let spectrum = synthetic(&truth, &template(1, 1.0), &config, NoiseSpec::None, 0);
    let dataset = Dataset::new("sdvp").with_spectrum(spectrum).unwrap();

    let mut registry = co2_registry();
    scale(&mut registry, strong(), LineQuantity::SdGamma, 0.5);
    scale(&mut registry, strong(), LineQuantity::Gamma0, 0.95);

    let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
    let result = orchestrator
        .fit(orchestrator.build_parameters().unwrap(), &LmConfig::default())
        .unwrap();
    assert!(result.success, "{}", result.message);
    assert_relative_eq!(result.vector.value("SD_gamma_air_2_1_0").unwrap(), 0.1, max_relative = 1e-5);
    assert_relative_eq!(result.vector.value("gamma0_air_2_1_0").unwrap(), 0.07, max_relative = 1e-6);
}

#[test]
fn test_position_and_intensity_converge_together() {
    // nu ~ 6e3 and sw ~ 1e-23 in one vector; neither may stop the other early
    let truth = co2_registry();
    let config = vary_all(
        FitConfig::new(ProfileKind::Voigt),
        &[LineQuantity::Nu, LineQuantity::Sw, LineQuantity::Gamma0],
    );
    let spectrum = synthetic(&truth, &template(1, PRESSURE), &config, NoiseSpec::None, 0);
    let dataset = Dataset::new("scaled").with_spectrum(spectrum).unwrap();

    let mut registry = co2_registry();
    scale(&mut registry, strong(), LineQuantity::Sw, 0.6);
    scale(&mut registry, strong(), LineQuantity::Gamma0, 1.25);
    registry.get_mut(strong()).unwrap().params.nu += 0.003;

    let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
    let result = orchestrator
        .fit(orchestrator.build_parameters().unwrap(), &LmConfig::default())
        .unwrap();
    assert!(result.success, "{}", result.message);
    assert_eq!(result.nvarys, 7);

    let v = &result.vector;
    assert_abs_diff_eq!(v.value("nu_2_1_0").unwrap(), 6000.0, epsilon = 1e-7);
    assert_relative_eq!(v.value("sw_2_1_0").unwrap(), 1e-23, max_relative = 1e-6);
    assert_relative_eq!(v.value("gamma0_air_2_1_0").unwrap(), 0.07, max_relative = 1e-6);
    assert_relative_eq!(v.value("sw_2_1_1").unwrap(), 5e-24, max_relative = 1e-6);
}

#[test]
fn test_voigt_fit_leaves_speed_dependence_fixed() {
    let truth = co2_registry();
    let config = vary_all(
        FitConfig::new(ProfileKind::Voigt),
        &[LineQuantity::Sw, LineQuantity::SdGamma],
    );
    let spectrum = synthetic(&truth, &template(1, PRESSURE), &config, NoiseSpec::None, 0);
    let dataset = Dataset::new("vp").with_spectrum(spectrum).unwrap();

    let orchestrator = FitOrchestrator::new(&truth, &dataset, &config).unwrap();
    let vector = orchestrator.build_parameters().unwrap();
    assert!(vector.get("sw_2_1_0").unwrap().vary());
    assert!(!vector.get("SD_gamma_air_2_1_0").unwrap().vary());
}

//! Two spectra at different pressures fitted together.

use crate::test_helpers::{co2_registry, scale, stored, strong, synthetic, template, weak};
use approx::{assert_abs_diff_eq, assert_relative_eq};
use specfit_rs::fit::{update_params, ConstrainFlags, FitConfig, FitOrchestrator, VarySpec};
use specfit_rs::lineshape::ProfileKind;
use specfit_rs::lm::LmConfig;
use specfit_rs::registry::{LineListReader, LineListWriter, LineQuantity, TransitionRegistry};
use specfit_rs::simulate::NoiseSpec;
use specfit_rs::Dataset;

fn pair(registry: &TransitionRegistry, config: &FitConfig) -> Dataset {
    Dataset::new("pair")
        .with_spectrum(synthetic(registry, &template(1, 0.1), config, NoiseSpec::None, 0))
        .unwrap()
        .with_spectrum(synthetic(registry, &template(2, 0.4), config, NoiseSpec::None, 0))
        .unwrap()
}

#[test]
fn test_shared_parameters_separate_position_and_shift() {
    let isotope = VarySpec::isotopes(&[(2, 1)]);
    let config = FitConfig::new(ProfileKind::Voigt)
        .with_vary_line(LineQuantity::Nu, isotope.clone())
        .with_vary_line(LineQuantity::Sw, isotope.clone().with_transition(weak(), false))
        .with_vary_line(LineQuantity::Gamma0, isotope.clone())
        .with_vary_line(LineQuantity::Delta0, isotope);
    let mut dataset = pair(&co2_registry(), &config);

    let mut registry = co2_registry();
    scale(&mut registry, strong(), LineQuantity::Sw, 0.95);
    scale(&mut registry, strong(), LineQuantity::Gamma0, 0.9);
    scale(&mut registry, strong(), LineQuantity::Delta0, 0.7);
    registry.get_mut(strong()).unwrap().params.nu += 0.001;

    let result = {
        let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
        let vector = orchestrator.build_parameters().unwrap();
        assert!(!vector.get("sw_2_1_1").unwrap().vary());
        orchestrator.fit(vector, &LmConfig::default()).unwrap()
    };
    assert!(result.success, "{}", result.message);
    // 4 + 3 line entries and one baseline offset per spectrum
    assert_eq!(result.nvarys, 9);
    assert_eq!(result.residuals.len(), 2);
    assert!(result.covariance.is_some());

    // start: nu +1e-3, delta0 -0.0042, gamma0 -10 %, sw -5 %
    let v = &result.vector;
    assert_abs_diff_eq!(v.value("nu_2_1_0").unwrap(), 6000.0, epsilon = 1e-7);
    assert_relative_eq!(v.value("delta0_air_2_1_0").unwrap(), -0.006, max_relative = 1e-6);
    assert_relative_eq!(v.value("gamma0_air_2_1_0").unwrap(), 0.07, max_relative = 1e-6);
    assert_relative_eq!(v.value("sw_2_1_0").unwrap(), 1e-23, max_relative = 1e-6);

    update_params(&result, &mut registry, &mut dataset).unwrap();
    assert_eq!(
        stored(&registry, strong(), LineQuantity::Gamma0),
        v.value("gamma0_air_2_1_0").unwrap()
    );
    assert_eq!(stored(&registry, weak(), LineQuantity::Sw), 5e-24);
    assert!(registry.get(strong()).unwrap().overrides.is_empty());
    for n in [1, 2] {
        assert!(dataset.baseline(n).unwrap().baseline[0].abs() < 1e-6);
    }
}

#[test]
fn test_unconstrained_intensities_are_written_per_spectrum() {
    let isotope = VarySpec::isotopes(&[(2, 1)]);
    let config = FitConfig {
        constrain: ConstrainFlags {
            sw: false,
            ..ConstrainFlags::default()
        },
        ..FitConfig::new(ProfileKind::Voigt)
    }
    .with_vary_line(LineQuantity::Sw, isotope.clone())
    .with_vary_line(LineQuantity::Gamma0, isotope);

    // the second spectrum sees a 10 % stronger line
    let mut truth = co2_registry();
    truth
        .get_mut(strong())
        .unwrap()
        .set_override(2, LineQuantity::Sw, None, 1.1e-23);
    let mut dataset = pair(&truth, &config);

    let mut registry = co2_registry();
    scale(&mut registry, strong(), LineQuantity::Gamma0, 0.9);

    let result = {
        let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
        let vector = orchestrator.build_parameters().unwrap();
        assert!(vector.contains("sw_2_1_0_s1"));
        assert!(vector.contains("sw_2_1_0_s2"));
        assert!(!vector.contains("sw_2_1_0"));
        assert!(vector.contains("gamma0_air_2_1_0"));
        orchestrator.fit(vector, &LmConfig::default()).unwrap()
    };
    assert!(result.success, "{}", result.message);
    assert_relative_eq!(result.vector.value("sw_2_1_0_s1").unwrap(), 1e-23, max_relative = 1e-6);
    assert_relative_eq!(result.vector.value("sw_2_1_0_s2").unwrap(), 1.1e-23, max_relative = 1e-6);
    assert_relative_eq!(result.vector.value("gamma0_air_2_1_0").unwrap(), 0.07, max_relative = 1e-6);

    update_params(&result, &mut registry, &mut dataset).unwrap();
    let mut buffer = Vec::new();
    LineListWriter::new().write(&registry, &mut buffer).unwrap();
    let text = String::from_utf8(buffer.clone()).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.split(',').any(|c| c == "sw_s1"));
    assert!(header.split(',').any(|c| c == "sw_s2_err"));

    let mut reread = TransitionRegistry::new();
    LineListReader::new()
        .with_diluents(&["air"])
        .read_into(buffer.as_slice(), &mut reread)
        .unwrap();
    let transition = reread.get(strong()).unwrap();
    let s2 = transition.value_for(LineQuantity::Sw, None, Some(2)).unwrap();
    assert_relative_eq!(s2, 1.1e-23, max_relative = 1e-6);
    assert!(transition.uncertainties.contains_key("sw_s2"));
}

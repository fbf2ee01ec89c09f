//! Parameter vectors built for real fits: expression ties, limits, bound
//! checks and saved vectors.

use crate::test_helpers::{co2_registry, scale, stored, strong, synthetic, template, weak};
use approx::assert_relative_eq;
use specfit_rs::fit::{update_params, FitConfig, FitOrchestrator, Limit, VarySpec};
use specfit_rs::lineshape::ProfileKind;
use specfit_rs::lm::LmConfig;
use specfit_rs::parameters::{Bounds, ParameterVector};
use specfit_rs::registry::LineQuantity;
use specfit_rs::simulate::NoiseSpec;
use specfit_rs::{Dataset, SpecFitError};

fn sw_config() -> FitConfig {
    FitConfig::new(ProfileKind::Voigt).with_vary_line(LineQuantity::Sw, VarySpec::isotopes(&[(2, 1)]))
}

fn dataset(config: &FitConfig) -> Dataset {
    let spectrum = synthetic(&co2_registry(), &template(1, 0.3), config, NoiseSpec::None, 0);
    Dataset::new("single").with_spectrum(spectrum).unwrap()
}

#[test]
fn test_expression_tie_holds_through_a_fit() {
    let config = sw_config();
    let mut dataset = dataset(&config);
    let mut registry = co2_registry();
    scale(&mut registry, strong(), LineQuantity::Sw, 0.8);
    scale(&mut registry, weak(), LineQuantity::Sw, 0.8);

    let result = {
        let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
        let mut vector = orchestrator.build_parameters().unwrap();
        vector.set_expr("sw_2_1_1", Some("0.5 * sw_2_1_0")).unwrap();
        orchestrator.fit(vector, &LmConfig::default()).unwrap()
    };
    assert!(result.success, "{}", result.message);
    // strong-line intensity and the baseline offset
    assert_eq!(result.nvarys, 2);

    let strong_sw = result.vector.value("sw_2_1_0").unwrap();
    assert_relative_eq!(strong_sw, 1e-23, max_relative = 1e-6);
    assert_relative_eq!(result.vector.value("sw_2_1_1").unwrap(), 0.5 * strong_sw, max_relative = 1e-12);
    assert!(result.vector.get("sw_2_1_1").unwrap().stderr().is_none());

    update_params(&result, &mut registry, &mut dataset).unwrap();
    assert_relative_eq!(stored(&registry, weak(), LineQuantity::Sw), 5e-24, max_relative = 1e-6);
}

#[test]
fn test_resolving_twice_changes_nothing() {
    let config = sw_config();
    let dataset = dataset(&config);
    let registry = co2_registry();
    let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
    let mut vector = orchestrator.build_parameters().unwrap();
    vector
        .set_expr("gamma0_air_2_1_1", Some("gamma0_air_2_1_0 - 0.005"))
        .unwrap();

    vector.resolve_expressions().unwrap();
    let once: Vec<f64> = vector.entries().iter().map(|e| e.value()).collect();
    vector.resolve_expressions().unwrap();
    let twice: Vec<f64> = vector.entries().iter().map(|e| e.value()).collect();
    assert_eq!(once, twice);
    assert_relative_eq!(vector.value("gamma0_air_2_1_1").unwrap(), 0.065, max_relative = 1e-12);
}

#[test]
fn test_cyclic_ties_are_rejected() {
    let config = sw_config();
    let dataset = dataset(&config);
    let registry = co2_registry();
    let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
    let mut vector = orchestrator.build_parameters().unwrap();
    vector.set_expr("sw_2_1_0", Some("2 * sw_2_1_1")).unwrap();
    vector.set_expr("sw_2_1_1", Some("0.5 * sw_2_1_0")).unwrap();

    assert!(vector.clone().resolve_expressions().is_err());
    assert!(matches!(
        orchestrator.fit(vector, &LmConfig::default()),
        Err(SpecFitError::ParameterError(_))
    ));
}

#[test]
fn test_limits_bound_varying_entries_only() {
    let mut config = FitConfig::new(ProfileKind::Voigt)
        .with_vary_line(LineQuantity::Nu, VarySpec::isotopes(&[(2, 1)]))
        .with_vary_line(LineQuantity::Sw, VarySpec::isotopes(&[(2, 1)]))
        .with_vary_line(LineQuantity::Gamma0, VarySpec::isotopes(&[(2, 1)]));
    config.limits.nu = Limit::enabled(0.1);
    config.limits.sw = Limit::enabled(2.0);
    config.limits.gamma0 = Limit::enabled(3.0);
    config.limits.delta0 = Limit::enabled(2.0);

    let dataset = dataset(&config);
    let registry = co2_registry();
    let vector = FitOrchestrator::new(&registry, &dataset, &config)
        .unwrap()
        .build_parameters()
        .unwrap();

    let sw = vector.get("sw_2_1_0").unwrap();
    assert_relative_eq!(sw.min(), 5e-24, max_relative = 1e-12);
    assert_relative_eq!(sw.max(), 2e-23, max_relative = 1e-12);

    let gamma0 = vector.get("gamma0_air_2_1_0").unwrap();
    assert_relative_eq!(gamma0.min(), 0.07 / 3.0, max_relative = 1e-12);
    assert_relative_eq!(gamma0.max(), 0.21, max_relative = 1e-12);

    let nu = vector.get("nu_2_1_0").unwrap();
    assert_relative_eq!(nu.min(), 5999.9, max_relative = 1e-12);
    assert_relative_eq!(nu.max(), 6000.1, max_relative = 1e-12);

    // delta0 has a limit but is not varied
    let delta0 = vector.get("delta0_air_2_1_0").unwrap();
    assert!(!delta0.vary());
    assert_eq!(*delta0.bounds(), Bounds::unbounded());
}

#[test]
fn test_start_outside_bounds_is_a_bound_violation() {
    let config = sw_config();
    let dataset = dataset(&config);
    let registry = co2_registry();
    let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
    let mut vector = orchestrator.build_parameters().unwrap();
    vector
        .set_bounds("sw_2_1_0", Bounds::new(2e-23, 3e-23).unwrap())
        .unwrap();

    match orchestrator.fit(vector, &LmConfig::default()) {
        Err(SpecFitError::BoundViolation { name, value, min, .. }) => {
            assert_eq!(name, "sw_2_1_0");
            assert_eq!(value, 1e-23);
            assert_eq!(min, 2e-23);
        }
        other => panic!("expected a bound violation, got {:?}", other.map(|r| r.message)),
    }
}

#[test]
fn test_saved_vector_seeds_a_new_fit() {
    let config = sw_config();
    let dataset = dataset(&config);
    let mut registry = co2_registry();
    scale(&mut registry, strong(), LineQuantity::Sw, 0.8);

    let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
    let mut vector = orchestrator.build_parameters().unwrap();
    vector.set_expr("sw_2_1_1", Some("0.5 * sw_2_1_0")).unwrap();
    let result = orchestrator.fit(vector, &LmConfig::default()).unwrap();
    let json = result.vector.to_json().unwrap();

    let saved = ParameterVector::from_json(&json).unwrap();
    let mut fresh = orchestrator.build_parameters().unwrap();
    assert_eq!(fresh.apply_saved(&saved).unwrap(), fresh.len());
    fresh.resolve_expressions().unwrap();

    assert_eq!(fresh.get("sw_2_1_1").unwrap().expr(), Some("0.5 * sw_2_1_0"));
    assert!(!fresh.get("sw_2_1_1").unwrap().vary());
    assert_relative_eq!(
        fresh.value("sw_2_1_0").unwrap(),
        result.vector.value("sw_2_1_0").unwrap(),
        max_relative = 1e-12
    );
    // the seeded vector is already at the optimum
    let refit = orchestrator.fit(fresh, &LmConfig::default()).unwrap();
    assert!(refit.chisqr <= result.chisqr + 1e-12);
}

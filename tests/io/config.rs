//! Fit configurations stored as JSON.

use approx::assert_relative_eq;
use specfit_rs::fit::{ConstrainFlags, FitConfig, Limit, VarySpec};
use specfit_rs::lineshape::ProfileKind;
use specfit_rs::registry::{LineQuantity, TransitionId};
use specfit_rs::SpecFitError;

fn config() -> FitConfig {
    let mut config = FitConfig {
        linemixing: true,
        wing_cutoff: Some(50.0),
        constrain: ConstrainFlags {
            sw: false,
            ..ConstrainFlags::default()
        },
        ..FitConfig::new(ProfileKind::SpeedDependentVoigt)
    }
    .with_vary_line(LineQuantity::Gamma0, VarySpec::isotopes(&[(2, 1)]))
    .with_vary_line(
        LineQuantity::SdGamma,
        VarySpec::isotopes(&[(2, 1)]).with_transition(TransitionId::new(2, 1, 3), false),
    );
    config.vary.molefraction.insert(2, true);
    config.vary.etalon_amplitude = true;
    config.limits.gamma0 = Limit::enabled(3.0);
    config
}

#[test]
fn test_json_round_trip() {
    let expected = config();
    let json = expected.to_json().unwrap();
    assert!(json.contains("\"SDVP\""));
    assert!(json.contains("\"SD_gamma\""));

    let loaded = FitConfig::from_json(&json).unwrap();
    assert_eq!(loaded.profile, expected.profile);
    assert_eq!(loaded.linemixing, expected.linemixing);
    assert_eq!(loaded.constrain, expected.constrain);
    assert_eq!(loaded.vary, expected.vary);
    assert_eq!(loaded.weight_spectra, expected.weight_spectra);
    assert_relative_eq!(loaded.fit_intensity, expected.fit_intensity, max_relative = 1e-15);
    assert_relative_eq!(loaded.wing_cutoff.unwrap(), 50.0);
    assert!(loaded.limits.gamma0.enabled);
    assert_relative_eq!(loaded.limits.gamma0.factor, 3.0);
    assert!(!loaded.limits.sw.enabled);

    let spec = loaded.vary.line_spec(LineQuantity::SdGamma).unwrap();
    assert!(spec.is_varied(TransitionId::new(2, 1, 0)));
    assert!(!spec.is_varied(TransitionId::new(2, 1, 3)));
}

#[test]
fn test_partial_json_takes_defaults() {
    let json = r#"{
        "profile": "HTP",
        "vary": { "lines": { "gamma0": { "isotopes": { "2": { "1": true } } } } }
    }"#;
    let config = FitConfig::from_json(json).unwrap();
    assert_eq!(config.profile, ProfileKind::HartmannTran);
    assert!(!config.linemixing);
    assert!(config.vary.baseline);
    assert_eq!(config.constrain, ConstrainFlags::default());
    assert!(config
        .vary
        .line_spec(LineQuantity::Gamma0)
        .unwrap()
        .is_varied(TransitionId::new(2, 1, 7)));
}

#[test]
fn test_invalid_json_configs() {
    let unknown_quantity = r#"{ "vary": { "lines": { "gamma7": {} } } }"#;
    assert!(matches!(
        FitConfig::from_json(unknown_quantity),
        Err(SpecFitError::Configuration(_))
    ));

    let bad_factor = r#"{ "limits": { "sw": { "enabled": true, "factor": -2.0 } } }"#;
    assert!(matches!(
        FitConfig::from_json(bad_factor),
        Err(SpecFitError::Configuration(_))
    ));

    assert!(matches!(
        FitConfig::from_json("{ \"profile\": \"Lorentz\" }"),
        Err(SpecFitError::JsonError(_))
    ));
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!("specfit_config_{}.json", std::process::id()));
    let expected = config();
    expected.save_json(&path).unwrap();
    let loaded = FitConfig::load_json(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.vary, expected.vary);
    assert_eq!(loaded.profile, ProfileKind::SpeedDependentVoigt);
}

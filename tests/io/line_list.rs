//! Line lists and spectrum tables read from CSV, fitted and written back.

use crate::test_helpers::{strong, synthetic, template};
use approx::assert_relative_eq;
use specfit_rs::fit::{update_params, FitConfig, FitOrchestrator, VarySpec};
use specfit_rs::lineshape::ProfileKind;
use specfit_rs::lm::LmConfig;
use specfit_rs::registry::{LineListReader, LineListWriter, LineQuantity, TransitionRegistry};
use specfit_rs::simulate::NoiseSpec;
use specfit_rs::spectrum::SpectrumReader;
use specfit_rs::Dataset;

const LINE_LIST: &str = "\
molec_id,local_iso_id,trans_index,nu,sw,gamma0_air,n_gamma0_air,delta0_air,gamma0_self
2,1,0,6000.0,1e-23,0.07,0.75,-0.006,0.09
2,1,1,6000.35,5e-24,0.065,0.75,-0.005,
";

fn read(text: &str) -> TransitionRegistry {
    let mut registry = TransitionRegistry::new();
    let added = LineListReader::new().read_into(text.as_bytes(), &mut registry).unwrap();
    assert_eq!(added, 2);
    registry
}

#[test]
fn test_read_fit_write_read() {
    let truth = read(LINE_LIST);
    // an empty self-broadening cell falls back to the air value
    let weak = truth.get(specfit_rs::registry::TransitionId::new(2, 1, 1)).unwrap();
    assert_eq!(weak.params.get(LineQuantity::Gamma0, Some("self")), Some(0.065));

    let config = FitConfig::new(ProfileKind::Voigt)
        .with_vary_line(LineQuantity::Gamma0, VarySpec::isotopes(&[(2, 1)]));
    let spectrum = synthetic(&truth, &template(1, 0.3), &config, NoiseSpec::None, 0);
    let mut dataset = Dataset::new("csv").with_spectrum(spectrum).unwrap();

    let mut registry = read(&LINE_LIST.replace("0.07,0.75", "0.06,0.75"));
    let result = {
        let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
        orchestrator
            .fit(orchestrator.build_parameters().unwrap(), &LmConfig::default())
            .unwrap()
    };
    assert!(result.success, "{}", result.message);
    update_params(&result, &mut registry, &mut dataset).unwrap();

    let mut buffer = Vec::new();
    LineListWriter::new().write(&registry, &mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    assert!(text.lines().next().unwrap().split(',').any(|c| c == "gamma0_air_err"));

    let reread = read(&text);
    let transition = reread.get(strong()).unwrap();
    assert_relative_eq!(
        transition.params.get(LineQuantity::Gamma0, Some("air")).unwrap(),
        0.07,
        max_relative = 1e-5
    );
    assert_eq!(transition.params.get(LineQuantity::Gamma0, Some("self")), Some(0.09));
    let error = transition.uncertainties["gamma0_air"];
    assert!(error > 0.0 && error.is_finite());
    // the fixed shift keeps no error
    assert!(!transition.uncertainties.contains_key("delta0_air"));
}

#[test]
fn test_spectrum_table_drives_a_fit() {
    let truth = read(LINE_LIST);
    let config = FitConfig::new(ProfileKind::Voigt)
        .with_vary_line(LineQuantity::Sw, VarySpec::isotopes(&[(2, 1)]));
    let simulated = synthetic(&truth, &template(1, 0.3), &config, NoiseSpec::None, 0);

    // rows in descending frequency; the reader sorts them
    let mut table = String::from("wavenumber,alpha\n");
    for (nu, alpha) in simulated.frequency().iter().zip(simulated.signal().iter()).rev() {
        table.push_str(&format!("{},{}\n", nu, alpha));
    }
    let spectrum = SpectrumReader::new("wavenumber", "alpha")
        .read(table.as_bytes(), "table", 1)
        .unwrap()
        .with_conditions(296.0, 0.3)
        .with_mole_fraction(2, 0.01);
    assert_eq!(spectrum.frequency(), simulated.frequency());
    assert_eq!(spectrum.signal(), simulated.signal());

    let dataset = Dataset::new("table").with_spectrum(spectrum).unwrap();
    let mut registry = read(&LINE_LIST.replace("6000.0,1e-23", "6000.0,8e-24"));
    let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
    let result = orchestrator
        .fit(orchestrator.build_parameters().unwrap(), &LmConfig::default())
        .unwrap();
    assert!(result.success, "{}", result.message);
    assert_relative_eq!(result.vector.value("sw_2_1_0").unwrap(), 1e-23, max_relative = 1e-6);

    let mut dataset = dataset.clone();
    update_params(&result, &mut registry, &mut dataset).unwrap();
    assert_relative_eq!(
        registry.get(strong()).unwrap().params.sw,
        1e-23,
        max_relative = 1e-6
    );
}

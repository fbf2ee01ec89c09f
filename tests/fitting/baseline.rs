//! Baseline polynomials and etalons, with no line parameter varied.

use crate::test_helpers::{co2_registry, synthetic, template, POINTS};
use approx::assert_relative_eq;
use specfit_rs::fit::{update_params, write_baseline_list, FitConfig, FitOrchestrator};
use specfit_rs::lineshape::ProfileKind;
use specfit_rs::lm::LmConfig;
use specfit_rs::simulate::NoiseSpec;
use specfit_rs::spectrum::Etalon;
use specfit_rs::Dataset;

#[test]
fn test_quadratic_baseline_is_recovered() {
    let registry = co2_registry();
    let config = FitConfig::new(ProfileKind::Voigt);
    let truth = template(1, 0.3).with_baseline(vec![1.0, 0.2, -0.05]);
    let measured = synthetic(&registry, &truth, &config, NoiseSpec::None, 0);
    let start = measured.clone().with_baseline(vec![0.5, 0.0, 0.0]);
    let mut dataset = Dataset::new("baseline").with_spectrum(start).unwrap();

    let (result, summary) = {
        let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
        let result = orchestrator
            .fit(orchestrator.build_parameters().unwrap(), &LmConfig::default())
            .unwrap();
        let summary = orchestrator.residual_analysis(&result).unwrap();
        (result, summary)
    };
    assert!(result.success, "{}", result.message);
    assert_eq!(result.nvarys, 3);
    assert_eq!(result.ndata, POINTS);
    for (name, expected) in [("baseline_a_1", 1.0), ("baseline_b_1", 0.2), ("baseline_c_1", -0.05)] {
        assert_relative_eq!(result.vector.value(name).unwrap(), expected, epsilon = 1e-6);
    }

    assert_eq!(summary.spectra.len(), 1);
    assert_eq!(summary.spectra[0].points, POINTS);
    assert!(summary.spectra[0].rms < 1e-6);
    assert!(summary.spectra[0].qf > 1e4);

    update_params(&result, &mut co2_registry(), &mut dataset).unwrap();
    let entry = dataset.baseline(1).unwrap();
    assert_relative_eq!(entry.baseline[1], 0.2, epsilon = 1e-6);
    assert!(entry.stderr.contains_key("baseline_c"));

    let mut buffer = Vec::new();
    write_baseline_list(&dataset, &mut buffer).unwrap();
    let mut reader = csv::Reader::from_reader(buffer.as_slice());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "spectrum");
    assert!(headers.iter().any(|h| h == "baseline_c_err"));
    assert_eq!(reader.records().count(), 1);
}

#[test]
fn test_etalon_amplitude_and_phase_are_recovered() {
    let registry = co2_registry();
    let mut config = FitConfig::new(ProfileKind::Voigt);
    config.vary.etalon_amplitude = true;
    config.vary.etalon_phase = true;

    let truth = template(1, 0.3)
        .with_baseline(vec![1.0])
        .with_etalon(Etalon::new(0.05, 0.4, 0.3));
    let measured = synthetic(&registry, &truth, &config, NoiseSpec::None, 0);
    let start = template(1, 0.3)
        .with_baseline(vec![1.0])
        .with_etalon(Etalon::new(0.03, 0.4, 0.0))
        .with_signal(measured.signal().clone())
        .unwrap();
    let dataset = Dataset::new("etalon").with_spectrum(start).unwrap();

    let orchestrator = FitOrchestrator::new(&registry, &dataset, &config).unwrap();
    let vector = orchestrator.build_parameters().unwrap();
    assert!(!vector.get("etalon_1_period_1").unwrap().vary());
    let result = orchestrator.fit(vector, &LmConfig::default()).unwrap();

    assert!(result.success, "{}", result.message);
    assert_relative_eq!(result.vector.value("etalon_1_amp_1").unwrap(), 0.05, epsilon = 1e-6);
    assert_relative_eq!(result.vector.value("etalon_1_phase_1").unwrap(), 0.3, epsilon = 1e-5);
    assert_relative_eq!(result.vector.value("baseline_a_1").unwrap(), 1.0, epsilon = 1e-6);
}

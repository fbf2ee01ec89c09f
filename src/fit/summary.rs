//! Residual statistics and the CSV outputs of a fit.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::dataset::Dataset;
use crate::error::Result;
use crate::spectrum::{SimulatedSpectrum, Spectrum, SpectrumQuantity};

/// Residual statistics of one spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSummary {
    pub spectrum_number: u32,
    pub name: String,
    pub points: usize,
    pub temperature: f64,
    pub pressure: f64,
    /// Root mean square of `model − measured`.
    pub rms: f64,
    pub max_abs: f64,
    /// Signal range over the population standard deviation of the residual.
    /// Infinite for a residual with zero spread.
    pub qf: f64,
}

impl SpectrumSummary {
    pub fn from_simulation(spectrum: &Spectrum, simulated: &SimulatedSpectrum) -> Self {
        let residual = &simulated.model - &simulated.measured;
        let n = residual.len().max(1) as f64;
        let mean = residual.sum() / n;
        let rms = (residual.dot(&residual) / n).sqrt();
        let std = (residual.mapv(|r| (r - mean).powi(2)).sum() / n).sqrt();
        let max_abs = residual.iter().fold(0.0_f64, |m, r| m.max(r.abs()));

        let signal = &simulated.measured;
        let hi = signal.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lo = signal.iter().copied().fold(f64::INFINITY, f64::min);
        let qf = if std > 0.0 { (hi - lo) / std } else { f64::INFINITY };

        Self {
            spectrum_number: spectrum.number,
            name: spectrum.name.clone(),
            points: residual.len(),
            temperature: spectrum.temperature,
            pressure: spectrum.pressure,
            rms,
            max_abs,
            qf,
        }
    }
}

/// Per-spectrum statistics plus the fit's global figures.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualSummary {
    pub spectra: Vec<SpectrumSummary>,
    pub success: bool,
    pub message: String,
    pub chisqr: f64,
    pub redchi: f64,
    pub ndata: usize,
    pub nvarys: usize,
}

impl ResidualSummary {
    pub fn write_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write(file)
    }

    /// `#` metadata lines, then one CSV row per spectrum.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "# success: {}", self.success)?;
        writeln!(writer, "# message: {}", self.message)?;
        writeln!(writer, "# data points: {}", self.ndata)?;
        writeln!(writer, "# varying parameters: {}", self.nvarys)?;
        writeln!(writer, "# chi-square: {:e}", self.chisqr)?;
        writeln!(writer, "# reduced chi-square: {:e}", self.redchi)?;

        let mut out = csv::Writer::from_writer(writer);
        out.write_record(["spectrum", "name", "points", "temperature", "pressure", "rms", "max_abs", "qf"])?;
        for s in &self.spectra {
            out.write_record([
                s.spectrum_number.to_string(),
                s.name.clone(),
                s.points.to_string(),
                s.temperature.to_string(),
                s.pressure.to_string(),
                format!("{:e}", s.rms),
                format!("{:e}", s.max_abs),
                s.qf.to_string(),
            ])?;
        }
        out.flush()?;
        Ok(())
    }
}

/// One row per spectrum: every baseline, etalon, mole-fraction and shift
/// value followed by its `_err` column. Missing errors are written as 0.
pub fn write_baseline_list<W: io::Write>(dataset: &Dataset, writer: W) -> Result<()> {
    let quantities: BTreeSet<SpectrumQuantity> = dataset
        .baselines()
        .iter()
        .flat_map(|b| b.quantities())
        .collect();

    let mut header = vec!["spectrum".to_string()];
    for q in &quantities {
        header.push(q.column_name());
        header.push(format!("{}_err", q.column_name()));
    }

    let mut out = csv::Writer::from_writer(writer);
    out.write_record(&header)?;
    for entry in dataset.baselines() {
        let mut record = vec![entry.spectrum_number.to_string()];
        for &q in &quantities {
            match entry.value(q) {
                Some(v) => {
                    record.push(v.to_string());
                    record.push(entry.stderr.get(&q.column_name()).copied().unwrap_or(0.0).to_string());
                }
                None => {
                    record.push(String::new());
                    record.push(String::new());
                }
            }
        }
        out.write_record(&record)?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_baseline_list_path<P: AsRef<Path>>(dataset: &Dataset, path: P) -> Result<()> {
    write_baseline_list(dataset, File::create(path.as_ref())?)
}

/// Frequency, measured, model, residual, baseline and etalon of one
/// spectrum.
pub fn write_trace<W: io::Write>(simulated: &SimulatedSpectrum, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["frequency", "measured", "model", "residual", "baseline", "etalon"])?;
    for i in 0..simulated.frequency.len() {
        out.write_record([
            simulated.frequency[i].to_string(),
            simulated.measured[i].to_string(),
            simulated.model[i].to_string(),
            simulated.residual[i].to_string(),
            simulated.baseline[i].to_string(),
            simulated.etalon[i].to_string(),
        ])?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::Etalon;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    fn simulated(measured: Array1<f64>, model: Array1<f64>) -> SimulatedSpectrum {
        let n = measured.len();
        SimulatedSpectrum {
            spectrum_number: 3,
            frequency: Array1::linspace(6000.0, 6001.0, n),
            residual: &model - &measured,
            measured,
            absorption: Array1::zeros(n),
            cia: Array1::zeros(n),
            baseline: Array1::zeros(n),
            etalon: Array1::zeros(n),
            model,
        }
    }

    fn spectrum() -> Spectrum {
        Spectrum::new("s3", 3, Array1::linspace(6000.0, 6001.0, 4), Array1::zeros(4)).unwrap()
    }

    #[test]
    fn test_statistics() {
        let sim = simulated(array![0.0, 10.0, 4.0, 2.0], array![1.0, 9.0, 5.0, 1.0]);
        let summary = SpectrumSummary::from_simulation(&spectrum(), &sim);
        assert_eq!(summary.points, 4);
        assert_relative_eq!(summary.rms, 1.0);
        assert_relative_eq!(summary.max_abs, 1.0);
        // residual [1, -1, 1, -1]: std 1, range 10
        assert_relative_eq!(summary.qf, 10.0);
    }

    #[test]
    fn test_perfect_model_has_infinite_qf() {
        let sim = simulated(array![1.0, 2.0], array![1.0, 2.0]);
        let spectrum = Spectrum::new("s3", 3, array![1.0, 2.0], array![1.0, 2.0]).unwrap();
        let summary = SpectrumSummary::from_simulation(&spectrum, &sim);
        assert_eq!(summary.rms, 0.0);
        assert!(summary.qf.is_infinite());
    }

    #[test]
    fn test_summary_csv() {
        let sim = simulated(array![0.0, 10.0, 4.0, 2.0], array![1.0, 9.0, 5.0, 1.0]);
        let summary = ResidualSummary {
            spectra: vec![SpectrumSummary::from_simulation(&spectrum(), &sim)],
            success: true,
            message: "converged".to_string(),
            chisqr: 4.0,
            redchi: 1.0,
            ndata: 4,
            nvarys: 0,
        };
        let mut buffer = Vec::new();
        summary.write(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# success: true");
        assert_eq!(lines.iter().filter(|l| l.starts_with('#')).count(), 6);
        assert_eq!(lines[6], "spectrum,name,points,temperature,pressure,rms,max_abs,qf");
        assert!(lines[7].starts_with("3,s3,4,"));
    }

    #[test]
    fn test_baseline_list() {
        let dataset = Dataset::new("d")
            .with_spectrum(spectrum().with_baseline(vec![1.0, 0.5]))
            .unwrap()
            .with_spectrum(
                Spectrum::new("s4", 4, Array1::linspace(6000.0, 6001.0, 4), Array1::zeros(4))
                    .unwrap()
                    .with_etalon(Etalon::new(0.1, 1.0, 0.0)),
            )
            .unwrap();
        let mut dataset = dataset;
        dataset
            .baseline_mut(3)
            .unwrap()
            .stderr
            .insert("baseline_a".to_string(), 0.25);

        let mut buffer = Vec::new();
        write_baseline_list(&dataset, &mut buffer).unwrap();
        let mut reader = csv::Reader::from_reader(buffer.as_slice());
        let headers = reader.headers().unwrap().clone();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);

        let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
        assert_eq!(&rows[0][column("baseline_a")], "1");
        assert_eq!(&rows[0][column("baseline_a_err")], "0.25");
        assert_eq!(&rows[0][column("baseline_b_err")], "0");
        // spectrum 3 has no etalon, spectrum 4 no slope
        assert_eq!(&rows[0][column("etalon_1_amp")], "");
        assert_eq!(&rows[1][column("baseline_b")], "");
        assert_eq!(&rows[1][column("etalon_1_amp")], "0.1");
    }

    #[test]
    fn test_trace() {
        let sim = simulated(array![0.0, 1.0], array![0.5, 1.0]);
        let mut buffer = Vec::new();
        write_trace(&sim, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "frequency,measured,model,residual,baseline,etalon");
        assert_eq!(lines[1], "6000,0,0.5,0.5,0,0");
        assert_eq!(lines.len(), 3);
    }
}

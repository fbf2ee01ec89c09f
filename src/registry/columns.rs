//! CSV line-list reading and writing.
//!
//! A line list has one row per transition. The key columns are `molec_id`,
//! `local_iso_id` and an optional `trans_index`; `nu` and `sw` are required
//! and `elower` is optional. Per-diluent columns are named
//! `{label}_{diluent}`, e.g. `gamma0_air` or `SD_gamma_self`.
//!
//! Missing columns and empty cells are filled from an explicit, ordered
//! [`FallbackPolicy`] rather than from ad-hoc defaults.

use csv::StringRecord;
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{Result, SpecFitError};
use crate::registry::transition::{
    column_name, DiluentCoefficients, LineParameters, LineQuantity, Transition, TransitionId,
};
use crate::registry::TransitionRegistry;

/// Where a per-diluent value may come from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallbackSource {
    /// The quantity's own `{label}_{diluent}` column.
    OwnColumn,
    /// The quantity's `{label}_air` column.
    AirColumn,
    /// Another quantity of the same diluent, resolved earlier in the row.
    SameDiluent(LineQuantity),
    Constant(f64),
}

/// Ordered fallback chain per per-diluent quantity.
///
/// Quantities are resolved in [`LineQuantity::PER_DILUENT`] order, so a
/// [`FallbackSource::SameDiluent`] source may only name a quantity that comes
/// earlier in that order. A chain that yields nothing is a
/// [`SpecFitError::MissingData`].
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPolicy {
    chains: Vec<(LineQuantity, Vec<FallbackSource>)>,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl FallbackPolicy {
    /// The default chains, with `n_nu_vc_default` as the last resort for
    /// `n_nuVC`.
    pub fn new(n_nu_vc_default: f64) -> Self {
        use FallbackSource::*;
        use LineQuantity::*;

        let chains = LineQuantity::PER_DILUENT
            .iter()
            .map(|&q| {
                let chain = match q {
                    Gamma0 => vec![OwnColumn, AirColumn],
                    NGamma2 => vec![OwnColumn, SameDiluent(NGamma0)],
                    NDelta2 => vec![OwnColumn, SameDiluent(NDelta0)],
                    NNuVc => vec![OwnColumn, AirColumn, Constant(n_nu_vc_default)],
                    _ => vec![OwnColumn, AirColumn, Constant(0.0)],
                };
                (q, chain)
            })
            .collect();
        Self { chains }
    }

    pub fn chain(&self, quantity: LineQuantity) -> &[FallbackSource] {
        self.chains
            .iter()
            .find(|(q, _)| *q == quantity)
            .map(|(_, c)| c.as_slice())
            .unwrap_or(&[])
    }

    /// Replace the chain of a per-diluent quantity.
    pub fn set_chain(&mut self, quantity: LineQuantity, chain: Vec<FallbackSource>) -> Result<()> {
        let slot = self
            .chains
            .iter_mut()
            .find(|(q, _)| *q == quantity)
            .ok_or_else(|| {
                SpecFitError::Configuration(format!("'{}' has no per-diluent fallback chain", quantity))
            })?;
        slot.1 = chain;
        self.validate()
    }

    /// Check that every `SameDiluent` source refers backwards.
    pub fn validate(&self) -> Result<()> {
        for (position, (quantity, chain)) in self.chains.iter().enumerate() {
            for source in chain {
                if let FallbackSource::SameDiluent(other) = source {
                    let earlier = self.chains[..position].iter().any(|(q, _)| q == other);
                    if !earlier {
                        return Err(SpecFitError::Configuration(format!(
                            "fallback for '{}' references '{}', which is not resolved earlier",
                            quantity, other
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Reads CSV line lists into a [`TransitionRegistry`].
#[derive(Debug, Clone)]
pub struct LineListReader {
    /// Diluents to read per-diluent columns for. Defaults to `air` and `self`.
    pub diluents: Vec<String>,
    pub policy: FallbackPolicy,
    /// Whether the `sw` column already includes the natural isotope
    /// abundance (HITRAN convention, default true).
    pub abundance_weighted: bool,
}

impl Default for LineListReader {
    fn default() -> Self {
        Self {
            diluents: vec!["air".to_string(), "self".to_string()],
            policy: FallbackPolicy::default(),
            abundance_weighted: true,
        }
    }
}

impl LineListReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diluents(mut self, diluents: &[&str]) -> Self {
        self.diluents = diluents.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_n_nu_vc_default(mut self, value: f64) -> Self {
        self.policy = FallbackPolicy::new(value);
        self
    }

    pub fn with_abundance_weighted(mut self, weighted: bool) -> Self {
        self.abundance_weighted = weighted;
        self
    }

    /// Read a line-list file into a new registry with the built-in isotopes.
    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<TransitionRegistry> {
        let file = File::open(path.as_ref())?;
        let mut registry = TransitionRegistry::new();
        self.read_into(file, &mut registry)?;
        Ok(registry)
    }

    /// Read rows from `reader` and insert them into `registry`.
    /// Returns the number of transitions added.
    pub fn read_into<R: io::Read>(&self, reader: R, registry: &mut TransitionRegistry) -> Result<usize> {
        self.policy.validate()?;

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let columns = HeaderMap::new(&headers);

        for required in ["molec_id", "local_iso_id", "nu", "sw"] {
            if !columns.contains(required) {
                return Err(SpecFitError::MissingData(format!(
                    "line list has no '{}' column",
                    required
                )));
            }
        }

        let extra = columns.extra_columns();
        let mut added = 0;
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let line = row + 2;
            let cells = Row {
                record: &record,
                columns: &columns,
                line,
            };

            let molecule = cells.required_id("molec_id")?;
            let isotope = cells.required_id("local_iso_id")?;
            let index = match cells.id("trans_index")? {
                Some(v) => v,
                None => row,
            };

            let mut params = LineParameters::new(cells.required("nu")?, cells.required("sw")?);
            params.elower = cells.optional("elower")?;
            for diluent in &self.diluents {
                let coefficients = self.read_diluent(&cells, diluent)?;
                params.diluents.insert(diluent.clone(), coefficients);
            }

            let mut transition = Transition::new(TransitionId::new(molecule, isotope, index), params);
            transition.abundance_weighted = self.abundance_weighted;

            for column in &extra {
                let Some(value) = cells.optional(&column.header)? else {
                    continue;
                };
                match &column.kind {
                    ExtraKind::Uncertainty(name) => {
                        transition.uncertainties.insert(name.clone(), value);
                    }
                    ExtraKind::Override {
                        spectrum,
                        quantity,
                        diluent,
                    } => transition.set_override(*spectrum, *quantity, diluent.as_deref(), value),
                }
            }

            registry.insert(transition)?;
            added += 1;
        }

        debug!("read {} transitions from line list", added);
        Ok(added)
    }

    fn read_diluent(&self, cells: &Row<'_>, diluent: &str) -> Result<DiluentCoefficients> {
        let mut coefficients = DiluentCoefficients::default();
        for quantity in LineQuantity::PER_DILUENT {
            let mut resolved = None;
            for source in self.policy.chain(quantity) {
                resolved = match *source {
                    FallbackSource::OwnColumn => cells.optional(&column_name(quantity, Some(diluent)))?,
                    FallbackSource::AirColumn => cells.optional(&column_name(quantity, Some("air")))?,
                    FallbackSource::SameDiluent(other) => coefficients.get(other),
                    FallbackSource::Constant(v) => Some(v),
                };
                if resolved.is_some() {
                    break;
                }
            }

            let value = resolved.ok_or_else(|| {
                SpecFitError::MissingData(format!(
                    "line {}: no value for '{}' and no fallback",
                    cells.line,
                    column_name(quantity, Some(diluent))
                ))
            })?;
            coefficients.set(quantity, value);
        }
        Ok(coefficients)
    }
}

enum ExtraKind {
    Uncertainty(String),
    Override {
        spectrum: u32,
        quantity: LineQuantity,
        diluent: Option<String>,
    },
}

struct ExtraColumn {
    header: String,
    kind: ExtraKind,
}

struct HeaderMap {
    index: HashMap<String, usize>,
}

impl HeaderMap {
    fn new(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().trim_start_matches('\u{feff}').to_string(), i))
            .collect();
        Self { index }
    }

    fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// `{column}_err` and `{column}_s{n}` columns written by [`LineListWriter`].
    fn extra_columns(&self) -> Vec<ExtraColumn> {
        let mut extra: Vec<ExtraColumn> = self
            .index
            .keys()
            .filter_map(|header| {
                if let Some(base) = header.strip_suffix("_err") {
                    return Some(ExtraColumn {
                        header: header.clone(),
                        kind: ExtraKind::Uncertainty(base.to_string()),
                    });
                }
                let (base, spectrum) = split_spectrum_suffix(header)?;
                let (quantity, diluent) = parse_column(base)?;
                Some(ExtraColumn {
                    header: header.clone(),
                    kind: ExtraKind::Override {
                        spectrum,
                        quantity,
                        diluent,
                    },
                })
            })
            .collect();
        extra.sort_by(|a, b| a.header.cmp(&b.header));
        extra
    }
}

struct Row<'a> {
    record: &'a StringRecord,
    columns: &'a HeaderMap,
    line: usize,
}

impl Row<'_> {
    /// Parsed value of a column, `None` when the column is absent or the
    /// cell is empty.
    fn optional(&self, column: &str) -> Result<Option<f64>> {
        let Some(&i) = self.columns.index.get(column) else {
            return Ok(None);
        };
        match self.record.get(i).map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => text.parse::<f64>().map(Some).map_err(|_| {
                SpecFitError::Configuration(format!(
                    "line {}: column '{}' has non-numeric value '{}'",
                    self.line, column, text
                ))
            }),
        }
    }

    fn required(&self, column: &str) -> Result<f64> {
        self.optional(column)?.ok_or_else(|| {
            SpecFitError::MissingData(format!("line {}: '{}' is empty", self.line, column))
        })
    }

    /// Non-negative integer cell. `2` and `2.0` are accepted, `-1` and
    /// `2.5` are not.
    fn id<T: TryFrom<u64>>(&self, column: &str) -> Result<Option<T>> {
        let Some(value) = self.optional(column)? else {
            return Ok(None);
        };
        let invalid = || {
            SpecFitError::Configuration(format!(
                "line {}: column '{}' must be a non-negative integer, got {}",
                self.line, column, value
            ))
        };
        if !(value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64) {
            return Err(invalid());
        }
        T::try_from(value as u64).map(Some).map_err(|_| invalid())
    }

    fn required_id<T: TryFrom<u64>>(&self, column: &str) -> Result<T> {
        self.id(column)?.ok_or_else(|| {
            SpecFitError::MissingData(format!("line {}: '{}' is empty", self.line, column))
        })
    }
}

fn split_spectrum_suffix(header: &str) -> Option<(&str, u32)> {
    let (base, number) = header.rsplit_once("_s")?;
    let spectrum = number.parse().ok()?;
    Some((base, spectrum))
}

/// Inverse of [`column_name`].
fn parse_column(column: &str) -> Option<(LineQuantity, Option<String>)> {
    for quantity in [LineQuantity::Nu, LineQuantity::Sw] {
        if column == quantity.label() {
            return Some((quantity, None));
        }
    }
    let mut labels = LineQuantity::PER_DILUENT.to_vec();
    labels.sort_by_key(|q| std::cmp::Reverse(q.label().len()));
    labels.into_iter().find_map(|quantity| {
        let diluent = column.strip_prefix(quantity.label())?.strip_prefix('_')?;
        (!diluent.is_empty()).then(|| (quantity, Some(diluent.to_string())))
    })
}

/// Writes a registry back to the line-list schema, with per-spectrum
/// override columns `{column}_s{n}` and standard-error columns
/// `{column}_err`.
#[derive(Debug, Clone, Default)]
pub struct LineListWriter {
    /// Diluent columns to write. Empty means every diluent in the registry.
    pub diluents: Vec<String>,
}

impl LineListWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_path<P: AsRef<Path>>(&self, registry: &TransitionRegistry, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write(registry, file)
    }

    pub fn write<W: io::Write>(&self, registry: &TransitionRegistry, writer: W) -> Result<()> {
        let diluents: Vec<String> = if self.diluents.is_empty() {
            registry
                .iter()
                .flat_map(|t| t.params.diluents.keys().cloned())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        } else {
            self.diluents.clone()
        };
        let with_elower = registry.iter().any(|t| t.params.elower.is_some());

        let overrides: BTreeSet<(u32, LineQuantity, Option<String>)> = registry
            .iter()
            .flat_map(|t| {
                t.overrides.iter().flat_map(|(n, values)| {
                    values.keys().map(move |(q, d)| (*n, *q, d.clone()))
                })
            })
            .collect();
        let uncertainties: BTreeSet<String> = registry
            .iter()
            .flat_map(|t| t.uncertainties.keys().cloned())
            .collect();

        let mut header: Vec<String> = ["molec_id", "local_iso_id", "trans_index", "nu", "sw"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if with_elower {
            header.push("elower".to_string());
        }
        for diluent in &diluents {
            for quantity in LineQuantity::PER_DILUENT {
                header.push(column_name(quantity, Some(diluent)));
            }
        }
        for (n, quantity, diluent) in &overrides {
            header.push(format!("{}_s{}", column_name(*quantity, diluent.as_deref()), n));
        }
        for name in &uncertainties {
            header.push(format!("{}_err", name));
        }

        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&header)?;

        let cell = |v: Option<f64>| v.map(format_value).unwrap_or_default();
        for transition in registry.iter() {
            let params = &transition.params;
            let mut record = vec![
                transition.id.molecule.to_string(),
                transition.id.isotope.to_string(),
                transition.id.index.to_string(),
                format_value(params.nu),
                format_value(params.sw),
            ];
            if with_elower {
                record.push(cell(params.elower));
            }
            for diluent in &diluents {
                let coefficients = params.diluents.get(diluent);
                if coefficients.is_none() {
                    warn!("transition {} has no '{}' coefficients", transition.id, diluent);
                }
                for quantity in LineQuantity::PER_DILUENT {
                    record.push(cell(coefficients.and_then(|c| c.get(quantity))));
                }
            }
            for (n, quantity, diluent) in &overrides {
                let value = transition
                    .overrides
                    .get(n)
                    .and_then(|o| o.get(&(*quantity, diluent.clone())))
                    .copied();
                record.push(cell(value));
            }
            for name in &uncertainties {
                record.push(cell(transition.uncertainties.get(name).copied()));
            }
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Shortest round-trip text, in exponent form for very small magnitudes
/// such as intensities.
fn format_value(value: f64) -> String {
    if value != 0.0 && value.abs() < 1e-4 {
        format!("{:e}", value)
    } else {
        value.to_string()
    }
}

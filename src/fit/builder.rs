//! Construction of the fit's parameter vector from the line list, the
//! dataset and a [`FitConfig`].
//!
//! Every (spectrum, transition, quantity, diluent) slot of a simulated
//! transition is a node of a union-find. Nodes of a shared quantity are
//! merged across spectra; each resulting group becomes one entry.

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::dataset::Dataset;
use crate::error::{Result, SpecFitError};
use crate::fit::config::{FitConfig, Limit, LimitKind};
use crate::parameters::{
    Bounds, DisjointSet, EntryOrigin, LineBinding, LineSlot, LineSlotKey, ParameterEntry, ParameterLayout,
    ParameterVector, SpectrumLayout,
};
use crate::registry::{LineQuantity, TransitionId, TransitionRegistry};
use crate::spectrum::{SpectrumModel, SpectrumQuantity};

/// Builds a [`ParameterVector`] and its layout.
#[derive(Debug, Clone)]
pub struct ParameterBuilder<'a> {
    registry: &'a TransitionRegistry,
    dataset: &'a Dataset,
    config: &'a FitConfig,
}

/// One slot of one spectrum.
#[derive(Debug, Clone)]
struct Node {
    spectrum: u32,
    key: LineSlotKey,
}

impl<'a> ParameterBuilder<'a> {
    pub fn new(registry: &'a TransitionRegistry, dataset: &'a Dataset, config: &'a FitConfig) -> Self {
        Self {
            registry,
            dataset,
            config,
        }
    }

    /// Build the vector. Configuration errors are raised before any entry
    /// is created.
    pub fn build(&self) -> Result<ParameterVector> {
        self.config.validate_against(self.registry)?;
        self.check_molefraction_specs()?;

        let min_threshold = self
            .dataset
            .spectra()
            .iter()
            .map(|s| s.intensity_threshold)
            .fold(f64::INFINITY, f64::min);
        if self.config.fit_intensity < min_threshold {
            warn!(
                "fit_intensity {:e} is below the simulation threshold {:e}; transitions between them are not simulated",
                self.config.fit_intensity, min_threshold
            );
        }

        let (selections, strongest) = self.select()?;

        let mut vector = ParameterVector::new();
        let mut origins = Vec::new();
        let mut layouts = Vec::with_capacity(self.dataset.len());

        for entry in self.dataset.baselines() {
            let mut layout = SpectrumLayout {
                spectrum_number: entry.spectrum_number,
                ..Default::default()
            };
            for quantity in entry.quantities() {
                let value = entry.value(quantity).unwrap_or_default();
                let vary = self.config.vary.spectrum_quantity(quantity);
                let name = quantity.parameter_name(entry.spectrum_number);
                let (kind, limit) = self.config.limits.spectrum(quantity);
                let index = self.push(&mut vector, &name, value, vary, kind, limit)?;
                origins.push(EntryOrigin::Spectrum {
                    spectrum_number: entry.spectrum_number,
                    quantity,
                });
                match quantity {
                    SpectrumQuantity::Baseline(_) => layout.baseline.push(index),
                    SpectrumQuantity::EtalonAmplitude(_) => layout.etalons.push([index; 3]),
                    SpectrumQuantity::EtalonPeriod(_) => {
                        if let Some(e) = layout.etalons.last_mut() {
                            e[1] = index;
                        }
                    }
                    SpectrumQuantity::EtalonPhase(_) => {
                        if let Some(e) = layout.etalons.last_mut() {
                            e[2] = index;
                        }
                    }
                    SpectrumQuantity::MoleFraction(m) => {
                        layout.mole_fractions.insert(m, index);
                    }
                    SpectrumQuantity::XShift => layout.x_shift = Some(index),
                }
            }
            layouts.push(layout);
        }

        // slots of every simulated transition
        let mut nodes: Vec<Node> = Vec::new();
        let mut per_spectrum: Vec<BTreeMap<TransitionId, Vec<usize>>> = Vec::new();
        for (spectrum, selected) in self.dataset.spectra().iter().zip(&selections) {
            let mut lines = BTreeMap::new();
            for &id in selected {
                let keys = self.slot_keys(id, spectrum.diluents.names())?;
                let start = nodes.len();
                nodes.extend(keys.into_iter().map(|key| Node {
                    spectrum: spectrum.number,
                    key,
                }));
                lines.insert(id, (start..nodes.len()).collect());
            }
            per_spectrum.push(lines);
        }

        let mut groups = DisjointSet::new(nodes.len());
        let mut first_shared: HashMap<&LineSlotKey, usize> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            if self.config.constrain.is_shared(node.key.quantity) {
                match first_shared.get(&node.key) {
                    Some(&first) => groups.union(first, i),
                    None => {
                        first_shared.insert(&node.key, i);
                    }
                }
            }
        }

        let group_of = groups.groups();
        let mut entry_of_group: HashMap<usize, usize> = HashMap::new();
        let mut entry_of_node = vec![0; nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            let group = group_of[i];
            let index = match entry_of_group.get(&group) {
                Some(&index) => index,
                None => {
                    let index = self.push_line(&mut vector, node, &strongest)?;
                    let shared = self.config.constrain.is_shared(node.key.quantity);
                    origins.push(EntryOrigin::Line {
                        key: node.key.clone(),
                        spectrum: (!shared).then_some(node.spectrum),
                    });
                    entry_of_group.insert(group, index);
                    index
                }
            };
            entry_of_node[i] = index;
        }

        for (layout, lines) in layouts.iter_mut().zip(per_spectrum) {
            layout.lines = lines
                .into_iter()
                .map(|(id, node_ids)| LineBinding {
                    id,
                    slots: node_ids
                        .into_iter()
                        .map(|i| LineSlot {
                            quantity: nodes[i].key.quantity,
                            diluent: nodes[i].key.diluent.clone(),
                            entry: entry_of_node[i],
                        })
                        .collect(),
                })
                .collect();
        }

        debug!(
            "parameter vector: {} entries, {} varying, {} line groups",
            vector.len(),
            vector.varying_count(),
            entry_of_group.len()
        );
        vector.set_layout(ParameterLayout::new(layouts, origins));
        Ok(vector)
    }

    fn check_molefraction_specs(&self) -> Result<()> {
        let molecules = self.dataset.molecules();
        for molecule in self.config.vary.molefraction.keys() {
            if !molecules.contains(molecule) {
                return Err(SpecFitError::Configuration(format!(
                    "mole fraction vary spec names molecule {}, which no spectrum contains",
                    molecule
                )));
            }
        }
        Ok(())
    }

    /// Selected transitions per spectrum, and the strongest resolved
    /// intensity of each selected transition over all spectra.
    fn select(&self) -> Result<(Vec<Vec<TransitionId>>, HashMap<TransitionId, f64>)> {
        let shape = self.config.line_shape();
        let mut strongest: HashMap<TransitionId, f64> = HashMap::new();
        let mut selections = Vec::with_capacity(self.dataset.len());
        for spectrum in self.dataset.spectra() {
            let model = SpectrumModel::new(self.registry, spectrum, &shape);
            let selected = model.select()?;
            for t in &selected {
                let s = strongest.entry(t.id).or_insert(t.intensity);
                *s = s.max(t.intensity);
            }
            selections.push(selected.into_iter().map(|t| t.id).collect());
        }
        Ok((selections, strongest))
    }

    /// `nu`, `sw` and every per-diluent quantity of each diluent the
    /// transition uses in this spectrum's mix. A diluent without its own
    /// coefficients maps to `air`.
    fn slot_keys<'d>(&self, id: TransitionId, diluents: impl Iterator<Item = &'d str>) -> Result<Vec<LineSlotKey>> {
        let transition = self.registry.get(id)?;
        let mut effective = BTreeSet::new();
        for name in diluents {
            let used = transition.params.effective_diluent(name).ok_or_else(|| {
                SpecFitError::MissingData(format!(
                    "transition {} has no coefficients for diluent '{}' or air",
                    id, name
                ))
            })?;
            effective.insert(used.to_string());
        }

        let mut keys = vec![
            LineSlotKey::new(id, LineQuantity::Nu, None),
            LineSlotKey::new(id, LineQuantity::Sw, None),
        ];
        for diluent in &effective {
            for quantity in LineQuantity::PER_DILUENT {
                keys.push(LineSlotKey::new(id, quantity, Some(diluent)));
            }
        }
        Ok(keys)
    }

    fn push_line(&self, vector: &mut ParameterVector, node: &Node, strongest: &HashMap<TransitionId, f64>) -> Result<usize> {
        let key = &node.key;
        let id = key.transition;
        let transition = self.registry.get(id)?;
        let shared = self.config.constrain.is_shared(key.quantity);

        let (name, value) = if shared {
            (key.parameter_name(), transition.params.get(key.quantity, key.diluent.as_deref()))
        } else {
            (
                format!("{}_s{}", key.parameter_name(), node.spectrum),
                transition.value_for(key.quantity, key.diluent.as_deref(), Some(node.spectrum)),
            )
        };
        let value = value.ok_or_else(|| {
            SpecFitError::MissingData(format!("transition {} has no value for {}", id, key.parameter_name()))
        })?;

        let relevant = strongest.get(&id).map_or(false, |&s| s >= self.config.fit_intensity);
        let vary = relevant
            && self.config.uses(key.quantity)
            && self
                .config
                .vary
                .line_spec(key.quantity)
                .map_or(false, |spec| spec.is_varied(id));

        let (kind, limit) = self.config.limits.line(key.quantity);
        self.push(vector, &name, value, vary, kind, limit)
    }

    fn push(
        &self,
        vector: &mut ParameterVector,
        name: &str,
        value: f64,
        vary: bool,
        kind: LimitKind,
        limit: &Limit,
    ) -> Result<usize> {
        let mut entry = ParameterEntry::new(name, value);
        entry.set_vary(vary)?;
        if vary && limit.enabled {
            match limit.bounds(kind, value) {
                Some(bounds) => entry.set_bounds(bounds),
                None => {
                    warn!("{} starts at 0; multiplicative limit left unbounded", name);
                    entry.set_bounds(Bounds::unbounded());
                }
            }
        }
        Ok(vector.add(entry)?)
    }
}

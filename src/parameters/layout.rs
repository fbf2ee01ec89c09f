//! Mapping between parameter-vector entries and the physical quantities
//! they stand for.
//!
//! A layout is produced once when a fit's parameter vector is built and is
//! shared (behind an `Arc`) by every clone of that vector. It records, per
//! spectrum, which transitions are simulated and which entry feeds each of
//! their quantities, and, per entry, where its value is written back after
//! the fit.

use std::collections::{BTreeMap, HashMap};

use crate::registry::{LineQuantity, TransitionId};
use crate::spectrum::SpectrumQuantity;

/// One per-transition quantity, optionally for a diluent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineSlotKey {
    pub transition: TransitionId,
    pub quantity: LineQuantity,
    pub diluent: Option<String>,
}

impl LineSlotKey {
    pub fn new(transition: TransitionId, quantity: LineQuantity, diluent: Option<&str>) -> Self {
        Self {
            transition,
            quantity,
            diluent: diluent.map(str::to_string),
        }
    }

    /// `{label}[_{diluent}]_{mol}_{iso}_{index}`
    pub fn parameter_name(&self) -> String {
        match &self.diluent {
            Some(d) => format!("{}_{}_{}", self.quantity.label(), d, self.transition),
            None => format!("{}_{}", self.quantity.label(), self.transition),
        }
    }
}

/// An entry feeding one quantity of a simulated transition.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSlot {
    pub quantity: LineQuantity,
    pub diluent: Option<String>,
    pub entry: usize,
}

/// A transition simulated in one spectrum, with the entries feeding it.
#[derive(Debug, Clone, PartialEq)]
pub struct LineBinding {
    pub id: TransitionId,
    pub slots: Vec<LineSlot>,
}

/// Entries used by one spectrum.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectrumLayout {
    pub spectrum_number: u32,
    pub lines: Vec<LineBinding>,
    /// Polynomial coefficients, constant term first.
    pub baseline: Vec<usize>,
    /// `[amplitude, period, phase]` per etalon.
    pub etalons: Vec<[usize; 3]>,
    pub mole_fractions: BTreeMap<u32, usize>,
    pub x_shift: Option<usize>,
}

/// Where an entry's fitted value belongs.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOrigin {
    /// A line quantity. `spectrum` is `None` for an entry shared by all
    /// spectra and `Some(n)` for spectrum `n`'s own copy.
    Line {
        key: LineSlotKey,
        spectrum: Option<u32>,
    },
    Spectrum {
        spectrum_number: u32,
        quantity: SpectrumQuantity,
    },
}

/// Entry-to-quantity map of a built parameter vector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterLayout {
    spectra: Vec<SpectrumLayout>,
    origins: Vec<EntryOrigin>,
}

impl ParameterLayout {
    pub fn new(spectra: Vec<SpectrumLayout>, origins: Vec<EntryOrigin>) -> Self {
        Self { spectra, origins }
    }

    pub fn spectra(&self) -> &[SpectrumLayout] {
        &self.spectra
    }

    pub fn spectrum(&self, number: u32) -> Option<&SpectrumLayout> {
        self.spectra.iter().find(|s| s.spectrum_number == number)
    }

    /// Origin of entry `index`. Entries added after the build (e.g. helper
    /// entries for expressions) have none.
    pub fn origin(&self, index: usize) -> Option<&EntryOrigin> {
        self.origins.get(index)
    }

    pub fn origins(&self) -> &[EntryOrigin] {
        &self.origins
    }
}

/// Union-find over dense `usize` nodes.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    pub fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // path compression
        let mut current = node;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    /// Group id per node, numbered densely in order of first appearance.
    pub fn groups(&mut self) -> Vec<usize> {
        let mut ids: HashMap<usize, usize> = HashMap::new();
        (0..self.parent.len())
            .map(|node| {
                let root = self.find(node);
                let next = ids.len();
                *ids.entry(root).or_insert(next)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_names() {
        let id = TransitionId::new(7, 1, 3);
        assert_eq!(
            LineSlotKey::new(id, LineQuantity::SdGamma, Some("air")).parameter_name(),
            "SD_gamma_air_7_1_3"
        );
        assert_eq!(
            LineSlotKey::new(id, LineQuantity::Nu, None).parameter_name(),
            "nu_7_1_3"
        );
    }

    #[test]
    fn test_disjoint_set_groups() {
        let mut set = DisjointSet::new(6);
        set.union(0, 3);
        set.union(3, 5);
        set.union(1, 4);
        assert_eq!(set.find(5), set.find(0));
        assert_ne!(set.find(1), set.find(0));
        assert_eq!(set.groups(), vec![0, 1, 2, 0, 1, 0]);
    }

    #[test]
    fn test_layout_lookup() {
        let layout = ParameterLayout::new(
            vec![SpectrumLayout {
                spectrum_number: 4,
                ..Default::default()
            }],
            vec![],
        );
        assert!(layout.spectrum(4).is_some());
        assert!(layout.spectrum(1).is_none());
        assert!(layout.origin(0).is_none());
    }
}

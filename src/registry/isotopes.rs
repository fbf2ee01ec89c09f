//! Isotopologue masses, natural abundances and partition-function exponents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, SpecFitError};

/// Per-isotopologue physical data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsotopeInfo {
    /// Molecular mass in atomic mass units.
    pub mass: f64,
    /// Terrestrial natural abundance.
    pub abundance: f64,
    /// Exponent q of the partition function model `Q(T) ∝ T^q`.
    /// 1 for linear molecules, 1.5 for non-linear ones.
    pub q_exponent: f64,
}

impl IsotopeInfo {
    pub fn new(mass: f64, abundance: f64, q_exponent: f64) -> Self {
        Self {
            mass,
            abundance,
            q_exponent,
        }
    }
}

const LINEAR: f64 = 1.0;
const NON_LINEAR: f64 = 1.5;

// (molecule, isotope, abundance, mass, q)
const BUILTIN: &[(u32, u32, f64, f64, f64)] = &[
    (1, 1, 0.997317, 18.010565, NON_LINEAR),
    (1, 2, 0.002000, 20.014811, NON_LINEAR),
    (1, 3, 3.718840e-4, 19.014780, NON_LINEAR),
    (1, 4, 3.106930e-4, 19.016740, NON_LINEAR),
    (2, 1, 0.984204, 43.989830, LINEAR),
    (2, 2, 0.011057, 44.993185, LINEAR),
    (2, 3, 0.003947, 45.994076, LINEAR),
    (4, 1, 0.990333, 44.001062, LINEAR),
    (5, 1, 0.986544, 27.994915, LINEAR),
    (5, 2, 0.011084, 28.998270, LINEAR),
    (6, 1, 0.988274, 16.031300, NON_LINEAR),
    (6, 2, 0.011103, 17.034655, NON_LINEAR),
    (7, 1, 0.995262, 31.989830, LINEAR),
    (7, 2, 0.003991, 33.994076, LINEAR),
    (7, 3, 7.422350e-4, 32.994045, LINEAR),
];

/// HITRAN molecule names for the built-in molecule ids.
pub fn molecule_name(molecule: u32) -> Option<&'static str> {
    match molecule {
        1 => Some("H2O"),
        2 => Some("CO2"),
        4 => Some("N2O"),
        5 => Some("CO"),
        6 => Some("CH4"),
        7 => Some("O2"),
        _ => None,
    }
}

/// Lookup table keyed by `(molecule, isotope)`.
#[derive(Debug, Clone, PartialEq)]
pub struct IsotopeTable {
    entries: BTreeMap<(u32, u32), IsotopeInfo>,
}

impl Default for IsotopeTable {
    fn default() -> Self {
        Self::hitran()
    }
}

impl IsotopeTable {
    /// An empty table.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// The built-in HITRAN isotopologue values.
    pub fn hitran() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|&(mol, iso, abundance, mass, q)| ((mol, iso), IsotopeInfo::new(mass, abundance, q)))
            .collect();
        Self { entries }
    }

    /// Add or replace an isotopologue.
    pub fn insert(&mut self, molecule: u32, isotope: u32, info: IsotopeInfo) -> Option<IsotopeInfo> {
        self.entries.insert((molecule, isotope), info)
    }

    pub fn get(&self, molecule: u32, isotope: u32) -> Result<&IsotopeInfo> {
        self.entries.get(&(molecule, isotope)).ok_or_else(|| {
            SpecFitError::MissingData(format!(
                "no isotope data for molecule {} isotope {}",
                molecule, isotope
            ))
        })
    }

    pub fn contains(&self, molecule: u32, isotope: u32) -> bool {
        self.entries.contains_key(&(molecule, isotope))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

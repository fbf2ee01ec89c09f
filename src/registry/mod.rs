//! The line list: transitions indexed by molecule, isotope and transition
//! index, plus the isotope data needed to resolve them.

pub mod columns;
pub mod isotopes;
pub mod transition;

pub use columns::{FallbackPolicy, FallbackSource, LineListReader, LineListWriter};
pub use isotopes::{molecule_name, IsotopeInfo, IsotopeTable};
pub use transition::{
    column_name, DiluentCoefficients, LineParameters, LineQuantity, QuantityKey, ResolvedDiluent,
    ResolvedTransition, Transition, TransitionId,
};

use std::collections::{BTreeMap, BTreeSet};

use crate::constants::REFERENCE_TEMPERATURE;
use crate::error::{Result, SpecFitError};

/// Ordered collection of transitions.
///
/// Iteration order is the `(molecule, isotope, index)` order, which fixes
/// the layout of any parameter vector built from the registry.
#[derive(Debug, Clone)]
pub struct TransitionRegistry {
    transitions: BTreeMap<TransitionId, Transition>,
    isotopes: IsotopeTable,
    reference_temperature: f64,
}

impl Default for TransitionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionRegistry {
    /// Empty registry with the built-in isotope table and a 296 K reference.
    pub fn new() -> Self {
        Self::with_isotopes(IsotopeTable::default())
    }

    pub fn with_isotopes(isotopes: IsotopeTable) -> Self {
        Self {
            transitions: BTreeMap::new(),
            isotopes,
            reference_temperature: REFERENCE_TEMPERATURE,
        }
    }

    pub fn with_reference_temperature(mut self, temperature: f64) -> Self {
        self.reference_temperature = temperature;
        self
    }

    pub fn reference_temperature(&self) -> f64 {
        self.reference_temperature
    }

    pub fn isotopes(&self) -> &IsotopeTable {
        &self.isotopes
    }

    pub fn isotopes_mut(&mut self) -> &mut IsotopeTable {
        &mut self.isotopes
    }

    /// Add a transition. Duplicate ids are rejected.
    pub fn insert(&mut self, transition: Transition) -> Result<()> {
        let id = transition.id;
        if self.transitions.contains_key(&id) {
            return Err(SpecFitError::Configuration(format!(
                "duplicate transition {}",
                id
            )));
        }
        self.transitions.insert(id, transition);
        Ok(())
    }

    pub fn get(&self, id: TransitionId) -> Result<&Transition> {
        self.transitions.get(&id).ok_or(SpecFitError::MissingTransition {
            molecule: id.molecule,
            isotope: id.isotope,
            index: id.index,
        })
    }

    pub fn get_mut(&mut self, id: TransitionId) -> Result<&mut Transition> {
        self.transitions.get_mut(&id).ok_or(SpecFitError::MissingTransition {
            molecule: id.molecule,
            isotope: id.isotope,
            index: id.index,
        })
    }

    pub fn contains(&self, id: TransitionId) -> bool {
        self.transitions.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Molecule ids present in the registry.
    pub fn molecules(&self) -> BTreeSet<u32> {
        self.transitions.keys().map(|id| id.molecule).collect()
    }

    pub fn has_isotope(&self, molecule: u32, isotope: u32) -> bool {
        self.transitions
            .keys()
            .any(|id| id.molecule == molecule && id.isotope == isotope)
    }

    /// Resolve a transition at temperature `temperature` (K) with natural
    /// abundance applied and no per-spectrum overrides.
    pub fn resolve(&self, molecule: u32, isotope: u32, index: usize, temperature: f64) -> Result<ResolvedTransition> {
        self.resolve_with(TransitionId::new(molecule, isotope, index), temperature, true, None)
    }

    /// Resolve a transition as one spectrum sees it.
    pub fn resolve_with(
        &self,
        id: TransitionId,
        temperature: f64,
        natural_abundance: bool,
        spectrum: Option<u32>,
    ) -> Result<ResolvedTransition> {
        let transition = self.get(id)?;
        let params = transition.params_for(spectrum);
        self.resolve_params(transition, &params, temperature, natural_abundance)
    }

    /// Resolve explicit parameter values for `transition`. Used by the
    /// spectrum model with values taken from a parameter vector.
    pub fn resolve_params(
        &self,
        transition: &Transition,
        params: &LineParameters,
        temperature: f64,
        natural_abundance: bool,
    ) -> Result<ResolvedTransition> {
        let isotope = self.isotopes.get(transition.id.molecule, transition.id.isotope)?;
        Ok(params.resolve(
            transition.id,
            temperature,
            self.reference_temperature,
            isotope,
            natural_abundance,
            transition.abundance_weighted,
        ))
    }
}

//! The flattened, named parameter vector handed to the solver.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, SpecFitError};
use crate::parameters::bounds::Bounds;
use crate::parameters::expression::{EvaluationContext, Expression, ExpressionError};
use crate::parameters::layout::ParameterLayout;
use crate::parameters::parameter::{ParameterEntry, ParameterError};

#[derive(Debug, Clone)]
struct CompiledExpression {
    target: usize,
    expr: Expression,
}

/// Ordered collection of [`ParameterEntry`] values with name lookup,
/// expression links and the [`ParameterLayout`] that ties entries to
/// spectral quantities.
///
/// Clones share the layout and the compiled expressions, so a clone per
/// residual evaluation only copies the entries.
#[derive(Debug, Clone, Default)]
pub struct ParameterVector {
    entries: Vec<ParameterEntry>,
    index: HashMap<String, usize>,
    layout: Arc<ParameterLayout>,
    // Expression entries in dependency order; `None` until first resolved
    // after a change.
    compiled: Option<Arc<Vec<CompiledExpression>>>,
}

#[derive(Serialize)]
struct SavedEntries<'a> {
    entries: &'a [ParameterEntry],
}

#[derive(Deserialize)]
struct LoadedEntries {
    entries: Vec<ParameterEntry>,
}

impl ParameterVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_layout(&mut self, layout: ParameterLayout) {
        self.layout = Arc::new(layout);
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    /// Append an entry and return its index.
    pub fn add(&mut self, entry: ParameterEntry) -> std::result::Result<usize, ParameterError> {
        if self.index.contains_key(entry.name()) {
            return Err(ParameterError::DuplicateName {
                name: entry.name().to_string(),
            });
        }
        if let Some(expr) = entry.expr() {
            Expression::parse(expr).map_err(|e| ParameterError::ExpressionEvaluation {
                name: entry.name().to_string(),
                message: e.to_string(),
            })?;
            self.compiled = None;
        }
        let position = self.entries.len();
        self.index.insert(entry.name().to_string(), position);
        self.entries.push(entry);
        Ok(position)
    }

    /// Append a varying, unbounded entry.
    pub fn add_param(&mut self, name: &str, value: f64) -> std::result::Result<usize, ParameterError> {
        self.add(ParameterEntry::new(name, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ParameterEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&ParameterEntry> {
        self.entries.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterEntry> {
        self.index_of(name).map(|i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn position(&self, name: &str) -> std::result::Result<usize, ParameterError> {
        self.index_of(name).ok_or_else(|| ParameterError::ParameterNotFound {
            name: name.to_string(),
        })
    }

    /// Current value of `name`.
    pub fn value(&self, name: &str) -> std::result::Result<f64, ParameterError> {
        Ok(self.entries[self.position(name)?].value())
    }

    /// Current value of entry `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; layout indices are always valid.
    pub fn value_at(&self, index: usize) -> f64 {
        self.entries[index].value()
    }

    /// Set the value of `name`. Values outside the entry's bounds are rejected.
    pub fn set(&mut self, name: &str, value: f64) -> std::result::Result<(), ParameterError> {
        let position = self.position(name)?;
        self.entries[position].set_value(value)
    }

    pub fn set_vary(&mut self, name: &str, vary: bool) -> std::result::Result<(), ParameterError> {
        let position = self.position(name)?;
        self.entries[position].set_vary(vary)
    }

    /// Replace the bounds of `name`. The current value is left untouched.
    pub fn set_bounds(&mut self, name: &str, bounds: Bounds) -> std::result::Result<(), ParameterError> {
        let position = self.position(name)?;
        self.entries[position].set_bounds(bounds);
        Ok(())
    }

    /// Link `name` to an expression over other entries, or remove its link.
    /// A linked entry is fixed.
    pub fn set_expr(&mut self, name: &str, expr: Option<&str>) -> std::result::Result<(), ParameterError> {
        let position = self.position(name)?;
        if let Some(text) = expr {
            Expression::parse(text).map_err(|e| ParameterError::ExpressionEvaluation {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        }
        self.entries[position].set_expr(expr);
        self.compiled = None;
        Ok(())
    }

    pub(crate) fn set_value_unchecked(&mut self, index: usize, value: f64) {
        self.entries[index].set_value_unchecked(value);
    }

    pub(crate) fn set_stderr_at(&mut self, index: usize, stderr: Option<f64>) {
        self.entries[index].set_stderr(stderr);
    }

    fn compile(&self) -> std::result::Result<Vec<CompiledExpression>, ParameterError> {
        let mut parsed: HashMap<usize, Expression> = HashMap::new();
        for (i, entry) in self.entries.iter().enumerate() {
            let Some(text) = entry.expr() else { continue };
            let expr = Expression::parse(text).map_err(|e| ParameterError::ExpressionEvaluation {
                name: entry.name().to_string(),
                message: e.to_string(),
            })?;
            for var in expr.variables() {
                if !self.index.contains_key(&var) {
                    return Err(ParameterError::ParameterNotFound { name: var });
                }
            }
            parsed.insert(i, expr);
        }

        // depth-first topological sort; 1 = on the stack, 2 = done
        fn visit(
            node: usize,
            vector: &ParameterVector,
            parsed: &HashMap<usize, Expression>,
            state: &mut [u8],
            order: &mut Vec<usize>,
        ) -> std::result::Result<(), ParameterError> {
            match state[node] {
                2 => return Ok(()),
                1 => {
                    return Err(ParameterError::CircularDependency {
                        name: vector.entries[node].name().to_string(),
                    })
                }
                _ => {}
            }
            state[node] = 1;
            if let Some(expr) = parsed.get(&node) {
                for var in expr.variables() {
                    let dependency = vector.index[&var];
                    if parsed.contains_key(&dependency) {
                        visit(dependency, vector, parsed, state, order)?;
                    }
                }
                order.push(node);
            }
            state[node] = 2;
            Ok(())
        }

        let mut state = vec![0u8; self.entries.len()];
        let mut order = Vec::with_capacity(parsed.len());
        let mut roots: Vec<usize> = parsed.keys().copied().collect();
        roots.sort_unstable();
        for root in roots {
            visit(root, self, &parsed, &mut state, &mut order)?;
        }

        Ok(order
            .into_iter()
            .filter_map(|target| parsed.remove(&target).map(|expr| CompiledExpression { target, expr }))
            .collect())
    }

    /// Recompute every expression-linked entry from its targets, in
    /// dependency order. Calling it twice in a row changes nothing.
    pub fn resolve_expressions(&mut self) -> std::result::Result<(), ParameterError> {
        let compiled = match &self.compiled {
            Some(compiled) => Arc::clone(compiled),
            None => {
                let compiled = Arc::new(self.compile()?);
                self.compiled = Some(Arc::clone(&compiled));
                compiled
            }
        };

        for link in compiled.iter() {
            let value = link
                .expr
                .evaluate(&*self)
                .map_err(|e| ParameterError::ExpressionEvaluation {
                    name: self.entries[link.target].name().to_string(),
                    message: e.to_string(),
                })?;
            self.entries[link.target].set_value_unchecked(value);
        }
        Ok(())
    }

    /// Indices of the entries the solver varies.
    pub fn varying_indices(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.vary() && e.expr().is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn varying_names(&self) -> Vec<String> {
        self.varying_indices()
            .into_iter()
            .map(|i| self.entries[i].name().to_string())
            .collect()
    }

    pub fn varying_count(&self) -> usize {
        self.varying_indices().len()
    }

    /// External values of the varying entries.
    pub fn varying_values(&self) -> Array1<f64> {
        self.varying_indices()
            .into_iter()
            .map(|i| self.entries[i].value())
            .collect()
    }

    /// Varying entries in internal (unbounded) coordinates.
    pub fn varying_internal_values(&self) -> std::result::Result<Array1<f64>, ParameterError> {
        self.varying_indices()
            .into_iter()
            .map(|i| self.entries[i].to_internal())
            .collect()
    }

    /// Set the varying entries from internal coordinates and re-resolve the
    /// expression links.
    pub fn update_from_internal(&mut self, internal: &Array1<f64>) -> Result<()> {
        let varying = self.varying_indices();
        if varying.len() != internal.len() {
            return Err(SpecFitError::DimensionMismatch(format!(
                "expected {} internal values, got {}",
                varying.len(),
                internal.len()
            )));
        }
        for (&i, &x) in varying.iter().zip(internal.iter()) {
            let external = self.entries[i].from_internal(x);
            self.entries[i].set_value_unchecked(external);
        }
        self.resolve_expressions()?;
        Ok(())
    }

    /// Set the varying entries to external values directly, without bounds
    /// checks, and re-resolve the expression links.
    pub fn update_from_external(&mut self, external: &Array1<f64>) -> Result<()> {
        let varying = self.varying_indices();
        if varying.len() != external.len() {
            return Err(SpecFitError::DimensionMismatch(format!(
                "expected {} values, got {}",
                varying.len(),
                external.len()
            )));
        }
        for (&i, &x) in varying.iter().zip(external.iter()) {
            self.entries[i].set_value_unchecked(x);
        }
        self.resolve_expressions()?;
        Ok(())
    }

    /// Fail on the first varying entry that lies outside its bounds.
    pub fn validate_bounds(&self) -> std::result::Result<(), ParameterError> {
        for i in self.varying_indices() {
            let entry = &self.entries[i];
            if !entry.bounds().is_within_bounds(entry.value()) {
                return Err(ParameterError::OutOfBounds {
                    name: entry.name().to_string(),
                    value: entry.value(),
                    min: entry.min(),
                    max: entry.max(),
                });
            }
        }
        Ok(())
    }

    /// Copy value, vary flag, bounds and expression from every entry of
    /// `saved` whose name exists here. Returns the number of entries copied.
    ///
    /// A saved entry that is both linked and varying is rejected with
    /// [`ParameterError::ExpressionAndVary`]; entries before it are already
    /// copied.
    pub fn apply_saved(&mut self, saved: &ParameterVector) -> std::result::Result<usize, ParameterError> {
        self.compiled = None;
        let mut copied = 0;
        for entry in saved.entries() {
            if let Some(i) = self.index_of(entry.name()) {
                let target = &mut self.entries[i];
                target.set_expr(entry.expr());
                target.set_bounds(*entry.bounds());
                target.set_value_unchecked(entry.value());
                target.set_vary(entry.vary())?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&SavedEntries {
            entries: &self.entries,
        })?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(
            file,
            &SavedEntries {
                entries: &self.entries,
            },
        )?;
        Ok(())
    }

    /// Load entries saved with [`to_json`](Self::to_json). The result has no
    /// layout; use [`apply_saved`](Self::apply_saved) to carry the values into
    /// a freshly built vector.
    pub fn from_json(json: &str) -> Result<Self> {
        let loaded: LoadedEntries = serde_json::from_str(json)?;
        let mut vector = Self::new();
        for entry in loaded.entries {
            vector.add(entry)?;
        }
        Ok(vector)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

impl EvaluationContext for ParameterVector {
    fn get_variable(&self, name: &str) -> std::result::Result<f64, ExpressionError> {
        self.index_of(name)
            .map(|i| self.entries[i].value())
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains(name)
    }
}

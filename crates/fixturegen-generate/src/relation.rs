use std::collections::BTreeMap;

use rand::{Rng, RngCore};

use fixturegen_core::{DefinitionSet, FieldValue};

use crate::errors::GenerationError;
use crate::store::StoreMap;
use crate::template::FieldMap;

/// Row-scoped record of which instance each relation chose, plus the field
/// values accumulated so far. Shared by a base row and its localized
/// siblings, then discarded.
#[derive(Debug, Default)]
pub struct RowBinding {
    relations: BTreeMap<String, String>,
    pub fields: FieldMap,
}

impl RowBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instance id bound for a target type, if any column fixed one.
    pub fn bound(&self, target: &str) -> Option<&str> {
        self.relations.get(target).map(String::as_str)
    }

    pub fn bind(&mut self, target: &str, id: String) {
        self.relations.insert(target.to_string(), id);
    }

    pub fn bound_targets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.relations
            .iter()
            .map(|(target, id)| (target.as_str(), id.as_str()))
    }

    pub fn set_field(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }
}

/// Relation resolution request for one column.
#[derive(Debug)]
pub struct RelationRequest<'a> {
    pub entity: &'a str,
    pub field: &'a str,
    pub target: &'a str,
    pub nullable: bool,
    pub conditions: &'a BTreeMap<String, String>,
}

/// Chooses concrete reference values for relation columns.
///
/// Resolution order is the core consistency rule: literal row context beats
/// derived consistency beats free random choice, so correlated relations on
/// one row never drift apart.
pub struct RelationResolver<'a> {
    definitions: &'a DefinitionSet,
    stores: &'a StoreMap,
}

impl<'a> RelationResolver<'a> {
    pub fn new(definitions: &'a DefinitionSet, stores: &'a StoreMap) -> Self {
        Self {
            definitions,
            stores,
        }
    }

    pub fn resolve(
        &self,
        request: &RelationRequest<'_>,
        binding: &mut RowBinding,
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        // Absent relation: sentinel value, and the target stays unbound so
        // sibling columns are free to choose their own instance.
        if request.nullable && rng.random_bool(0.5) {
            return Ok(FieldValue::Int(0));
        }

        // An ancestor relation already fixed an instance for this row.
        if let Some(id) = binding.bound(request.target) {
            let value = self
                .stores
                .get(request.target)
                .and_then(|store| store.get(id))
                .map(|instance| instance.id.clone())
                .unwrap_or_else(|| FieldValue::Text(id.to_string()));
            return Ok(value);
        }

        if let Some(value) = self.derive_from_siblings(request, binding) {
            binding.bind(request.target, value.render());
            return Ok(value);
        }

        let store = self.stores.get(request.target).ok_or_else(|| {
            GenerationError::Configuration(format!(
                "no instance store for relation target '{}'",
                request.target
            ))
        })?;

        let instance = if request.conditions.is_empty() {
            store.sample_random(rng).ok_or_else(|| empty(request))?
        } else if store.is_empty() {
            return Err(empty(request));
        } else {
            store
                .sample_where(request.conditions, rng)
                .ok_or_else(|| GenerationError::UnsatisfiableRelation {
                    entity: request.entity.to_string(),
                    field: request.field.to_string(),
                    target: request.target.to_string(),
                })?
        };

        binding.bind(request.target, instance.key());
        Ok(instance.id.clone())
    }

    /// Dependency-aware selection: when a sibling relation's type itself
    /// references the requested target, reuse the value that sibling's
    /// chosen instance already carries instead of sampling.
    fn derive_from_siblings(
        &self,
        request: &RelationRequest<'_>,
        binding: &RowBinding,
    ) -> Option<FieldValue> {
        for (bound_target, bound_id) in binding.bound_targets() {
            if bound_target == request.target {
                continue;
            }
            let Some(sibling_def) = self.definitions.get(bound_target) else {
                continue;
            };
            let Some(column) = sibling_def.relation_column_targeting(request.target) else {
                continue;
            };
            let Some(sibling) = self
                .stores
                .get(bound_target)
                .and_then(|store| store.get(bound_id))
            else {
                continue;
            };
            let Some(value) = sibling.get(column) else {
                continue;
            };
            // The sibling's own relation was absent; nothing to derive.
            if value.is_empty() || value.as_i64() == Some(0) {
                continue;
            }
            return Some(value.clone());
        }
        None
    }
}

fn empty(request: &RelationRequest<'_>) -> GenerationError {
    GenerationError::EmptyRelation {
        entity: request.entity.to_string(),
        relation: request.target.to_string(),
    }
}

/// One axis of a composite-key enumeration: the instance ids of a primary
/// relation column's target, with `None` as the absent element of a
/// nullable axis.
#[derive(Debug, Clone)]
pub struct ProductAxis {
    pub column: String,
    pub target: String,
    pub ids: Vec<Option<String>>,
}

/// Explicit Cartesian-product iterator over composite-key relation axes.
/// Junction rows are enumerated, not sampled, so dependent lookup tables
/// are populated deterministically.
#[derive(Debug)]
pub struct RelationProduct {
    axes: Vec<ProductAxis>,
    cursor: Vec<usize>,
    done: bool,
}

impl RelationProduct {
    pub fn new(axes: Vec<ProductAxis>) -> Self {
        let done = axes.is_empty() || axes.iter().any(|axis| axis.ids.is_empty());
        let cursor = vec![0; axes.len()];
        Self { axes, cursor, done }
    }
}

impl Iterator for RelationProduct {
    /// (column, target, chosen id) per axis.
    type Item = Vec<(String, String, Option<String>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let combination = self
            .axes
            .iter()
            .zip(&self.cursor)
            .map(|(axis, &index)| {
                (
                    axis.column.clone(),
                    axis.target.clone(),
                    axis.ids[index].clone(),
                )
            })
            .collect();

        for position in (0..self.cursor.len()).rev() {
            self.cursor[position] += 1;
            if self.cursor[position] < self.axes[position].ids.len() {
                return Some(combination);
            }
            self.cursor[position] = 0;
        }
        self.done = true;
        Some(combination)
    }
}

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use rand::{Rng, RngCore};

use fixturegen_core::FieldValue;

use crate::errors::GenerationError;

/// One concrete generated (or seeded) record of an entity type. Owned by its
/// store and never mutated after creation.
#[derive(Debug, Clone)]
pub struct Instance {
    pub entity: String,
    pub id: FieldValue,
    /// Resolved values in emission order.
    pub fields: Vec<(String, FieldValue)>,
    /// Hidden instances join relation sampling but are never emitted.
    pub hidden: bool,
}

impl Instance {
    /// String form of the identifier, used as the store key.
    pub fn key(&self) -> String {
        self.id.render()
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

/// Per-entity-type stores, keyed by entity name.
pub type StoreMap = BTreeMap<String, InstanceStore>;

type ConditionIndex = HashMap<String, HashMap<String, Vec<String>>>;

/// Append-only collection of instances for one entity type. Insertion order
/// is preserved for deterministic output; a (column -> value -> ids) index
/// is built lazily to answer conditioned samples.
#[derive(Debug)]
pub struct InstanceStore {
    entity: String,
    order: Vec<String>,
    instances: HashMap<String, Instance>,
    index: RefCell<Option<ConditionIndex>>,
}

impl InstanceStore {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            order: Vec::new(),
            instances: HashMap::new(),
            index: RefCell::new(None),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Populate initial instances from hand-authored data. Applied once,
    /// before any generation for this type.
    pub fn seed(&mut self, instances: Vec<Instance>) -> Result<(), GenerationError> {
        for instance in instances {
            self.add(instance)?;
        }
        Ok(())
    }

    /// Append an instance. Identifiers are unique per entity type.
    pub fn add(&mut self, instance: Instance) -> Result<(), GenerationError> {
        let key = instance.key();
        if self.instances.contains_key(&key) {
            return Err(GenerationError::DuplicateId {
                entity: self.entity.clone(),
                id: key,
            });
        }
        if let Some(index) = self.index.borrow_mut().as_mut() {
            index_instance(index, &key, &instance);
        }
        self.order.push(key.clone());
        self.instances.insert(key, instance);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Instance> {
        self.instances.get(id)
    }

    /// Instance ids in insertion order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// All instances in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &Instance> {
        self.order.iter().filter_map(|id| self.instances.get(id))
    }

    /// Consume the store, yielding emitted instances in insertion order.
    /// Hidden instances stay behind; they only ever served sampling.
    pub fn into_emitted(mut self) -> Vec<Instance> {
        let mut emitted = Vec::with_capacity(self.order.len());
        for id in &self.order {
            if let Some(instance) = self.instances.remove(id)
                && !instance.hidden
            {
                emitted.push(instance);
            }
        }
        emitted
    }

    /// Uniform sample over all current instances, seeds included.
    pub fn sample_random(&self, rng: &mut dyn RngCore) -> Option<&Instance> {
        if self.order.is_empty() {
            return None;
        }
        let id = &self.order[rng.random_range(0..self.order.len())];
        self.instances.get(id)
    }

    /// Uniform sample over instances whose fields exactly match every
    /// condition.
    pub fn sample_where(
        &self,
        conditions: &BTreeMap<String, String>,
        rng: &mut dyn RngCore,
    ) -> Option<&Instance> {
        let mut candidates: Option<Vec<String>> = None;
        {
            let mut cache = self.index.borrow_mut();
            let index = cache.get_or_insert_with(|| self.build_index());
            for (column, expected) in conditions {
                let ids = index
                    .get(column)
                    .and_then(|values| values.get(expected))
                    .cloned()
                    .unwrap_or_default();
                candidates = Some(match candidates {
                    None => ids,
                    Some(current) => current.into_iter().filter(|id| ids.contains(id)).collect(),
                });
                if candidates.as_ref().is_some_and(Vec::is_empty) {
                    return None;
                }
            }
        }
        let candidates = candidates?;
        let id = &candidates[rng.random_range(0..candidates.len())];
        self.instances.get(id)
    }

    fn build_index(&self) -> ConditionIndex {
        let mut index = ConditionIndex::new();
        for id in &self.order {
            if let Some(instance) = self.instances.get(id) {
                index_instance(&mut index, id, instance);
            }
        }
        index
    }
}

fn index_instance(index: &mut ConditionIndex, key: &str, instance: &Instance) {
    for (column, value) in &instance.fields {
        index
            .entry(column.clone())
            .or_default()
            .entry(value.render())
            .or_default()
            .push(key.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn instance(id: &str, fields: &[(&str, &str)]) -> Instance {
        Instance {
            entity: "country".to_string(),
            id: FieldValue::Text(id.to_string()),
            fields: fields
                .iter()
                .map(|(name, value)| (name.to_string(), FieldValue::Text(value.to_string())))
                .collect(),
            hidden: false,
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut store = InstanceStore::new("country");
        store.add(instance("fr", &[])).expect("first add");
        let err = store.add(instance("fr", &[])).expect_err("duplicate");
        assert!(matches!(err, GenerationError::DuplicateId { .. }));
    }

    #[test]
    fn sampling_an_empty_store_yields_nothing() {
        let store = InstanceStore::new("country");
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(store.sample_random(&mut rng).is_none());
    }

    #[test]
    fn conditioned_sampling_matches_exactly() {
        let mut store = InstanceStore::new("country");
        store
            .add(instance("fr", &[("active", "1"), ("iso", "FR")]))
            .unwrap();
        store
            .add(instance("de", &[("active", "0"), ("iso", "DE")]))
            .unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut conditions = BTreeMap::new();
        conditions.insert("active".to_string(), "1".to_string());
        for _ in 0..16 {
            let picked = store.sample_where(&conditions, &mut rng).expect("match");
            assert_eq!(picked.key(), "fr");
        }

        conditions.insert("iso".to_string(), "DE".to_string());
        assert!(store.sample_where(&conditions, &mut rng).is_none());
    }

    #[test]
    fn index_tracks_instances_added_after_first_query() {
        let mut store = InstanceStore::new("country");
        store.add(instance("fr", &[("active", "1")])).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut conditions = BTreeMap::new();
        conditions.insert("active".to_string(), "0".to_string());
        assert!(store.sample_where(&conditions, &mut rng).is_none());

        store.add(instance("de", &[("active", "0")])).unwrap();
        let picked = store.sample_where(&conditions, &mut rng).expect("match");
        assert_eq!(picked.key(), "de");
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut store = InstanceStore::new("country");
        for id in ["c", "a", "b"] {
            store.add(instance(id, &[])).unwrap();
        }
        let keys: Vec<String> = store.all().map(|i| i.key()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }
}

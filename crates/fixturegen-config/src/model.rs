use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Run configuration consumed by the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Seed for reproducibility.
    #[serde(default)]
    pub seed: u64,
    /// Languages localized columns are replicated for, in output order.
    pub langs: Vec<String>,
    /// Rows requested per entity type. Composite-primary types may be
    /// omitted; everything else must be present.
    #[serde(default)]
    pub counts: BTreeMap<String, u64>,
}

impl GenerationConfig {
    pub fn count_for(&self, entity: &str) -> Option<u64> {
        self.counts.get(entity).copied()
    }
}

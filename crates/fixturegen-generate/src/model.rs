use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use fixturegen_core::FieldValue;

use crate::assets::{ImageAsset, DEFAULT_POOL_CAPACITY};
use crate::store::Instance;

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Baseline for date-valued generators; keeps runs reproducible.
    pub base_date: NaiveDate,
    /// Maximum reusable image assets per category.
    pub image_pool_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            image_pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

/// Per-language sibling of a generated row, sharing its identifier.
#[derive(Debug, Clone)]
pub struct LocalizedRow {
    pub id: String,
    pub fields: Vec<(String, FieldValue)>,
}

/// Image asset assigned to one emitted instance.
#[derive(Debug, Clone)]
pub struct ImageAssignment {
    pub id: String,
    pub asset: ImageAsset,
}

/// In-memory dataset produced by one run, handed to serialization untouched.
#[derive(Debug, Default)]
pub struct Dataset {
    /// Entity types in generation order.
    pub order: Vec<String>,
    /// Emitted instances per entity type, insertion-ordered.
    pub entities: BTreeMap<String, Vec<Instance>>,
    /// Localized sibling rows per entity type and language.
    pub localized: BTreeMap<String, BTreeMap<String, Vec<LocalizedRow>>>,
    /// Image assignments per entity type.
    pub images: BTreeMap<String, Vec<ImageAssignment>>,
}

/// Summary of one generated entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity: String,
    pub rows_requested: u64,
    pub rows_generated: u64,
    pub seeds: u64,
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub entities: Vec<EntityReport>,
    pub generator_usage: BTreeMap<String, u64>,
    pub duration_ms: u64,
}

impl GenerationReport {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            entities: Vec::new(),
            generator_usage: BTreeMap::new(),
            duration_ms: 0,
        }
    }

    pub fn record_generator_usage(&mut self, id: &str) {
        *self.generator_usage.entry(id.to_string()).or_insert(0) += 1;
    }
}

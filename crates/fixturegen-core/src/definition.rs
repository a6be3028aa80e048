use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Declarative generation schema for one entity type. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    /// Entity type name; relation targets refer to this.
    pub entity: String,
    /// Ordered column rules driving per-row synthesis.
    pub columns: Vec<Column>,
    /// Identifier column name. `None` only for composite-primary types,
    /// whose rows are keyed by their relation combination instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_column: Option<String>,
    /// Relation columns forming a composite primary key (junction types).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary: Vec<String>,
    /// Columns regenerated once per configured language.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub localized_columns: Vec<Column>,
    /// Hand-authored records present before any synthetic generation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seeds: Vec<SeedRecord>,
    /// Image asset specification, passed through to the output stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSpec>,
    /// Related domain class name (opaque debug metadata).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// SQL comment attached to the dump (opaque debug metadata).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

impl Definition {
    /// Whether this definition produces per-language sibling rows.
    pub fn has_lang(&self) -> bool {
        !self.localized_columns.is_empty()
    }

    /// Whether rows are enumerated from a composite relation key.
    pub fn has_composite_primary(&self) -> bool {
        !self.primary.is_empty()
    }

    /// Every relation target named by this definition, in declaration
    /// order, including exclusive-group variants and localized columns.
    pub fn relation_targets(&self) -> Vec<&str> {
        let mut targets = Vec::new();
        collect_targets(&self.columns, &mut targets);
        collect_targets(&self.localized_columns, &mut targets);
        targets
    }

    /// First relation column of this definition pointing at `target`.
    pub fn relation_column_targeting(&self, target: &str) -> Option<&str> {
        for column in &self.columns {
            if let ColumnRule::Relation { target: t, .. } = &column.rule
                && t == target
            {
                return Some(column.name.as_str());
            }
        }
        None
    }

    /// Column by name, searching top-level columns only.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }
}

fn collect_targets<'a>(columns: &'a [Column], targets: &mut Vec<&'a str>) {
    for column in columns {
        match &column.rule {
            ColumnRule::Relation { target, .. } => targets.push(target.as_str()),
            ColumnRule::ExclusiveGroup { variants } => collect_targets(variants, targets),
            _ => {}
        }
    }
}

/// One named column and its generation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub rule: ColumnRule,
}

impl Column {
    pub fn new(name: impl Into<String>, rule: ColumnRule) -> Self {
        Self {
            name: name.into(),
            rule,
        }
    }
}

/// Generation rule for a column. Exactly one case applies per column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnRule {
    /// Fixed value, passed through the template evaluator.
    Literal { value: String },
    /// Delegate to a registered random-value generator.
    Generated {
        generator: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<serde_json::Value>,
        #[serde(default)]
        unique: bool,
        /// Kept in the row's field map for template references but omitted
        /// from the emitted record.
        #[serde(default)]
        hidden: bool,
    },
    /// Monotonically increasing integer scoped to the entity's run.
    Increment,
    /// Reference to another entity type's identifier.
    Relation {
        target: String,
        #[serde(default)]
        nullable: bool,
        /// Exact-match predicate over candidate instances' fields.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        conditions: BTreeMap<String, String>,
    },
    /// Exactly one variant is kept per row; the rest resolve to `Empty`.
    ExclusiveGroup { variants: Vec<Column> },
}

/// Hand-authored record replayed verbatim before synthetic rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<(String, String)>,
    /// Per-language fields replicated for every configured language.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub localized_fields: Vec<(String, String)>,
    /// Hidden seeds join relation sampling but are never emitted.
    #[serde(default)]
    pub hidden: bool,
}

/// Image asset specification attached to an entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Target directory name under the image output root.
    pub directory: String,
    /// Asset category hint for the (external) rasterizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default = "default_image_dimension")]
    pub width: u32,
    #[serde(default = "default_image_dimension")]
    pub height: u32,
}

fn default_image_dimension() -> u32 {
    200
}

/// Read-only, insertion-ordered set of definitions.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    definitions: Vec<Definition>,
    by_name: HashMap<String, usize>,
}

impl DefinitionSet {
    pub fn new(definitions: Vec<Definition>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(definitions.len());
        for (index, definition) in definitions.iter().enumerate() {
            if by_name
                .insert(definition.entity.clone(), index)
                .is_some()
            {
                return Err(Error::InvalidDefinition(format!(
                    "duplicate entity type '{}'",
                    definition.entity
                )));
            }
        }
        Ok(Self {
            definitions,
            by_name,
        })
    }

    pub fn get(&self, entity: &str) -> Option<&Definition> {
        self.by_name
            .get(entity)
            .map(|index| &self.definitions[*index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(name: &str, target: &str) -> Column {
        Column::new(
            name,
            ColumnRule::Relation {
                target: target.to_string(),
                nullable: false,
                conditions: BTreeMap::new(),
            },
        )
    }

    fn definition(entity: &str, columns: Vec<Column>) -> Definition {
        Definition {
            entity: entity.to_string(),
            columns,
            id_column: Some("id".to_string()),
            primary: Vec::new(),
            localized_columns: Vec::new(),
            seeds: Vec::new(),
            image: None,
            class: None,
            sql: None,
        }
    }

    #[test]
    fn relation_targets_include_exclusive_variants() {
        let group = Column::new(
            "owner",
            ColumnRule::ExclusiveGroup {
                variants: vec![relation("id_customer", "customer"), relation("id_guest", "guest")],
            },
        );
        let definition = definition("cart", vec![relation("id_carrier", "carrier"), group]);
        assert_eq!(
            definition.relation_targets(),
            vec!["carrier", "customer", "guest"]
        );
    }

    #[test]
    fn duplicate_entities_are_rejected() {
        let result = DefinitionSet::new(vec![
            definition("product", Vec::new()),
            definition("product", Vec::new()),
        ]);
        assert!(result.is_err());
    }
}

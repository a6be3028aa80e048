use std::collections::BTreeSet;

use crate::definition::{Column, ColumnRule, DefinitionSet};
use crate::error::{Error, Result};

/// Validate internal consistency of a definition set.
///
/// This checks:
/// - relation targets (including exclusive variants and localized columns)
///   resolve to a definition
/// - column names are unique within a definition
/// - composite primary keys name existing relation columns
/// - exclusive groups carry at least one variant
pub fn validate_definitions(definitions: &DefinitionSet) -> Result<()> {
    for definition in definitions.iter() {
        let mut names = BTreeSet::new();
        check_columns(&definition.entity, &definition.columns, &mut names)?;
        let mut lang_names = BTreeSet::new();
        check_columns(&definition.entity, &definition.localized_columns, &mut lang_names)?;
        for column in &definition.localized_columns {
            if matches!(column.rule, ColumnRule::ExclusiveGroup { .. }) {
                return Err(Error::InvalidDefinition(format!(
                    "localized column '{}.{}' cannot be an exclusive group",
                    definition.entity, column.name
                )));
            }
        }

        for target in definition.relation_targets() {
            if definitions.get(target).is_none() {
                return Err(Error::UnknownRelationTarget {
                    entity: definition.entity.clone(),
                    target: target.to_string(),
                });
            }
        }

        if definition.has_composite_primary() && definition.id_column.is_some() {
            return Err(Error::InvalidDefinition(format!(
                "entity '{}' declares both an id column and a composite primary key",
                definition.entity
            )));
        }

        for key_column in &definition.primary {
            match definition.column(key_column) {
                Some(column) => {
                    if !matches!(column.rule, ColumnRule::Relation { .. }) {
                        return Err(Error::InvalidDefinition(format!(
                            "primary key column '{}.{}' is not a relation",
                            definition.entity, key_column
                        )));
                    }
                }
                None => {
                    return Err(Error::InvalidDefinition(format!(
                        "primary key column '{}.{}' does not exist",
                        definition.entity, key_column
                    )));
                }
            }
        }
    }

    Ok(())
}

fn check_columns(entity: &str, columns: &[Column], names: &mut BTreeSet<String>) -> Result<()> {
    for column in columns {
        if !names.insert(column.name.clone()) {
            return Err(Error::InvalidDefinition(format!(
                "duplicate column name '{}.{}'",
                entity, column.name
            )));
        }
        if let ColumnRule::ExclusiveGroup { variants } = &column.rule {
            if variants.is_empty() {
                return Err(Error::InvalidDefinition(format!(
                    "exclusive group '{}.{}' has no variants",
                    entity, column.name
                )));
            }
            check_columns(entity, variants, names)?;
        }
    }
    Ok(())
}

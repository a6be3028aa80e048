use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use fixturegen_core::{
    validate_definitions, Column, ColumnRule, Definition, DefinitionSet, ImageSpec, SeedRecord,
    DEFAULT_ID_COLUMN,
};

use crate::errors::{ConfigError, Result};
use crate::model::GenerationConfig;

/// Load every `*.yml`/`*.yaml` entity model under `directory`.
///
/// The file stem is the entity type name. Files are read in lexical order so
/// the resulting set is deterministic.
pub fn load_definitions(directory: &Path) -> Result<DefinitionSet> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        let is_model = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "yml" || ext == "yaml")
            .unwrap_or(false);
        if is_model {
            paths.push(path);
        }
    }
    paths.sort();

    let mut definitions = Vec::with_capacity(paths.len());
    for path in paths {
        let entity = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| {
                ConfigError::Invalid(format!("unreadable model file name: {}", path.display()))
            })?
            .to_string();
        let source = fs::read_to_string(&path)?;
        definitions.push(parse_definition(&entity, &source)?);
    }

    let set = DefinitionSet::new(definitions)?;
    validate_definitions(&set)?;
    Ok(set)
}

/// Parse one entity model document.
pub fn parse_definition(entity: &str, source: &str) -> Result<Definition> {
    let document: Value = serde_yaml::from_str(source)?;
    let root = document
        .as_mapping()
        .ok_or_else(|| invalid(entity, "document is not a mapping"))?;
    let fields = get(root, "fields")
        .and_then(Value::as_mapping)
        .ok_or_else(|| invalid(entity, "missing 'fields' section"))?;
    let columns = get(fields, "columns")
        .and_then(Value::as_mapping)
        .ok_or_else(|| invalid(entity, "missing 'fields.columns' section"))?;
    let columns = parse_columns(entity, columns)?;

    let primary = parse_primary(get(fields, "primary"))?;
    let id_column = if primary.is_empty() {
        Some(
            get(fields, "id")
                .and_then(scalar_string)
                .unwrap_or_else(|| DEFAULT_ID_COLUMN.to_string()),
        )
    } else {
        None
    };

    let localized_columns = match get(root, "fields_lang") {
        Some(section) => {
            let section = section
                .as_mapping()
                .ok_or_else(|| invalid(entity, "'fields_lang' is not a mapping"))?;
            let columns = get(section, "columns")
                .and_then(Value::as_mapping)
                .ok_or_else(|| invalid(entity, "missing 'fields_lang.columns' section"))?;
            parse_columns(entity, columns)?
        }
        None => Vec::new(),
    };

    let seeds = match get(root, "entities") {
        Some(section) => parse_seeds(entity, section)?,
        None => Vec::new(),
    };

    Ok(Definition {
        entity: entity.to_string(),
        columns,
        id_column,
        primary,
        localized_columns,
        seeds,
        image: parse_image(fields),
        class: get(fields, "class").and_then(scalar_string),
        sql: get(fields, "sql").and_then(scalar_string),
    })
}

/// Load the run configuration document.
pub fn load_config(path: &Path) -> Result<GenerationConfig> {
    let source = fs::read_to_string(path)?;
    parse_config(&source)
}

/// Parse a run configuration document (`parameters` root section).
pub fn parse_config(source: &str) -> Result<GenerationConfig> {
    let document: Value = serde_yaml::from_str(source)?;
    let root = document
        .as_mapping()
        .ok_or_else(|| ConfigError::Invalid("configuration is not a mapping".to_string()))?;
    let parameters = get(root, "parameters")
        .and_then(Value::as_mapping)
        .ok_or_else(|| ConfigError::Invalid("missing 'parameters' section".to_string()))?;

    let langs = match get(parameters, "langs").and_then(Value::as_sequence) {
        Some(sequence) => sequence
            .iter()
            .map(|value| {
                scalar_string(value)
                    .ok_or_else(|| ConfigError::Invalid("langs must be strings".to_string()))
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let seed = get(parameters, "seed")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let mut counts = BTreeMap::new();
    if let Some(entities) = get(parameters, "entities").and_then(Value::as_mapping) {
        for (key, value) in entities {
            let entity = scalar_string(key)
                .ok_or_else(|| ConfigError::Invalid("entity names must be strings".to_string()))?;
            let count = value.as_u64().ok_or_else(|| {
                ConfigError::Invalid(format!("count for '{entity}' must be a non-negative integer"))
            })?;
            counts.insert(entity, count);
        }
    }

    Ok(GenerationConfig {
        seed,
        langs,
        counts,
    })
}

fn parse_columns(entity: &str, section: &Mapping) -> Result<Vec<Column>> {
    let mut columns = Vec::with_capacity(section.len());
    for (key, value) in section {
        let name = scalar_string(key)
            .ok_or_else(|| invalid(entity, "column names must be strings"))?;
        if name == "exclusive_fields" {
            let variants = value
                .as_mapping()
                .ok_or_else(|| invalid(entity, "'exclusive_fields' is not a mapping"))?;
            columns.push(Column::new(
                name,
                ColumnRule::ExclusiveGroup {
                    variants: parse_columns(entity, variants)?,
                },
            ));
            continue;
        }
        let description = value
            .as_mapping()
            .ok_or_else(|| invalid(entity, &format!("column '{name}' is not a mapping")))?;
        columns.push(Column::new(name.clone(), parse_rule(entity, &name, description)?));
    }
    Ok(columns)
}

fn parse_rule(entity: &str, column: &str, description: &Mapping) -> Result<ColumnRule> {
    if let Some(value) = get(description, "value") {
        let value = scalar_string(value)
            .ok_or_else(|| invalid(entity, &format!("column '{column}' value must be scalar")))?;
        return Ok(ColumnRule::Literal { value });
    }

    if let Some(target) = get(description, "relation") {
        let target = scalar_string(target)
            .ok_or_else(|| invalid(entity, &format!("column '{column}' relation must be a string")))?;
        let mut conditions = BTreeMap::new();
        if let Some(section) = get(description, "conditions").and_then(Value::as_mapping) {
            for (key, value) in section {
                let field = scalar_string(key).ok_or_else(|| {
                    invalid(entity, &format!("condition names on '{column}' must be strings"))
                })?;
                let expected = scalar_string(value).ok_or_else(|| {
                    invalid(entity, &format!("condition values on '{column}' must be scalar"))
                })?;
                conditions.insert(field, expected);
            }
        }
        return Ok(ColumnRule::Relation {
            target,
            nullable: truthy(get(description, "nullable")),
            conditions,
        });
    }

    let generator = get(description, "type").and_then(scalar_string).ok_or_else(|| {
        invalid(
            entity,
            &format!("column '{column}' has neither value, relation nor type"),
        )
    })?;

    if generator == "increment" {
        return Ok(ColumnRule::Increment);
    }

    let args = match get(description, "args") {
        Some(Value::Sequence(sequence)) => sequence
            .iter()
            .map(|value| yaml_to_json(entity, column, value))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(invalid(entity, &format!("args on '{column}' must be a sequence")));
        }
        None => Vec::new(),
    };

    Ok(ColumnRule::Generated {
        generator,
        args,
        unique: truthy(get(description, "unique")),
        hidden: truthy(get(description, "hidden")),
    })
}

fn parse_seeds(entity: &str, section: &Value) -> Result<Vec<SeedRecord>> {
    let section = section
        .as_mapping()
        .ok_or_else(|| invalid(entity, "'entities' is not a mapping"))?;
    let mut seeds = Vec::with_capacity(section.len());
    for (key, value) in section {
        let id = scalar_string(key)
            .ok_or_else(|| invalid(entity, "seed record ids must be scalar"))?;
        let record = match value {
            Value::Null => Mapping::new(),
            Value::Mapping(mapping) => mapping.clone(),
            _ => return Err(invalid(entity, &format!("seed record '{id}' is not a mapping"))),
        };
        seeds.push(SeedRecord {
            id,
            fields: parse_seed_fields(entity, get(&record, "fields"))?,
            localized_fields: parse_seed_fields(entity, get(&record, "fields_lang"))?,
            hidden: truthy(get(&record, "hidden")),
        });
    }
    Ok(seeds)
}

fn parse_seed_fields(entity: &str, section: Option<&Value>) -> Result<Vec<(String, String)>> {
    let Some(section) = section else {
        return Ok(Vec::new());
    };
    let section = section
        .as_mapping()
        .ok_or_else(|| invalid(entity, "seed fields are not a mapping"))?;
    let mut fields = Vec::with_capacity(section.len());
    for (key, value) in section {
        let name = scalar_string(key)
            .ok_or_else(|| invalid(entity, "seed field names must be strings"))?;
        let value = scalar_string(value).unwrap_or_default();
        fields.push((name, value));
    }
    Ok(fields)
}

fn parse_primary(value: Option<&Value>) -> Result<Vec<String>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(list)) => Ok(list
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect()),
        Some(Value::Sequence(sequence)) => sequence
            .iter()
            .map(|value| {
                scalar_string(value)
                    .ok_or_else(|| ConfigError::Invalid("primary entries must be strings".to_string()))
            })
            .collect(),
        Some(_) => Err(ConfigError::Invalid(
            "primary must be a string or a sequence".to_string(),
        )),
    }
}

fn parse_image(fields: &Mapping) -> Option<ImageSpec> {
    let directory = get(fields, "image").and_then(scalar_string)?;
    Some(ImageSpec {
        directory,
        category: get(fields, "image_category").and_then(scalar_string),
        width: get(fields, "image_width")
            .and_then(Value::as_u64)
            .map(|value| value as u32)
            .unwrap_or(200),
        height: get(fields, "image_height")
            .and_then(Value::as_u64)
            .map(|value| value as u32)
            .unwrap_or(200),
    })
}

fn yaml_to_json(entity: &str, column: &str, value: &Value) -> Result<serde_json::Value> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(value) => Ok(serde_json::Value::Bool(*value)),
        Value::Number(number) => {
            if let Some(value) = number.as_i64() {
                Ok(serde_json::Value::from(value))
            } else if let Some(value) = number.as_f64() {
                Ok(serde_json::Value::from(value))
            } else {
                Err(invalid(entity, &format!("unsupported number arg on '{column}'")))
            }
        }
        Value::String(value) => Ok(serde_json::Value::String(value.clone())),
        _ => Err(invalid(
            entity,
            &format!("generator args on '{column}' must be scalars"),
        )),
    }
}

fn get<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a Value> {
    mapping.get(key)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        Value::Bool(value) => Some((*value as i64).to_string()),
        _ => None,
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(value)) => *value,
        Some(Value::Number(value)) => value.as_i64().map(|v| v != 0).unwrap_or(false),
        Some(Value::String(value)) => value == "true" || value == "1",
        _ => false,
    }
}

fn invalid(entity: &str, message: &str) -> ConfigError {
    ConfigError::Invalid(format!("entity '{entity}': {message}"))
}

use std::collections::HashMap;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use fixturegen_config::GenerationConfig;
use fixturegen_core::{
    validate_definitions, Column, ColumnRule, Definition, DefinitionSet, FieldValue,
};

use crate::assets::ImagePool;
use crate::errors::GenerationError;
use crate::generators::{GeneratorContext, GeneratorRegistry, Locale};
use crate::model::{
    Dataset, EngineOptions, EntityReport, GenerationReport, ImageAssignment, LocalizedRow,
};
use crate::relation::{
    ProductAxis, RelationProduct, RelationRequest, RelationResolver, RowBinding,
};
use crate::store::{Instance, InstanceStore, StoreMap};
use crate::template;

/// Result of a generation run.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub dataset: Dataset,
    pub report: GenerationReport,
}

/// Top-level orchestrator: orders entity types, seeds the stores, then
/// synthesizes rows and localized siblings type by type. Strictly
/// sequential; a failure aborts the whole run.
#[derive(Debug, Clone, Default)]
pub struct FixtureEngine {
    options: EngineOptions,
}

impl FixtureEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn run(
        &self,
        definitions: &DefinitionSet,
        config: &GenerationConfig,
    ) -> Result<GenerationOutcome, GenerationError> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        validate_definitions(definitions)?;
        let mut registry = GeneratorRegistry::new();
        validate_generator_rules(definitions, &registry)?;
        let langs = resolve_langs(&config.langs)?;
        validate_counts(definitions, config)?;
        let order = fixturegen_core::order(definitions)?;

        let mut dataset = Dataset {
            order: order.clone(),
            ..Dataset::default()
        };
        let mut report = GenerationReport::new(run_id.clone());

        // Seed every store before any generation for any type begins.
        let mut stores = StoreMap::new();
        for definition in definitions.iter() {
            let mut store = InstanceStore::new(&definition.entity);
            store.seed(seed_instances(definition))?;
            stores.insert(definition.entity.clone(), store);
            push_seed_translations(definition, &langs, &mut dataset);
        }

        info!(
            run_id = %run_id,
            entities = order.len(),
            seed = config.seed,
            langs = langs.len(),
            "generation started"
        );

        let mut pool = ImagePool::new(self.options.image_pool_capacity);

        for entity in &order {
            let definition = definitions.get(entity).ok_or_else(|| {
                GenerationError::Configuration(format!("missing definition for '{entity}'"))
            })?;
            let entity_start = Instant::now();
            let mut rng = ChaCha8Rng::seed_from_u64(hash_seed(config.seed, entity));
            let requested = config.count_for(entity).unwrap_or(1);

            info!(entity = %entity, rows = requested, "generating entity");

            let seeds = definition.seeds.len() as u64;
            let hidden_seeds = definition.seeds.iter().filter(|seed| seed.hidden).count();
            let mut increment = 0_i64;

            if definition.has_composite_primary() {
                let product = build_product(definition, &stores)?;
                for combination in product {
                    generate_row(
                        definition,
                        definitions,
                        &mut stores,
                        &mut registry,
                        &langs,
                        &self.options,
                        &mut pool,
                        &mut dataset,
                        &mut report,
                        &mut increment,
                        Some(combination),
                        &mut rng,
                    )?;
                }
            } else {
                for _ in 0..requested {
                    generate_row(
                        definition,
                        definitions,
                        &mut stores,
                        &mut registry,
                        &langs,
                        &self.options,
                        &mut pool,
                        &mut dataset,
                        &mut report,
                        &mut increment,
                        None,
                        &mut rng,
                    )?;
                }
            }

            let stored = stores.get(entity).map(InstanceStore::len).unwrap_or(0);
            let rows_generated = (stored - hidden_seeds) as u64;
            report.entities.push(EntityReport {
                entity: entity.clone(),
                rows_requested: requested,
                rows_generated,
                seeds,
            });

            info!(
                entity = %entity,
                rows_generated,
                duration_ms = entity_start.elapsed().as_millis() as u64,
                "entity generated"
            );
        }

        for entity in &order {
            if let Some(store) = stores.remove(entity) {
                dataset.entities.insert(entity.clone(), store.into_emitted());
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            entities = report.entities.len(),
            duration_ms = report.duration_ms,
            "generation completed"
        );

        Ok(GenerationOutcome { dataset, report })
    }
}

/// Column work plan for one row after exclusive-group selection.
enum Planned<'a> {
    Active(&'a Column),
    Nulled(&'a str),
}

#[allow(clippy::too_many_arguments)]
fn generate_row(
    definition: &Definition,
    definitions: &DefinitionSet,
    stores: &mut StoreMap,
    registry: &mut GeneratorRegistry,
    langs: &[(String, Locale)],
    options: &EngineOptions,
    pool: &mut ImagePool,
    dataset: &mut Dataset,
    report: &mut GenerationReport,
    increment: &mut i64,
    combination: Option<Vec<(String, String, Option<String>)>>,
    rng: &mut ChaCha8Rng,
) -> Result<(), GenerationError> {
    let entity = definition.entity.as_str();
    let mut binding = RowBinding::new();

    // Composite-key axes are fixed before any other column resolves.
    let mut preassigned: HashMap<String, FieldValue> = HashMap::new();
    if let Some(choices) = &combination {
        for (column, target, id) in choices {
            let value = match id {
                Some(id) => {
                    binding.bind(target, id.clone());
                    stores
                        .get(target)
                        .and_then(|store| store.get(id))
                        .map(|instance| instance.id.clone())
                        .unwrap_or_else(|| FieldValue::Text(id.clone()))
                }
                None => FieldValue::Int(0),
            };
            preassigned.insert(column.clone(), value);
        }
    }

    let plan = plan_columns(&definition.columns, rng);

    // Unchosen exclusive variants resolve to an explicit empty value.
    for planned in &plan {
        if let Planned::Nulled(name) = planned {
            binding.set_field(name, FieldValue::Empty);
        }
    }

    // Relations populate the row binding before anything else draws.
    {
        let resolver = RelationResolver::new(definitions, &*stores);
        for planned in &plan {
            let Planned::Active(column) = planned else {
                continue;
            };
            let ColumnRule::Relation {
                target,
                nullable,
                conditions,
            } = &column.rule
            else {
                continue;
            };
            let value = match preassigned.remove(&column.name) {
                Some(value) => value,
                None => resolver.resolve(
                    &RelationRequest {
                        entity,
                        field: &column.name,
                        target,
                        nullable: *nullable,
                        conditions,
                    },
                    &mut binding,
                    rng,
                )?,
            };
            binding.set_field(&column.name, value);
        }
    }

    // Generator-backed and increment columns.
    let id_column = definition.id_column.as_deref();
    let mut first_generated: Option<FieldValue> = None;
    for planned in &plan {
        let Planned::Active(column) = planned else {
            continue;
        };
        match &column.rule {
            ColumnRule::Increment => {
                *increment += 1;
                let value = FieldValue::Int(*increment);
                if first_generated.is_none() {
                    first_generated = Some(value.clone());
                }
                binding.set_field(&column.name, value);
            }
            ColumnRule::Generated {
                generator,
                args,
                unique,
                ..
            } => {
                // The identifier column is implicitly unique.
                let unique = *unique || id_column == Some(column.name.as_str());
                let ctx = GeneratorContext {
                    entity,
                    field: &column.name,
                    locale: Locale::EnUs,
                    base_date: options.base_date,
                };
                let value = registry.generate(generator, &ctx, args, unique, rng)?;
                report.record_generator_usage(generator);
                if first_generated.is_none() && !value.is_empty() {
                    first_generated = Some(value.clone());
                }
                binding.set_field(&column.name, value);
            }
            _ => {}
        }
    }

    // Literals, evaluated against everything accumulated so far.
    for planned in &plan {
        let Planned::Active(column) = planned else {
            continue;
        };
        let ColumnRule::Literal { value } = &column.rule else {
            continue;
        };
        let value = template::evaluate(value, &binding.fields)?;
        binding.set_field(&column.name, value);
    }

    let id = row_identifier(definition, &binding, first_generated)?;

    let mut fields = Vec::with_capacity(definition.columns.len() + 1);
    let has_id_field = plan.iter().any(|planned| match planned {
        Planned::Active(column) => column.name == "id",
        Planned::Nulled(name) => *name == "id",
    });
    if !has_id_field {
        fields.push(("id".to_string(), id.clone()));
    }
    for planned in &plan {
        match planned {
            Planned::Nulled(name) => fields.push((name.to_string(), FieldValue::Empty)),
            Planned::Active(column) => {
                if matches!(column.rule, ColumnRule::Generated { hidden: true, .. }) {
                    continue;
                }
                let value = binding
                    .fields
                    .get(&column.name)
                    .cloned()
                    .unwrap_or(FieldValue::Empty);
                fields.push((column.name.clone(), value));
            }
        }
    }

    let instance = Instance {
        entity: entity.to_string(),
        id: id.clone(),
        fields,
        hidden: false,
    };
    stores
        .get_mut(entity)
        .ok_or_else(|| {
            GenerationError::Configuration(format!("missing instance store for '{entity}'"))
        })?
        .add(instance)?;

    if let Some(spec) = &definition.image {
        let asset = pool.assign(spec, rng);
        dataset
            .images
            .entry(entity.to_string())
            .or_default()
            .push(ImageAssignment {
                id: id.render(),
                asset,
            });
    }

    if definition.has_lang() {
        for (lang, locale) in langs {
            let row = generate_localized_row(
                definition,
                definitions,
                &*stores,
                registry,
                report,
                &mut binding,
                increment,
                *locale,
                &id,
                options,
                rng,
            )?;
            dataset
                .localized
                .entry(entity.to_string())
                .or_default()
                .entry(lang.clone())
                .or_default()
                .push(row);
        }
    }

    Ok(())
}

/// Localized sibling of the row just generated: same identifier, localized
/// columns drawn from a locale-scoped generator, relation choices shared
/// through the row binding.
#[allow(clippy::too_many_arguments)]
fn generate_localized_row(
    definition: &Definition,
    definitions: &DefinitionSet,
    stores: &StoreMap,
    registry: &mut GeneratorRegistry,
    report: &mut GenerationReport,
    binding: &mut RowBinding,
    increment: &mut i64,
    locale: Locale,
    id: &FieldValue,
    options: &EngineOptions,
    rng: &mut ChaCha8Rng,
) -> Result<LocalizedRow, GenerationError> {
    let entity = definition.entity.as_str();
    // Per-language view of the field map; the shared binding keeps relation
    // choices consistent across languages.
    let mut lang_fields = binding.fields.clone();

    for column in &definition.localized_columns {
        let ColumnRule::Relation {
            target,
            nullable,
            conditions,
        } = &column.rule
        else {
            continue;
        };
        let resolver = RelationResolver::new(definitions, stores);
        let value = resolver.resolve(
            &RelationRequest {
                entity,
                field: &column.name,
                target,
                nullable: *nullable,
                conditions,
            },
            binding,
            rng,
        )?;
        lang_fields.insert(column.name.clone(), value);
    }

    for column in &definition.localized_columns {
        match &column.rule {
            ColumnRule::Increment => {
                *increment += 1;
                lang_fields.insert(column.name.clone(), FieldValue::Int(*increment));
            }
            ColumnRule::Generated {
                generator,
                args,
                unique,
                ..
            } => {
                let ctx = GeneratorContext {
                    entity,
                    field: &column.name,
                    locale,
                    base_date: options.base_date,
                };
                let value = registry.generate(generator, &ctx, args, *unique, rng)?;
                report.record_generator_usage(generator);
                lang_fields.insert(column.name.clone(), value);
            }
            _ => {}
        }
    }

    for column in &definition.localized_columns {
        let ColumnRule::Literal { value } = &column.rule else {
            continue;
        };
        let value = template::evaluate(value, &lang_fields)?;
        lang_fields.insert(column.name.clone(), value);
    }

    let mut fields = Vec::with_capacity(definition.localized_columns.len());
    for column in &definition.localized_columns {
        if matches!(column.rule, ColumnRule::Generated { hidden: true, .. }) {
            continue;
        }
        let value = lang_fields
            .get(&column.name)
            .cloned()
            .unwrap_or(FieldValue::Empty);
        fields.push((column.name.clone(), value));
    }

    Ok(LocalizedRow {
        id: id.render(),
        fields,
    })
}

fn plan_columns<'a>(columns: &'a [Column], rng: &mut ChaCha8Rng) -> Vec<Planned<'a>> {
    let mut plan = Vec::with_capacity(columns.len());
    for column in columns {
        match &column.rule {
            ColumnRule::ExclusiveGroup { variants } => {
                let chosen = rng.random_range(0..variants.len());
                for (index, variant) in variants.iter().enumerate() {
                    if index == chosen {
                        plan.push(Planned::Active(variant));
                    } else {
                        plan.push(Planned::Nulled(variant.name.as_str()));
                    }
                }
            }
            _ => plan.push(Planned::Active(column)),
        }
    }
    plan
}

fn row_identifier(
    definition: &Definition,
    binding: &RowBinding,
    first_generated: Option<FieldValue>,
) -> Result<FieldValue, GenerationError> {
    if definition.has_composite_primary() {
        let key = definition
            .primary
            .iter()
            .map(|column| {
                binding
                    .fields
                    .get(column)
                    .map(FieldValue::render)
                    .unwrap_or_else(|| "0".to_string())
            })
            .collect::<Vec<_>>()
            .join("_");
        return Ok(FieldValue::Text(key));
    }

    if let Some(id_column) = definition.id_column.as_deref()
        && let Some(value) = binding.fields.get(id_column)
        && !value.is_empty()
    {
        return Ok(value.clone());
    }

    first_generated.ok_or_else(|| {
        GenerationError::Configuration(format!(
            "cannot determine an identifier for entity '{}'",
            definition.entity
        ))
    })
}

fn build_product(
    definition: &Definition,
    stores: &StoreMap,
) -> Result<RelationProduct, GenerationError> {
    let mut axes = Vec::with_capacity(definition.primary.len());
    for key_column in &definition.primary {
        let column = definition.column(key_column).ok_or_else(|| {
            GenerationError::Configuration(format!(
                "primary key column '{}.{}' does not exist",
                definition.entity, key_column
            ))
        })?;
        let ColumnRule::Relation {
            target, nullable, ..
        } = &column.rule
        else {
            return Err(GenerationError::Configuration(format!(
                "primary key column '{}.{}' is not a relation",
                definition.entity, key_column
            )));
        };
        let store = stores.get(target).ok_or_else(|| {
            GenerationError::Configuration(format!("missing instance store for '{target}'"))
        })?;
        if store.is_empty() {
            return Err(GenerationError::EmptyRelation {
                entity: definition.entity.clone(),
                relation: target.clone(),
            });
        }
        let mut ids: Vec<Option<String>> = store.ids().iter().cloned().map(Some).collect();
        if *nullable {
            ids.push(None);
        }
        axes.push(ProductAxis {
            column: key_column.clone(),
            target: target.clone(),
            ids,
        });
    }
    Ok(RelationProduct::new(axes))
}

fn seed_instances(definition: &Definition) -> Vec<Instance> {
    definition
        .seeds
        .iter()
        .map(|seed| {
            let mut fields = Vec::with_capacity(seed.fields.len() + 1);
            fields.push(("id".to_string(), FieldValue::Text(seed.id.clone())));
            for (name, value) in &seed.fields {
                if name != "id" {
                    fields.push((name.clone(), FieldValue::Text(value.clone())));
                }
            }
            Instance {
                entity: definition.entity.clone(),
                id: FieldValue::Text(seed.id.clone()),
                fields,
                hidden: seed.hidden,
            }
        })
        .collect()
}

fn push_seed_translations(
    definition: &Definition,
    langs: &[(String, Locale)],
    dataset: &mut Dataset,
) {
    if !definition.has_lang() {
        return;
    }
    for seed in &definition.seeds {
        if seed.hidden || seed.localized_fields.is_empty() {
            continue;
        }
        for (lang, _) in langs {
            let fields = seed
                .localized_fields
                .iter()
                .map(|(name, value)| (name.clone(), FieldValue::Text(value.clone())))
                .collect();
            dataset
                .localized
                .entry(definition.entity.clone())
                .or_default()
                .entry(lang.clone())
                .or_default()
                .push(LocalizedRow {
                    id: seed.id.clone(),
                    fields,
                });
        }
    }
}

fn validate_generator_rules(
    definitions: &DefinitionSet,
    registry: &GeneratorRegistry,
) -> Result<(), GenerationError> {
    for definition in definitions.iter() {
        check_generator_columns(&definition.entity, &definition.columns, registry)?;
        check_generator_columns(&definition.entity, &definition.localized_columns, registry)?;
    }
    Ok(())
}

fn check_generator_columns(
    entity: &str,
    columns: &[Column],
    registry: &GeneratorRegistry,
) -> Result<(), GenerationError> {
    for column in columns {
        match &column.rule {
            ColumnRule::Generated { generator, .. } => {
                if !registry.contains(generator) {
                    return Err(GenerationError::Configuration(format!(
                        "unknown generator type '{generator}' on '{entity}.{}'",
                        column.name
                    )));
                }
            }
            ColumnRule::ExclusiveGroup { variants } => {
                check_generator_columns(entity, variants, registry)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_counts(
    definitions: &DefinitionSet,
    config: &GenerationConfig,
) -> Result<(), GenerationError> {
    for definition in definitions.iter() {
        if !definition.has_composite_primary()
            && config.count_for(&definition.entity).is_none()
        {
            return Err(GenerationError::Configuration(format!(
                "missing row count for entity '{}'",
                definition.entity
            )));
        }
    }
    Ok(())
}

fn resolve_langs(langs: &[String]) -> Result<Vec<(String, Locale)>, GenerationError> {
    langs
        .iter()
        .map(|lang| {
            Locale::parse(lang)
                .map(|locale| (lang.clone(), locale))
                .ok_or_else(|| {
                    GenerationError::Configuration(format!("unsupported language '{lang}'"))
                })
        })
        .collect()
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

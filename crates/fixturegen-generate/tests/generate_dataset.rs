use std::collections::{BTreeMap, HashSet};

use fixturegen_config::{parse_definition, GenerationConfig};
use fixturegen_core::{DefinitionSet, FieldValue};
use fixturegen_generate::{
    EngineOptions, FixtureEngine, GenerationError, GenerationOutcome, Instance,
};

fn definitions(models: &[(&str, &str)]) -> DefinitionSet {
    let parsed = models
        .iter()
        .map(|(entity, source)| parse_definition(entity, source).expect("parse model"))
        .collect();
    DefinitionSet::new(parsed).expect("definition set")
}

fn config(seed: u64, langs: &[&str], counts: &[(&str, u64)]) -> GenerationConfig {
    GenerationConfig {
        seed,
        langs: langs.iter().map(|lang| lang.to_string()).collect(),
        counts: counts
            .iter()
            .map(|(entity, count)| (entity.to_string(), *count))
            .collect(),
    }
}

fn run(definitions: &DefinitionSet, config: &GenerationConfig) -> GenerationOutcome {
    FixtureEngine::new(EngineOptions::default())
        .run(definitions, config)
        .expect("generation run")
}

fn field<'a>(instance: &'a Instance, name: &str) -> &'a FieldValue {
    instance.get(name).expect("field present")
}

const GROUP_MODEL: &str = "fields:\n  columns:\n    id:\n      type: increment\n";

const CUSTOMER_MODEL: &str = r#"
fields:
  columns:
    id:
      type: increment
    id_group:
      relation: group
    email:
      type: email
      unique: true
"#;

const ORDER_MODEL: &str = r#"
fields:
  columns:
    id:
      type: increment
    id_customer:
      relation: customer
    id_group:
      relation: group
    total:
      type: randomFloat
      args: [2, 10, 200]
"#;

#[test]
fn relation_targets_are_generated_first() {
    let defs = definitions(&[
        ("order", ORDER_MODEL),
        ("customer", CUSTOMER_MODEL),
        ("group", GROUP_MODEL),
    ]);
    let outcome = run(
        &defs,
        &config(7, &[], &[("group", 3), ("customer", 8), ("order", 20)]),
    );

    let position = |entity: &str| {
        outcome
            .dataset
            .order
            .iter()
            .position(|e| e == entity)
            .expect("ordered entity")
    };
    assert!(position("group") < position("customer"));
    assert!(position("customer") < position("order"));
}

#[test]
fn no_relation_value_dangles() {
    let defs = definitions(&[
        ("order", ORDER_MODEL),
        ("customer", CUSTOMER_MODEL),
        ("group", GROUP_MODEL),
    ]);
    let outcome = run(
        &defs,
        &config(11, &[], &[("group", 3), ("customer", 8), ("order", 25)]),
    );

    let customer_ids: HashSet<String> = outcome.dataset.entities["customer"]
        .iter()
        .map(Instance::key)
        .collect();
    let group_ids: HashSet<String> = outcome.dataset.entities["group"]
        .iter()
        .map(Instance::key)
        .collect();

    for order in &outcome.dataset.entities["order"] {
        assert!(customer_ids.contains(&field(order, "id_customer").render()));
        assert!(group_ids.contains(&field(order, "id_group").render()));
    }
    for customer in &outcome.dataset.entities["customer"] {
        assert!(group_ids.contains(&field(customer, "id_group").render()));
    }
}

#[test]
fn correlated_relations_never_drift() {
    let defs = definitions(&[
        ("order", ORDER_MODEL),
        ("customer", CUSTOMER_MODEL),
        ("group", GROUP_MODEL),
    ]);
    let outcome = run(
        &defs,
        &config(13, &[], &[("group", 5), ("customer", 12), ("order", 60)]),
    );

    let customers: BTreeMap<String, &Instance> = outcome.dataset.entities["customer"]
        .iter()
        .map(|instance| (instance.key(), instance))
        .collect();

    for order in &outcome.dataset.entities["order"] {
        let customer = customers[&field(order, "id_customer").render()];
        assert_eq!(
            field(order, "id_group").render(),
            field(customer, "id_group").render(),
            "order and its customer must agree on the group"
        );
    }
}

#[test]
fn self_references_draw_from_already_stored_rows() {
    let category_model = r#"
fields:
  columns:
    id:
      type: increment
    id_parent:
      relation: category
entities:
  root:
    fields:
      id_parent: "0"
"#;
    let defs = definitions(&[("category", category_model)]);
    let outcome = run(&defs, &config(17, &[], &[("category", 6)]));

    let categories = &outcome.dataset.entities["category"];
    assert_eq!(categories.len(), 7);

    let mut seen: HashSet<String> = HashSet::new();
    for category in categories {
        if category.key() != "root" {
            let parent = field(category, "id_parent").render();
            assert!(
                seen.contains(&parent),
                "parent '{parent}' must already exist"
            );
        }
        seen.insert(category.key());
    }
}

#[test]
fn self_reference_without_seed_fails_with_names() {
    let category_model = r#"
fields:
  columns:
    id:
      type: increment
    id_parent:
      relation: category
"#;
    let defs = definitions(&[("category", category_model)]);
    let err = FixtureEngine::default()
        .run(&defs, &config(19, &[], &[("category", 2)]))
        .expect_err("no seed row");
    match err {
        GenerationError::EmptyRelation { entity, relation } => {
            assert_eq!(entity, "category");
            assert_eq!(relation, "category");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn localized_rows_share_identifiers_per_language() {
    let product_model = r#"
fields:
  id: id_product
  columns:
    id_product:
      type: increment
    price:
      type: randomFloat
      args: [2, 5, 50]
fields_lang:
  columns:
    name:
      type: words
      args: [2]
    description:
      type: sentence
"#;
    let defs = definitions(&[("product", product_model)]);
    let outcome = run(&defs, &config(23, &["en_US", "fr_FR"], &[("product", 5)]));

    let product_ids: Vec<String> = outcome.dataset.entities["product"]
        .iter()
        .map(Instance::key)
        .collect();
    assert_eq!(product_ids.len(), 5);

    let localized = &outcome.dataset.localized["product"];
    assert_eq!(localized.len(), 2);
    for lang in ["en_US", "fr_FR"] {
        let rows = &localized[lang];
        let row_ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
        assert_eq!(row_ids, product_ids, "one localized row per id for {lang}");
        for row in rows {
            assert!(row.fields.iter().any(|(name, _)| name == "name"));
        }
    }
}

#[test]
fn hidden_columns_feed_templates_but_are_not_emitted() {
    let product_model = r#"
fields:
  columns:
    id:
      type: increment
    base_price:
      type: numberBetween
      args: [10, 10]
      hidden: true
    price:
      value: "{base_price}*2"
"#;
    let defs = definitions(&[("product", product_model)]);
    let outcome = run(&defs, &config(29, &[], &[("product", 3)]));

    for product in &outcome.dataset.entities["product"] {
        assert!(product.get("base_price").is_none());
        assert_eq!(field(product, "price"), &FieldValue::Int(20));
    }
}

#[test]
fn hidden_seeds_are_sampled_but_never_emitted() {
    let zone_model = r#"
fields:
  columns:
    id:
      type: increment
entities:
  shadow_zone:
    hidden: true
"#;
    let country_model = r#"
fields:
  columns:
    id:
      type: increment
    id_zone:
      relation: zone
"#;
    let defs = definitions(&[("zone", zone_model), ("country", country_model)]);
    let outcome = run(&defs, &config(31, &[], &[("zone", 0), ("country", 4)]));

    assert!(outcome.dataset.entities["zone"].is_empty());
    for country in &outcome.dataset.entities["country"] {
        assert_eq!(field(country, "id_zone").render(), "shadow_zone");
    }
}

#[test]
fn exclusive_groups_keep_exactly_one_variant() {
    let cart_model = r#"
fields:
  columns:
    id:
      type: increment
    exclusive_fields:
      id_customer:
        relation: customer
      id_guest:
        relation: guest
"#;
    let customer_model = "fields:\n  columns:\n    id:\n      type: increment\n";
    let guest_model = "fields:\n  columns:\n    id:\n      type: increment\n";
    let defs = definitions(&[
        ("cart", cart_model),
        ("customer", customer_model),
        ("guest", guest_model),
    ]);
    let outcome = run(
        &defs,
        &config(37, &[], &[("cart", 40), ("customer", 3), ("guest", 3)]),
    );

    for cart in &outcome.dataset.entities["cart"] {
        let customer = field(cart, "id_customer");
        let guest = field(cart, "id_guest");
        assert!(
            customer.is_empty() ^ guest.is_empty(),
            "exactly one variant must be set, got {customer:?} / {guest:?}"
        );
    }
}

#[test]
fn composite_primaries_enumerate_the_full_product() {
    let feature_model = "fields:\n  columns:\n    id:\n      type: increment\n";
    let product_model = "fields:\n  columns:\n    id:\n      type: increment\n";
    let junction_model = r#"
fields:
  primary: id_feature, id_product
  columns:
    id_feature:
      relation: feature
    id_product:
      relation: product
    position:
      type: numberBetween
      args: [1, 10]
"#;
    let defs = definitions(&[
        ("feature", feature_model),
        ("product", product_model),
        ("feature_product", junction_model),
    ]);
    let outcome = run(&defs, &config(41, &[], &[("feature", 2), ("product", 3)]));

    let rows = &outcome.dataset.entities["feature_product"];
    assert_eq!(rows.len(), 6);

    let mut combinations = HashSet::new();
    for row in rows {
        let feature = field(row, "id_feature").render();
        let product = field(row, "id_product").render();
        assert_eq!(row.key(), format!("{feature}_{product}"));
        assert!(combinations.insert((feature, product)));
    }
}

#[test]
fn generation_is_deterministic_for_a_fixed_seed() {
    let defs = definitions(&[
        ("order", ORDER_MODEL),
        ("customer", CUSTOMER_MODEL),
        ("group", GROUP_MODEL),
    ]);
    let cfg = config(97, &[], &[("group", 3), ("customer", 6), ("order", 12)]);

    let render = |outcome: &GenerationOutcome| {
        let mut rendered = String::new();
        for (entity, instances) in &outcome.dataset.entities {
            for instance in instances {
                rendered.push_str(entity);
                rendered.push(':');
                rendered.push_str(&instance.key());
                for (name, value) in &instance.fields {
                    rendered.push_str(&format!(" {name}={}", value.render()));
                }
                rendered.push('\n');
            }
        }
        rendered
    };

    let first = render(&run(&defs, &cfg));
    let second = render(&run(&defs, &cfg));
    assert_eq!(first, second);
}

#[test]
fn seed_records_appear_verbatim_before_synthetic_rows() {
    let carrier_model = r#"
fields:
  columns:
    id:
      type: increment
    name:
      type: company
entities:
  default_carrier:
    fields:
      name: Default carrier
"#;
    let defs = definitions(&[("carrier", carrier_model)]);
    let outcome = run(&defs, &config(43, &[], &[("carrier", 2)]));

    let carriers = &outcome.dataset.entities["carrier"];
    assert_eq!(carriers.len(), 3);
    assert_eq!(carriers[0].key(), "default_carrier");
    assert_eq!(
        field(&carriers[0], "name").render(),
        "Default carrier"
    );
}

#[test]
fn missing_counts_abort_before_generation() {
    let defs = definitions(&[("group", GROUP_MODEL)]);
    let err = FixtureEngine::default()
        .run(&defs, &config(47, &[], &[]))
        .expect_err("count required");
    assert!(matches!(err, GenerationError::Configuration(_)));
}

#[test]
fn unknown_generator_types_abort_before_generation() {
    let model = "fields:\n  columns:\n    id:\n      type: flibber\n";
    let defs = definitions(&[("widget", model)]);
    let err = FixtureEngine::default()
        .run(&defs, &config(53, &[], &[("widget", 1)]))
        .expect_err("unknown generator");
    match err {
        GenerationError::Configuration(message) => {
            assert!(message.contains("flibber"));
            assert!(message.contains("widget"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unknown_languages_abort_before_generation() {
    let defs = definitions(&[("group", GROUP_MODEL)]);
    let err = FixtureEngine::default()
        .run(&defs, &config(59, &["xx_XX"], &[("group", 1)]))
        .expect_err("unknown language");
    assert!(matches!(err, GenerationError::Configuration(_)));
}

#[test]
fn image_specs_assign_pooled_assets_per_row() {
    let product_model = r#"
fields:
  image: p
  image_category: products
  image_width: 120
  image_height: 80
  columns:
    id:
      type: increment
"#;
    let defs = definitions(&[("product", product_model)]);
    let outcome = run(&defs, &config(61, &[], &[("product", 20)]));

    let assignments = &outcome.dataset.images["product"];
    assert_eq!(assignments.len(), 20);
    for assignment in assignments {
        assert!(assignment.asset.slot < 8);
        assert_eq!(assignment.asset.width, 120);
        assert_eq!(assignment.asset.height, 80);
    }
}

#[test]
fn reports_track_rows_and_generator_usage() {
    let defs = definitions(&[
        ("order", ORDER_MODEL),
        ("customer", CUSTOMER_MODEL),
        ("group", GROUP_MODEL),
    ]);
    let outcome = run(
        &defs,
        &config(67, &[], &[("group", 2), ("customer", 4), ("order", 9)]),
    );

    let orders = outcome
        .report
        .entities
        .iter()
        .find(|entry| entry.entity == "order")
        .expect("order report");
    assert_eq!(orders.rows_requested, 9);
    assert_eq!(orders.rows_generated, 9);
    assert!(outcome.report.generator_usage.contains_key("randomFloat"));
    assert!(outcome.report.generator_usage.contains_key("email"));
}

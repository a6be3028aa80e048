use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use fixturegen_core::{Column, ColumnRule, Definition, DefinitionSet};

use crate::errors::GenerationError;
use crate::model::{Dataset, LocalizedRow};
use crate::store::Instance;

/// Write one XML document per entity type under `out_dir/data` and one per
/// (entity, language) under `out_dir/langs/<ll>`. Returns bytes written.
pub fn write_dataset(
    dataset: &Dataset,
    definitions: &DefinitionSet,
    out_dir: &Path,
) -> Result<u64, GenerationError> {
    let data_dir = out_dir.join("data");
    fs::create_dir_all(&data_dir)?;

    let mut bytes = 0_u64;
    for entity in &dataset.order {
        let Some(definition) = definitions.get(entity) else {
            continue;
        };
        let instances = dataset
            .entities
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let document = entity_document(definition, instances);
        let path = data_dir.join(format!("{entity}.xml"));
        fs::write(&path, &document)?;
        bytes += document.len() as u64;
    }

    for (entity, langs) in &dataset.localized {
        for (lang, rows) in langs {
            let prefix: String = lang.chars().take(2).collect();
            let lang_dir = out_dir.join("langs").join(prefix);
            fs::create_dir_all(&lang_dir)?;
            let document = lang_document(entity, rows);
            let path = lang_dir.join(format!("{entity}.xml"));
            fs::write(&path, &document)?;
            bytes += document.len() as u64;
        }
    }

    Ok(bytes)
}

fn entity_document(definition: &Definition, instances: &[Instance]) -> String {
    let entity = &definition.entity;
    let mut doc = String::new();
    doc.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(doc, "<entity_{entity}>");

    doc.push_str("  <fields");
    if let Some(id_column) = &definition.id_column {
        let _ = write!(doc, " id=\"{}\"", escape(id_column));
    }
    if !definition.primary.is_empty() {
        let _ = write!(doc, " primary=\"{}\"", escape(&definition.primary.join(",")));
    }
    if let Some(class) = &definition.class {
        let _ = write!(doc, " class=\"{}\"", escape(class));
    }
    if let Some(sql) = &definition.sql {
        let _ = write!(doc, " sql=\"{}\"", escape(sql));
    }
    if let Some(image) = &definition.image {
        let _ = write!(doc, " image=\"{}\"", escape(&image.directory));
    }
    doc.push_str(">\n");
    write_field_descriptions(&mut doc, &definition.columns);
    doc.push_str("  </fields>\n");

    doc.push_str("  <entities>\n");
    for instance in instances {
        let _ = write!(doc, "    <{entity}");
        for (name, value) in &instance.fields {
            let _ = write!(doc, " {}=\"{}\"", name, escape(&value.render()));
        }
        doc.push_str("/>\n");
    }
    doc.push_str("  </entities>\n");
    let _ = writeln!(doc, "</entity_{entity}>");
    doc
}

fn write_field_descriptions(doc: &mut String, columns: &[Column]) {
    for column in columns {
        match &column.rule {
            ColumnRule::Generated { hidden: true, .. } => {}
            ColumnRule::ExclusiveGroup { variants } => write_field_descriptions(doc, variants),
            ColumnRule::Relation { target, .. } => {
                let _ = writeln!(
                    doc,
                    "    <field name=\"{}\" relation=\"{}\"/>",
                    escape(&column.name),
                    escape(target)
                );
            }
            _ => {
                let _ = writeln!(doc, "    <field name=\"{}\"/>", escape(&column.name));
            }
        }
    }
}

fn lang_document(entity: &str, rows: &[LocalizedRow]) -> String {
    let mut doc = String::new();
    doc.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(doc, "<entity_{entity}>");
    for row in rows {
        let _ = write!(doc, "  <{entity} id=\"{}\"", escape(&row.id));
        for (name, value) in &row.fields {
            let _ = write!(doc, " {}=\"{}\"", name, escape(&value.render()));
        }
        doc.push_str("/>\n");
    }
    let _ = writeln!(doc, "</entity_{entity}>");
    doc
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

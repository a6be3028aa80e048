use std::collections::{BTreeMap, BTreeSet};

use crate::definition::DefinitionSet;
use crate::error::{Error, Result};

/// Order entity types so that every relation target is generated before the
/// types that reference it.
///
/// Each pass rebuilds the candidate sequence in the previous pass's order: a
/// type that other types reference is inserted before the earliest of its
/// already-placed referents, every other type is appended. The loop stops at
/// a fixed point and is bounded by the definition count, so mutually
/// referential sets settle on the last candidate instead of spinning.
/// Self-references contribute no ordering edge; they are a seed-data
/// precondition checked at generation time.
pub fn order(definitions: &DefinitionSet) -> Result<Vec<String>> {
    let mut referents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for definition in definitions.iter() {
        for target in definition.relation_targets() {
            if definitions.get(target).is_none() {
                return Err(Error::UnknownRelationTarget {
                    entity: definition.entity.clone(),
                    target: target.to_string(),
                });
            }
            if target != definition.entity {
                referents
                    .entry(target)
                    .or_default()
                    .insert(definition.entity.as_str());
            }
        }
    }

    let mut current: Vec<&str> = definitions.iter().map(|d| d.entity.as_str()).collect();
    for _ in 0..=definitions.len() {
        let next = rebuild(&current, &referents);
        if next == current {
            break;
        }
        current = next;
    }

    Ok(current.into_iter().map(str::to_string).collect())
}

fn rebuild<'a>(
    current: &[&'a str],
    referents: &BTreeMap<&str, BTreeSet<&str>>,
) -> Vec<&'a str> {
    let mut next: Vec<&'a str> = Vec::with_capacity(current.len());
    for &entity in current {
        match referents.get(entity) {
            Some(dependents) if !dependents.is_empty() => {
                let position = next
                    .iter()
                    .position(|placed| dependents.contains(*placed))
                    .unwrap_or(next.len());
                next.insert(position, entity);
            }
            _ => next.push(entity),
        }
    }
    next
}

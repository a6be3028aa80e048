//! Core contracts for fixturegen.
//!
//! This crate defines the declarative entity model (definitions, column
//! rules, seed records), the scalar value type flowing through generation,
//! the dependency ordering over entity types, and validation helpers shared
//! by the loader and the engine.

pub mod definition;
pub mod error;
pub mod graph;
pub mod validation;
pub mod value;

pub use definition::{
    Column, ColumnRule, Definition, DefinitionSet, ImageSpec, SeedRecord,
};
pub use error::{Error, Result};
pub use graph::order;
pub use validation::validate_definitions;
pub use value::FieldValue;

/// Identifier column assumed when a definition does not name one.
pub const DEFAULT_ID_COLUMN: &str = "id";

//! Fixture generation engine for fixturegen.
//!
//! Consumes a validated definition set plus run configuration and produces a
//! referentially consistent in-memory dataset: one instance collection per
//! entity type and per-language sibling rows for localized columns.

pub mod assets;
pub mod engine;
pub mod errors;
pub mod generators;
pub mod model;
pub mod output;
pub mod relation;
pub mod store;
pub mod template;

pub use engine::{FixtureEngine, GenerationOutcome};
pub use errors::GenerationError;
pub use model::{Dataset, EngineOptions, EntityReport, GenerationReport, LocalizedRow};
pub use store::{Instance, InstanceStore, StoreMap};

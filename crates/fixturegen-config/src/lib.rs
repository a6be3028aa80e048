//! YAML configuration loading for fixturegen.
//!
//! Entity model files (one per entity type) describe columns, localized
//! columns, and seed records; the run configuration file carries languages,
//! the seed, and per-entity row counts.

pub mod errors;
pub mod loader;
pub mod model;

pub use errors::ConfigError;
pub use loader::{load_config, load_definitions, parse_config, parse_definition};
pub use model::GenerationConfig;

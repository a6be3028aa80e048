use thiserror::Error;

/// Core error type shared across fixturegen crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A column declares a relation to an entity type with no definition.
    #[error("entity '{entity}' declares a relation to unknown type '{target}'")]
    UnknownRelationTarget { entity: String, target: String },
    /// A definition violates internal invariants.
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),
}

/// Convenience alias for results returned by fixturegen crates.
pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

/// Errors emitted by the fixture generation engine. All of them abort the
/// run; a partially generated dataset is never handed downstream.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Broken setup detected before or during generation: missing counts,
    /// unknown generator types, unknown languages, invalid definitions.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A relation needs an instance of a type that has none yet.
    #[error("no instances of '{relation}' exist yet for entity '{entity}'")]
    EmptyRelation { entity: String, relation: String },
    /// No instance of the target type matches the relation conditions.
    #[error("no instance of '{target}' satisfies the conditions on '{entity}.{field}'")]
    UnsatisfiableRelation {
        entity: String,
        field: String,
        target: String,
    },
    /// An identifier was produced twice for the same entity type.
    #[error("duplicate id '{id}' for entity '{entity}'")]
    DuplicateId { entity: String, id: String },
    /// A value template substituted fields but is not a valid expression.
    #[error("expression error: {0}")]
    Expression(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<fixturegen_core::Error> for GenerationError {
    fn from(err: fixturegen_core::Error) -> Self {
        GenerationError::Configuration(err.to_string())
    }
}

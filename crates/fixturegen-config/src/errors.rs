use thiserror::Error;

/// Errors raised while loading definitions or run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("definition error: {0}")]
    Definition(#[from] fixturegen_core::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

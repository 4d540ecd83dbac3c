//! Configuration error types

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Malformed configuration YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A `STAMPEDE_*` override could not be parsed
    #[error("{var} is invalid: {message}")]
    EnvError { var: String, message: String },

    #[error("Invalid {domain} configuration: {message}")]
    DomainError { domain: String, message: String },
}

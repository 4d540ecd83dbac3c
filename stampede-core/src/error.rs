//! Error types for catalog construction, scheduling and run orchestration
//!
//! Request-level problems are never errors here: they end up as a
//! [`crate::FailureReason`] inside a verdict.

use thiserror::Error;

/// Errors raised while building or loading a scenario catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Unknown catalog '{0}': not a built-in name and no such file")]
    UnknownCatalog(String),

    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Scenario '{0}' is registered twice")]
    DuplicateScenario(String),

    #[error("Scenario '{scenario}' references unknown policy '{policy}'")]
    UnknownPolicy { scenario: String, policy: String },

    #[error("Scenario '{scenario}' has no value pool for path parameter '{param}'")]
    MissingParameterPool { scenario: String, param: String },

    #[error("Invalid endpoint template for '{scenario}': {message}")]
    InvalidTemplate { scenario: String, message: String },

    #[error("Invalid pacing: {0}")]
    InvalidPacing(String),

    #[error("Cannot render a URL for '{scenario}': {message}")]
    Render { scenario: String, message: String },
}

/// Errors detected when a scheduler is created, before any request is sent
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("No scenario matches the tag filter {filter}")]
    NoMatchingScenarios { filter: String },

    #[error("Invalid scenario weights: {0}")]
    InvalidWeights(String),
}

/// Errors that prevent a run from starting
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid target host: {0}")]
    InvalidHost(#[from] url::ParseError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("HTTP client setup failed: {0}")]
    Http(#[from] stampede_http::HttpError),
}

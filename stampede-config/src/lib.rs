//! Domain-driven configuration management for Stampede
//!
//! Configuration is split by functional domain (HTTP transport, logging,
//! run shape, authentication, reporting), each with its own defaults and
//! validation. Values come from an optional YAML file and are then
//! overridden by `STAMPEDE_*` environment variables.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::{parse_duration, ConfigLoader};

// Re-export domain configurations
pub use domains::{
    auth::AuthConfig, http::HttpConfig, logging::LoggingConfig, report::ReportConfig,
    run::{PacingOverride, RunConfig},
    StampedeConfig,
};

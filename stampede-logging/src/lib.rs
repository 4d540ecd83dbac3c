//! Logging setup for Stampede
//!
//! Everything logs through `tracing`. Output goes to stderr so that stdout
//! stays free for the machine-readable run report.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
pub use stampede_config::domains::logging::{LogFormat, LogLevel, LoggingConfig};

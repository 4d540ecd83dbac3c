//! Domain-specific configuration modules

pub mod auth;
pub mod http;
pub mod logging;
pub mod report;
pub mod run;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Stampede configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StampedeConfig {
    /// HTTP transport configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,

    /// Run shape configuration
    #[serde(default)]
    pub run: run::RunConfig,

    /// Login credentials for auth-required scenarios
    #[serde(default)]
    pub auth: auth::AuthConfig,

    /// Report and alert thresholds
    #[serde(default)]
    pub report: report::ReportConfig,
}

impl StampedeConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.http.validate()?;
        self.logging.validate()?;
        self.run.validate()?;
        self.auth.validate()?;
        self.report.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = StampedeConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}

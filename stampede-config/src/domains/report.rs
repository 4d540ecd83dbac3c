//! End-of-run report and alert thresholds

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_ratio, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Failure ratio above which an alert fires; the catalog profile decides when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_failure_ratio: Option<f64>,

    /// p99 latency ceiling in milliseconds
    #[serde(default = "default_max_p99_ms")]
    pub max_p99_ms: f64,

    /// Write the JSON report to this path in addition to stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Exit non-zero when any alert fired
    #[serde(default)]
    pub fail_on_alert: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_failure_ratio: None,
            max_p99_ms: default_max_p99_ms(),
            output: None,
            fail_on_alert: false,
        }
    }
}

impl Validatable for ReportConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(ratio) = self.max_failure_ratio {
            validate_ratio(ratio, "max_failure_ratio", self.domain_name())?;
        }
        validate_positive(self.max_p99_ms, "max_p99_ms", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "report"
    }
}

fn default_max_p99_ms() -> f64 {
    5000.0
}

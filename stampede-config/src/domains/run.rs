//! Run shape configuration: target, concurrency, duration, tag filter, pacing

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a load run is shaped
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base URL of the target service
    #[serde(default = "default_host")]
    pub host: String,

    /// Number of concurrent virtual users at full ramp
    #[serde(default = "default_users")]
    pub users: u32,

    /// Virtual users started per second during ramp-up
    #[serde(default = "default_spawn_rate")]
    pub spawn_rate: f64,

    /// Hard run duration, measured from the first spawned user
    #[serde(with = "humantime_serde", default = "default_duration")]
    pub duration: Duration,

    /// How long in-flight requests may finish after the stop signal
    #[serde(with = "humantime_serde", default = "default_graceful_timeout")]
    pub graceful_timeout: Duration,

    /// Built-in catalog name (`steady`, `nightmare`) or a path to a catalog file
    #[serde(default = "default_catalog")]
    pub catalog: String,

    /// Active tag filter; empty means every scenario is a candidate
    #[serde(default)]
    pub tags: Vec<String>,

    /// Scenarios carrying any of these tags are never selected
    #[serde(default)]
    pub exclude_tags: Vec<String>,

    /// Replaces every pacing range of the catalog, per-scenario ones included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing: Option<PacingOverride>,

    /// Seed for every random choice in the run; random when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Elapsed time past which expected-timeout scenarios accept a slow response
    #[serde(with = "humantime_serde", default = "default_expected_timeout_threshold")]
    pub expected_timeout_threshold: Duration,

    /// Skip the warm-up phase even when the catalog defines one
    #[serde(default)]
    pub skip_warmup: bool,
}

/// Longest accepted wait between two iterations, in seconds
pub const MAX_WAIT_SECS: f64 = 86_400.0;

/// Inter-request wait range in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacingOverride {
    pub min_wait: f64,
    pub max_wait: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            users: default_users(),
            spawn_rate: default_spawn_rate(),
            duration: default_duration(),
            graceful_timeout: default_graceful_timeout(),
            catalog: default_catalog(),
            tags: Vec::new(),
            exclude_tags: Vec::new(),
            pacing: None,
            seed: None,
            expected_timeout_threshold: default_expected_timeout_threshold(),
            skip_warmup: false,
        }
    }
}

impl Validatable for RunConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.host, "host", self.domain_name())?;
        validate_positive(self.users, "users", self.domain_name())?;
        validate_positive(self.spawn_rate, "spawn_rate", self.domain_name())?;
        validate_positive(self.duration.as_millis(), "duration", self.domain_name())?;
        validate_required_string(&self.catalog, "catalog", self.domain_name())?;

        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(self.validation_error("tags cannot contain empty entries"));
        }

        if let Some(pacing) = &self.pacing {
            pacing.validate()?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "run"
    }
}

impl Validatable for PacingOverride {
    fn validate(&self) -> ConfigResult<()> {
        if !self.min_wait.is_finite() || !self.max_wait.is_finite() {
            return Err(self.validation_error("wait times must be finite"));
        }
        if self.min_wait < 0.0 || self.max_wait < 0.0 {
            return Err(self.validation_error(format!(
                "wait times cannot be negative (min {}, max {})",
                self.min_wait, self.max_wait
            )));
        }
        if self.max_wait > MAX_WAIT_SECS {
            return Err(self.validation_error(format!(
                "max_wait {} exceeds {} seconds",
                self.max_wait, MAX_WAIT_SECS
            )));
        }
        if self.min_wait > self.max_wait {
            return Err(self.validation_error(format!(
                "min_wait {} exceeds max_wait {}",
                self.min_wait, self.max_wait
            )));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "run.pacing"
    }
}

// Default value functions
fn default_host() -> String {
    "http://localhost:8080".to_string()
}

fn default_users() -> u32 {
    50
}

fn default_spawn_rate() -> f64 {
    10.0
}

fn default_duration() -> Duration {
    Duration::from_secs(60)
}

fn default_graceful_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_catalog() -> String {
    "steady".to_string()
}

fn default_expected_timeout_threshold() -> Duration {
    Duration::from_secs(5)
}

//! HTTP transport settings shared by every virtual user's client

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-user reqwest client settings
///
/// Durations are humantime strings (`30s`, `1m 30s`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout; a request past it is recorded as `Request Error`
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    pub user_agent: String,

    /// Turn off only for targets with self-signed certificates
    pub verify_ssl: bool,

    /// Send `Accept-Encoding: gzip` and decode compressed bodies
    pub gzip: bool,

    pub connection_pool: ConnectionPoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionPoolConfig {
    pub max_idle_per_host: usize,

    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// TCP connect timeout
    #[serde(with = "humantime_serde")]
    pub connection_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("stampede/", env!("CARGO_PKG_VERSION")).to_string(),
            verify_ssl: true,
            gzip: true,
            connection_pool: ConnectionPoolConfig::default(),
        }
    }
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            idle_timeout: Duration::from_secs(90),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

impl Validatable for HttpConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.timeout.as_millis(), "timeout", self.domain_name())?;
        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;
        self.connection_pool.validate()
    }

    fn domain_name(&self) -> &'static str {
        "http"
    }
}

impl Validatable for ConnectionPoolConfig {
    fn validate(&self) -> ConfigResult<()> {
        let domain = self.domain_name();
        validate_positive(self.idle_timeout.as_millis(), "idle_timeout", domain)?;
        validate_positive(self.connection_timeout.as_millis(), "connection_timeout", domain)
    }

    fn domain_name(&self) -> &'static str {
        "http.connection_pool"
    }
}

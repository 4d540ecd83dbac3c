//! Configuration loading and environment variable handling

use crate::domains::StampedeConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "STAMPEDE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<StampedeConfig> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        self.from_yaml_str(&content)
    }

    /// Load configuration from YAML text with environment overrides
    pub fn from_yaml_str(&self, content: &str) -> ConfigResult<StampedeConfig> {
        let mut config: StampedeConfig = serde_yaml::from_str(content)?;
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<StampedeConfig> {
        debug!("Loading configuration from {}_* environment variables", self.prefix);
        let mut config = StampedeConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<StampedeConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut StampedeConfig) -> ConfigResult<()> {
        self.apply_run_overrides(&mut config.run)?;
        self.apply_http_overrides(&mut config.http)?;
        self.apply_logging_overrides(&mut config.logging)?;
        self.apply_auth_overrides(&mut config.auth);
        Ok(())
    }

    /// Apply run config overrides
    fn apply_run_overrides(
        &self,
        config: &mut crate::domains::run::RunConfig,
    ) -> ConfigResult<()> {
        if let Ok(host) = self.get_env_var("HOST") {
            config.host = host;
        }

        if let Some(users) = self.parse_env_var::<u32>("USERS")? {
            config.users = users;
        }

        if let Some(rate) = self.parse_env_var::<f64>("SPAWN_RATE")? {
            config.spawn_rate = rate;
        }

        if let Ok(duration) = self.get_env_var("DURATION") {
            config.duration = parse_duration(&duration)
                .map_err(|e| self.env_error("DURATION", e))?;
        }

        if let Ok(tags) = self.get_env_var("TAGS") {
            config.tags = split_list(&tags);
        }

        if let Ok(catalog) = self.get_env_var("CATALOG") {
            config.catalog = catalog;
        }

        if let Some(seed) = self.parse_env_var::<u64>("SEED")? {
            config.seed = Some(seed);
        }

        // A single bound overrides against the default 0.1-0.5s range
        let wait_min = self.parse_env_var::<f64>("WAIT_MIN")?;
        let wait_max = self.parse_env_var::<f64>("WAIT_MAX")?;
        if wait_min.is_some() || wait_max.is_some() {
            let current = config.pacing.unwrap_or(crate::domains::run::PacingOverride {
                min_wait: 0.1,
                max_wait: 0.5,
            });
            config.pacing = Some(crate::domains::run::PacingOverride {
                min_wait: wait_min.unwrap_or(current.min_wait),
                max_wait: wait_max.unwrap_or(current.max_wait),
            });
        }

        Ok(())
    }

    /// Apply HTTP config overrides
    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        // Bare numbers are seconds; anything else is a humantime duration
        if let Ok(raw) = self.get_env_var("HTTP_TIMEOUT") {
            config.timeout = match raw.trim().parse::<u64>() {
                Ok(seconds) => Duration::from_secs(seconds),
                Err(_) => parse_duration(&raw)
                    .map_err(|e| self.env_error("HTTP_TIMEOUT", e))?,
            };
        }

        if let Ok(user_agent) = self.get_env_var("HTTP_USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Some(verify_ssl) = self.parse_env_var::<bool>("HTTP_VERIFY_SSL")? {
            config.verify_ssl = verify_ssl;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|e| self.env_error("LOG_LEVEL", e))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|e| self.env_error("LOG_FORMAT", e))?;
        }

        Ok(())
    }

    /// Apply credential overrides; secrets normally only arrive this way
    fn apply_auth_overrides(&self, config: &mut crate::domains::auth::AuthConfig) {
        if let Ok(api_key) = self.get_env_var("API_KEY") {
            config.api_key = Some(api_key);
        }

        if let Ok(user_ign) = self.get_env_var("LOGIN_IGN") {
            config.user_ign = user_ign;
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        let var = format!("{}_{}", self.prefix, name);
        let value = std::env::var(&var)?;
        debug!("Environment override from {}", var);
        Ok(value)
    }

    fn env_error(&self, name: &str, message: impl std::fmt::Display) -> ConfigError {
        ConfigError::EnvError {
            var: format!("{}_{}", self.prefix, name),
            message: message.to_string(),
        }
    }

    /// Parse an optional prefixed environment variable
    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| self.env_error(name, e)),
            Err(_) => Ok(None),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Humantime duration such as `90s`, `2m` or `1h 30m`
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(text.trim()).map_err(|e| e.to_string())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

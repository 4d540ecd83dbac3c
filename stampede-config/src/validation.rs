//! Validation shared by the configuration domains

use crate::error::{ConfigError, ConfigResult};

/// A configuration domain that can check its own values
pub trait Validatable {
    fn validate(&self) -> ConfigResult<()>;

    /// Section name used in error messages (`run`, `http.connection_pool`, ...)
    fn domain_name(&self) -> &'static str;

    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        invalid(self.domain_name(), message)
    }
}

fn invalid(domain: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::DomainError {
        domain: domain.to_string(),
        message: message.into(),
    }
}

pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(invalid(domain, format!("{} cannot be empty", field_name)));
    }
    Ok(())
}

/// Rejects zero, negative and NaN values
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    match value.partial_cmp(&T::default()) {
        Some(std::cmp::Ordering::Greater) => Ok(()),
        _ => Err(invalid(
            domain,
            format!("{} must be greater than 0, got {}", field_name, value),
        )),
    }
}

/// Accepts a fraction in `[0, 1]`
pub fn validate_ratio(value: f64, field_name: &str, domain: &str) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(
            domain,
            format!("{} must be between 0 and 1, got {}", field_name, value),
        ));
    }
    Ok(())
}

/// Accepts absolute http and https URLs only
pub fn validate_url(url: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    let parsed = url::Url::parse(url)
        .map_err(|e| invalid(domain, format!("{} '{}' is not a URL: {}", field_name, url, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(
            domain,
            format!("{} scheme '{}' not supported (only http/https)", field_name, scheme),
        )),
    }
}

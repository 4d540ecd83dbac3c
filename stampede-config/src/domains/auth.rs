//! Credentials used by the per-user login bootstrap

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};

/// Authentication configuration
///
/// `api_key` is a secret: it is normally supplied through `STAMPEDE_API_KEY`
/// and never serialized back out. Without it, virtual users skip login and
/// run without auth-required scenarios.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path of the login endpoint on the target host
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// API key sent as `apiKey` in the login body
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Character name sent as `userIgn`; also excluded from self-targeting pools
    #[serde(default = "default_user_ign")]
    pub user_ign: String,
}

impl AuthConfig {
    /// Whether credentials are present
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("login_path", &self.login_path)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("user_ign", &self.user_ign)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            api_key: None,
            user_ign: default_user_ign(),
        }
    }
}

impl Validatable for AuthConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.login_path, "login_path", self.domain_name())?;
        if !self.login_path.starts_with('/') {
            return Err(self.validation_error("login_path must start with '/'"));
        }
        validate_required_string(&self.user_ign, "user_ign", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "auth"
    }
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_user_ign() -> String {
    "긱델".to_string()
}

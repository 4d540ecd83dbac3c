//! Per-user session bootstrap
//!
//! Runs once per virtual user before its first scheduled task: an optional
//! login that yields a bearer token, then optional warm-up requests. Neither
//! phase can fail the run; a failed login only shrinks the user's task set
//! and warm-up failures are logged. Bootstrap requests are not recorded in
//! the run metrics.

use crate::catalog::WarmupTarget;
use serde::Deserialize;
use serde_json::json;
use stampede_config::AuthConfig;
use stampede_http::{HttpClient, HttpMethod, HttpRequest};
use tracing::{debug, error, info, warn};
use url::Url;

/// What bootstrap produced for one user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapResult {
    pub token: Option<String>,
    /// Warm-up ran and every target answered below 400
    pub warmed_up: bool,
}

#[derive(Clone)]
struct Credentials {
    login_path: String,
    api_key: String,
    user_ign: String,
}

#[derive(Deserialize)]
struct LoginEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<LoginData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    #[serde(default)]
    access_token: Option<String>,
}

/// Shared, immutable bootstrap plan
#[derive(Clone, Default)]
pub struct SessionBootstrap {
    credentials: Option<Credentials>,
    warmup: Vec<WarmupTarget>,
}

impl std::fmt::Debug for SessionBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBootstrap")
            .field("login", &self.credentials.as_ref().map(|c| &c.login_path))
            .field("warmup_targets", &self.warmup.len())
            .finish()
    }
}

impl SessionBootstrap {
    /// Login is enabled only when `auth` carries an API key
    pub fn new(auth: &AuthConfig, warmup: Vec<WarmupTarget>) -> Self {
        let credentials = auth
            .api_key
            .as_ref()
            .filter(|_| auth.has_credentials())
            .map(|api_key| Credentials {
                login_path: auth.login_path.clone(),
                api_key: api_key.clone(),
                user_ign: auth.user_ign.clone(),
            });
        Self {
            credentials,
            warmup,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Identity the login uses, if any
    pub fn login_identity(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.user_ign.as_str())
    }

    pub async fn run(&self, client: &dyn HttpClient, base: &Url, user_id: u32) -> BootstrapResult {
        let token = match &self.credentials {
            Some(credentials) => self.login(client, base, credentials, user_id).await,
            None => None,
        };

        let warmed_up = if self.warmup.is_empty() {
            false
        } else {
            self.warm_up(client, base, token.as_deref(), user_id).await
        };

        BootstrapResult { token, warmed_up }
    }

    async fn login(
        &self,
        client: &dyn HttpClient,
        base: &Url,
        credentials: &Credentials,
        user_id: u32,
    ) -> Option<String> {
        let url = match base.join(&credentials.login_path) {
            Ok(url) => url,
            Err(e) => {
                error!(user_id, "Invalid login path {}: {}", credentials.login_path, e);
                return None;
            }
        };

        let body = json!({
            "apiKey": credentials.api_key,
            "userIgn": credentials.user_ign,
        });
        let response = match client
            .send(HttpRequest::new(HttpMethod::Post, url).with_json(body))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(user_id, "Login request failed: {}", e);
                return None;
            }
        };

        if response.status != 200 {
            error!(user_id, status = response.status, "Login HTTP error");
            return None;
        }

        let envelope: LoginEnvelope = match serde_json::from_slice(&response.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(user_id, "Login response is not valid JSON: {}", e);
                return None;
            }
        };

        let token = envelope
            .success
            .then_some(envelope.data)
            .flatten()
            .and_then(|data| data.access_token)
            .filter(|token| !token.is_empty());

        match &token {
            Some(_) => info!(user_id, "Login successful for {}", credentials.user_ign),
            None => error!(user_id, "Login response carried no access token"),
        }
        token
    }

    async fn warm_up(
        &self,
        client: &dyn HttpClient,
        base: &Url,
        token: Option<&str>,
        user_id: u32,
    ) -> bool {
        debug!(user_id, "Starting warm-up with {} targets", self.warmup.len());
        let mut all_ok = true;

        for target in &self.warmup {
            let url = match target.render_url(base) {
                Ok(url) => url,
                Err(e) => {
                    warn!(user_id, "[Warmup] {} skipped: {}", target.name, e);
                    all_ok = false;
                    continue;
                }
            };

            let mut request = HttpRequest::new(target.method, url);
            if let Some(token) = token {
                request = request.with_header("Authorization", format!("Bearer {}", token));
            }

            match client.send(request).await {
                Ok(response) => {
                    debug!(user_id, status = response.status, "[Warmup] {}", target.name);
                    all_ok &= response.status < 400;
                }
                Err(e) => {
                    warn!(user_id, "[Warmup] {} failed: {}", target.name, e);
                    all_ok = false;
                }
            }
        }

        all_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_http::mock::{MockHttpClient, MockResponse};
    use std::collections::BTreeMap;

    fn auth(api_key: Option<&str>) -> AuthConfig {
        AuthConfig {
            api_key: api_key.map(String::from),
            ..AuthConfig::default()
        }
    }

    fn warmup_target(character: &str) -> WarmupTarget {
        WarmupTarget {
            name: format!("warmup_{}", character),
            method: HttpMethod::Get,
            endpoint: "/api/v3/characters/{userIgn}/expectation".into(),
            params: BTreeMap::from([("userIgn".to_string(), character.to_string())]),
        }
    }

    fn base() -> Url {
        Url::parse("http://target").unwrap()
    }

    #[tokio::test]
    async fn test_login_yields_token() {
        let client = MockHttpClient::new().with_mock(
            HttpMethod::Post,
            "/auth/login",
            MockResponse::json(
                200,
                json!({"success": true, "data": {"accessToken": "jwt-1"}}),
            ),
        );

        let bootstrap = SessionBootstrap::new(&auth(Some("key")), Vec::new());
        let result = bootstrap.run(&client, &base(), 0).await;
        assert_eq!(result.token.as_deref(), Some("jwt-1"));
        assert!(!result.warmed_up);

        let requests = client.requests();
        assert_eq!(
            requests[0].body,
            Some(json!({"apiKey": "key", "userIgn": "긱델"}))
        );
    }

    #[tokio::test]
    async fn test_login_failures_leave_user_without_token() {
        let cases = [
            MockResponse::json(401, json!({"success": false})),
            MockResponse::json(200, json!({"success": false, "error": {"code": "INVALID_KEY"}})),
            MockResponse::json(200, json!({"success": true, "data": {}})),
            MockResponse::text(200, "not json"),
            MockResponse::connection_refused(),
        ];

        for response in cases {
            let client = MockHttpClient::new().with_mock(HttpMethod::Post, "/auth/login", response);
            let bootstrap = SessionBootstrap::new(&auth(Some("key")), Vec::new());
            let result = bootstrap.run(&client, &base(), 0).await;
            assert!(result.token.is_none());
            assert_eq!(client.request_count(), 1, "login is never retried");
        }
    }

    #[tokio::test]
    async fn test_no_credentials_means_no_login() {
        let client = MockHttpClient::new();
        let bootstrap = SessionBootstrap::new(&auth(None), Vec::new());
        assert!(!bootstrap.has_credentials());

        let result = bootstrap.run(&client, &base(), 0).await;
        assert_eq!(result, BootstrapResult::default());
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn test_warmup_hits_every_target_and_tolerates_failures() {
        let client = MockHttpClient::new()
            .with_mock(
                HttpMethod::Get,
                "/api/v3/characters/%EA%B0%95%EC%9D%80%ED%98%B8",
                MockResponse::json(200, json!({})),
            )
            .with_mock(HttpMethod::Get, "/api/v3/", MockResponse::text(500, "boom"));

        let bootstrap = SessionBootstrap::new(
            &auth(None),
            vec![warmup_target("강은호"), warmup_target("아델")],
        );
        let result = bootstrap.run(&client, &base(), 3).await;
        assert!(!result.warmed_up);
        assert_eq!(client.request_count(), 2);

        let ok_only = SessionBootstrap::new(&auth(None), vec![warmup_target("강은호")]);
        assert!(ok_only.run(&client, &base(), 3).await.warmed_up);
    }
}

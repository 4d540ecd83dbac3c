//! Virtual user task loop
//!
//! Each user is `Bootstrapping`, then `Running`, then `Stopped`. While
//! running it issues one request at a time: select a scenario, send it,
//! classify the response, record the outcome, pause. A graceful stop ends
//! the loop at the next iteration boundary (or interrupts a pause); a
//! forced stop also abandons the request in flight.

use crate::bootstrap::SessionBootstrap;
use crate::catalog::Scenario;
use crate::classifier::{classify, classify_transport_error};
use crate::metrics::MetricsAggregator;
use crate::outcome::{Classification, FailureReason, RequestOutcome};
use crate::scheduler::{Pacing, TaskScheduler};
use rand::rngs::StdRng;
use rand::SeedableRng;
use stampede_http::{HttpClient, HttpRequest};
use stampede_resilience::ShutdownListener;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserState {
    Bootstrapping,
    Running,
    Stopped,
}

/// One simulated client
pub struct VirtualUser {
    id: u32,
    client: Arc<dyn HttpClient>,
    base_url: Url,
    scheduler: TaskScheduler,
    bootstrap: Arc<SessionBootstrap>,
    metrics: Arc<MetricsAggregator>,
    pacing: Pacing,
    fixed_pacing: bool,
    expected_timeout_threshold: Duration,
    rng: StdRng,
    token: Option<String>,
    state: UserState,
    iterations: u64,
}

impl VirtualUser {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        client: Arc<dyn HttpClient>,
        base_url: Url,
        scheduler: TaskScheduler,
        bootstrap: Arc<SessionBootstrap>,
        metrics: Arc<MetricsAggregator>,
        pacing: Pacing,
        expected_timeout_threshold: Duration,
        run_seed: u64,
    ) -> Self {
        Self {
            id,
            client,
            base_url,
            scheduler,
            bootstrap,
            metrics,
            pacing,
            fixed_pacing: false,
            expected_timeout_threshold,
            rng: StdRng::seed_from_u64(run_seed ^ u64::from(id)),
            token: None,
            state: UserState::Bootstrapping,
            iterations: 0,
        }
    }

    /// Use `pacing` after every scenario, ignoring per-scenario ranges
    pub fn with_fixed_pacing(mut self) -> Self {
        self.fixed_pacing = true;
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> UserState {
        self.state
    }

    /// Requests issued by the task loop so far
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Bootstrap, then loop until stopped. Returns the iteration count.
    pub async fn run(mut self, mut shutdown: ShutdownListener) -> u64 {
        let user_id = self.id;
        let bootstrap = Arc::clone(&self.bootstrap);
        let bootstrapped = tokio::select! {
            result = bootstrap.run(self.client.as_ref(), &self.base_url, user_id) => Some(result),
            _ = shutdown.wait_for_forced() => None,
        };
        let Some(result) = bootstrapped else {
            self.state = UserState::Stopped;
            return self.iterations;
        };
        self.token = result.token;

        if self.token.is_none() {
            match self
                .scheduler
                .restricted(|scenario| !scenario.definition.auth_required)
            {
                Some(reduced) => {
                    if reduced.candidates().len() < self.scheduler.candidates().len() {
                        debug!(user_id = self.id, "No auth token, skipping auth-required scenarios");
                    }
                    self.scheduler = reduced;
                }
                None => {
                    info!(user_id = self.id, "No runnable scenario without an auth token, idling");
                    return self.idle(shutdown).await;
                }
            }
        }

        let login_identity = self.bootstrap.login_identity().map(str::to_string);
        match self
            .scheduler
            .restricted(|scenario| scenario.renderable_for(login_identity.as_deref()))
        {
            Some(reduced) => self.scheduler = reduced,
            None => {
                info!(
                    user_id = self.id,
                    "Every parameter pool only holds the login identity, idling"
                );
                return self.idle(shutdown).await;
            }
        }

        self.state = UserState::Running;
        debug!(user_id = self.id, "User running");

        while self.state == UserState::Running {
            if shutdown.stop_requested().await {
                break;
            }

            let scenario = Arc::clone(self.scheduler.select(&mut self.rng));
            let executed = tokio::select! {
                outcome = self.execute(&scenario, login_identity.as_deref()) => Some(outcome),
                _ = shutdown.wait_for_forced() => None,
            };
            let Some(outcome) = executed else {
                debug!(user_id, "Abandoning in-flight {}", scenario.name());
                break;
            };
            self.report_slow(&scenario, &outcome);
            self.metrics.record(&outcome);
            self.iterations += 1;

            let pause = self.pause_after(&scenario);
            if pause.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = shutdown.wait_for_stop() => break,
                }
            }
        }

        self.state = UserState::Stopped;
        debug!(user_id = self.id, iterations = self.iterations, "User stopped");
        self.iterations
    }

    fn pause_after(&mut self, scenario: &Scenario) -> Duration {
        let pacing = match scenario.pacing() {
            Some(own) if !self.fixed_pacing => own,
            _ => self.pacing,
        };
        pacing.sample(&mut self.rng)
    }

    /// Nothing to run: wait for the stop signal without issuing requests
    async fn idle(mut self, mut shutdown: ShutdownListener) -> u64 {
        self.state = UserState::Stopped;
        shutdown.wait_for_stop().await;
        self.iterations
    }

    /// Issue one request for `scenario` and classify the result
    async fn execute(&mut self, scenario: &Scenario, login_identity: Option<&str>) -> RequestOutcome {
        let url = match scenario.render_url(&self.base_url, &mut self.rng, login_identity) {
            Ok(url) => url,
            Err(e) => {
                return RequestOutcome::new(
                    scenario.name(),
                    0,
                    Duration::ZERO,
                    Classification::failure(FailureReason::RequestError(e.to_string())),
                );
            }
        };

        let definition = &scenario.definition;
        let mut request = HttpRequest::new(definition.method, url);
        for (name, value) in &definition.headers {
            request = request.with_header(name.as_str(), value.as_str());
        }
        if let Some(token) = &self.token {
            request = request.with_header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = &definition.body {
            request = request.with_json(body.clone());
        }

        let context = scenario.context(self.expected_timeout_threshold);
        let started = Instant::now();
        let result = self.client.send(request).await;
        let elapsed = started.elapsed();

        match result {
            Ok(response) => RequestOutcome::new(
                scenario.name(),
                response.status,
                elapsed,
                classify(&response, elapsed, &context),
            ),
            Err(e) => RequestOutcome::new(
                scenario.name(),
                0,
                elapsed,
                classify_transport_error(&e, &context),
            ),
        }
    }

    fn report_slow(&self, scenario: &Scenario, outcome: &RequestOutcome) {
        if let Some(limit) = scenario.definition.slow_warning_ms {
            let elapsed_ms = outcome.elapsed_ms();
            if elapsed_ms > limit as f64 {
                warn!(
                    user_id = self.id,
                    scenario = scenario.name(),
                    "Slow response: {:.2}ms (limit {}ms)",
                    elapsed_ms,
                    limit
                );
            }
        }
        if let Some(reason) = outcome.failure_reason() {
            debug!(user_id = self.id, scenario = scenario.name(), "Request failed: {}", reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogProfile, ScenarioCatalog, ScenarioDefinition, TagFilter};
    use crate::classifier::ClassifierPolicy;
    use serde_json::json;
    use stampede_config::AuthConfig;
    use stampede_http::mock::{MockHttpClient, MockResponse};
    use stampede_http::HttpMethod;
    use stampede_resilience::ShutdownCoordinator;

    fn catalog() -> ScenarioCatalog {
        let mut catalog = ScenarioCatalog::new("test", CatalogProfile::Steady);
        catalog.add_policy("plain", ClassifierPolicy::default());
        catalog.add_policy(
            "like",
            ClassifierPolicy {
                auth_sensitive: true,
                ..ClassifierPolicy::default()
            },
        );
        catalog
            .register(
                ScenarioDefinition::new("read", HttpMethod::Get, "/read/{id}")
                    .policy("plain")
                    .weight(1)
                    .param("id", ["1", "2", "3"]),
            )
            .unwrap();
        catalog
            .register(
                ScenarioDefinition::new("like", HttpMethod::Post, "/like/{id}")
                    .policy("like")
                    .weight(1)
                    .auth_required()
                    .expected_codes(["DUPLICATE_LIKE"])
                    .param("id", ["1", "2"]),
            )
            .unwrap();
        catalog
    }

    fn user(client: Arc<MockHttpClient>, bootstrap: SessionBootstrap, metrics: Arc<MetricsAggregator>) -> VirtualUser {
        let scheduler = TaskScheduler::new(&catalog(), &TagFilter::all()).unwrap();
        VirtualUser::new(
            1,
            client,
            Url::parse("http://target").unwrap(),
            scheduler,
            Arc::new(bootstrap),
            metrics,
            Pacing::new(Duration::from_millis(10), Duration::from_millis(20)),
            Duration::from_secs(5),
            99,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_without_token_skips_auth_scenarios() {
        let client = Arc::new(
            MockHttpClient::new()
                .with_mock(HttpMethod::Get, "/read/", MockResponse::json(200, json!({"ok": true}))),
        );
        let metrics = Arc::new(MetricsAggregator::new());
        let coordinator = ShutdownCoordinator::with_timeout(Duration::from_secs(1));

        let user = user(client.clone(), SessionBootstrap::default(), metrics.clone());
        let handle = tokio::spawn(user.run(coordinator.subscribe()));

        tokio::time::sleep(Duration::from_secs(2)).await;
        coordinator.shutdown().await.unwrap();
        let iterations = handle.await.unwrap();

        assert!(iterations > 0);
        assert!(client
            .requests()
            .iter()
            .all(|request| request.method == HttpMethod::Get && request.header("authorization").is_none()));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, iterations);
        assert_eq!(snapshot.total_failures, 0);
        assert!(snapshot.scenario("like").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticated_user_sends_bearer_token() {
        let client = Arc::new(
            MockHttpClient::new()
                .with_mock(
                    HttpMethod::Post,
                    "/auth/login",
                    MockResponse::json(200, json!({"success": true, "data": {"accessToken": "tok"}})),
                )
                .with_mock(
                    HttpMethod::Post,
                    "/like/",
                    MockResponse::json(200, json!({"success": false, "error": {"code": "DUPLICATE_LIKE"}})),
                )
                .with_mock(HttpMethod::Get, "/read/", MockResponse::json(200, json!({}))),
        );
        let metrics = Arc::new(MetricsAggregator::new());
        let coordinator = ShutdownCoordinator::with_timeout(Duration::from_secs(1));
        let auth = AuthConfig {
            api_key: Some("key".into()),
            ..AuthConfig::default()
        };

        let user = user(client.clone(), SessionBootstrap::new(&auth, Vec::new()), metrics.clone());
        let handle = tokio::spawn(user.run(coordinator.subscribe()));

        tokio::time::sleep(Duration::from_secs(3)).await;
        coordinator.shutdown().await.unwrap();
        handle.await.unwrap();

        let requests = client.requests();
        assert_eq!(requests[0].url.path(), "/auth/login");
        assert!(requests[1..]
            .iter()
            .all(|request| request.header("Authorization") == Some("Bearer tok")));

        let snapshot = metrics.snapshot();
        let like = snapshot.scenario("like").unwrap();
        assert!(like.requests > 0);
        assert_eq!(like.expected_exceptions, like.requests);
        assert_eq!(snapshot.total_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_idles_when_pools_only_hold_login_identity() {
        let mut catalog = ScenarioCatalog::new("self", CatalogProfile::Steady);
        catalog.add_policy("plain", ClassifierPolicy::default());
        catalog
            .register(
                ScenarioDefinition::new("like", HttpMethod::Post, "/like/{id}")
                    .policy("plain")
                    .auth_required()
                    .exclude_login_identity()
                    .param("id", ["me"]),
            )
            .unwrap();
        let client = Arc::new(MockHttpClient::new().with_mock(
            HttpMethod::Post,
            "/auth/login",
            MockResponse::json(200, json!({"success": true, "data": {"accessToken": "tok"}})),
        ));
        let metrics = Arc::new(MetricsAggregator::new());
        let coordinator = ShutdownCoordinator::with_timeout(Duration::from_secs(1));
        let auth = AuthConfig {
            api_key: Some("key".into()),
            user_ign: "me".into(),
            ..AuthConfig::default()
        };

        let user = VirtualUser::new(
            1,
            client.clone(),
            Url::parse("http://target").unwrap(),
            TaskScheduler::new(&catalog, &TagFilter::all()).unwrap(),
            Arc::new(SessionBootstrap::new(&auth, Vec::new())),
            metrics.clone(),
            Pacing::none(),
            Duration::from_secs(5),
            3,
        );
        let handle = tokio::spawn(user.run(coordinator.subscribe()));

        tokio::time::sleep(Duration::from_secs(2)).await;
        coordinator.shutdown().await.unwrap();

        assert_eq!(handle.await.unwrap(), 0);
        assert_eq!(client.request_count(), 1);
        assert_eq!(metrics.snapshot().total_requests, 0);
    }

    fn paged_user(client: Arc<MockHttpClient>, metrics: Arc<MetricsAggregator>) -> VirtualUser {
        let mut catalog = ScenarioCatalog::new("paged", CatalogProfile::Chaos);
        catalog.add_policy("plain", ClassifierPolicy::default());
        catalog
            .register(
                ScenarioDefinition::new("deep_page", HttpMethod::Get, "/pages")
                    .policy("plain")
                    .pacing(1.0, 2.0),
            )
            .unwrap();
        VirtualUser::new(
            1,
            client,
            Url::parse("http://target").unwrap(),
            TaskScheduler::new(&catalog, &TagFilter::all()).unwrap(),
            Arc::new(SessionBootstrap::default()),
            metrics,
            Pacing::new(Duration::from_millis(100), Duration::from_millis(500)),
            Duration::from_secs(5),
            11,
        )
    }

    #[test]
    fn test_scenario_pacing_replaces_default() {
        let client = Arc::new(
            MockHttpClient::new().with_mock(HttpMethod::Get, "/pages", MockResponse::json(200, json!({}))),
        );
        let metrics = Arc::new(MetricsAggregator::new());

        let mut user = paged_user(client, metrics);
        let scenario = Arc::clone(user.scheduler.select(&mut user.rng));
        for _ in 0..500 {
            let pause = user.pause_after(&scenario);
            assert!(pause >= Duration::from_secs(1) && pause <= Duration::from_secs(2));
        }

        let mut fixed = user.with_fixed_pacing();
        for _ in 0..500 {
            let pause = fixed.pause_after(&scenario);
            assert!(pause >= Duration::from_millis(100) && pause <= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_pacing_bounds_request_rate() {
        let client = Arc::new(
            MockHttpClient::new().with_mock(HttpMethod::Get, "/pages", MockResponse::json(200, json!({}))),
        );
        let metrics = Arc::new(MetricsAggregator::new());
        let coordinator = ShutdownCoordinator::with_timeout(Duration::from_secs(1));

        let handle = tokio::spawn(paged_user(client.clone(), metrics).run(coordinator.subscribe()));
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        coordinator.shutdown().await.unwrap();
        let iterations = handle.await.unwrap();

        // One request up front, then one per 1-2s pause
        assert!((6..=11).contains(&iterations), "iterations were {iterations}");
        assert_eq!(client.request_count() as u64, iterations);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_stop_abandons_hanging_request() {
        let client = Arc::new(MockHttpClient::new().with_mock(
            HttpMethod::Get,
            "/read/",
            MockResponse::json(200, json!({})).with_delay(Duration::from_secs(3600)),
        ));
        let metrics = Arc::new(MetricsAggregator::new());
        let coordinator = ShutdownCoordinator::with_timeout(Duration::from_millis(200));

        let user = user(client, SessionBootstrap::default(), metrics.clone());
        let guard = coordinator.track();
        let listener = coordinator.subscribe();
        let handle = tokio::spawn(async move {
            let iterations = user.run(listener).await;
            drop(guard);
            iterations
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        coordinator.shutdown().await.unwrap();

        assert_eq!(handle.await.unwrap(), 0);
        assert_eq!(metrics.snapshot().total_requests, 0);
    }
}

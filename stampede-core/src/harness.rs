//! Run orchestration: ramp-up, stop, report

use crate::bootstrap::SessionBootstrap;
use crate::catalog::{ScenarioCatalog, TagFilter};
use crate::error::HarnessError;
use crate::metrics::MetricsAggregator;
use crate::reporter::{RunMetadata, RunReport, RunReporter, Thresholds};
use crate::scheduler::{Pacing, TaskScheduler};
use crate::user::VirtualUser;
use chrono::Utc;
use stampede_config::StampedeConfig;
use stampede_http::{HttpClient, HttpError, HttpManager};
use stampede_resilience::{ShutdownCoordinator, ShutdownError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

/// Builds the HTTP client of one virtual user, keyed by user id
pub type ClientFactory =
    Arc<dyn Fn(u32) -> Result<Arc<dyn HttpClient>, HttpError> + Send + Sync>;

const MIN_RAMP_PERIOD: Duration = Duration::from_nanos(1);
const MAX_RAMP_PERIOD: Duration = Duration::from_secs(365 * 24 * 3600);

/// Delay between two user spawns, kept within what `tokio::time::interval` accepts
fn ramp_period(spawn_rate: f64) -> Duration {
    Duration::try_from_secs_f64(1.0 / spawn_rate)
        .unwrap_or(MAX_RAMP_PERIOD)
        .clamp(MIN_RAMP_PERIOD, MAX_RAMP_PERIOD)
}

/// A configured load run against one catalog
pub struct Harness {
    config: StampedeConfig,
    catalog: ScenarioCatalog,
    client_factory: ClientFactory,
}

impl Harness {
    /// Harness whose users each own a reqwest client built from `config.http`
    pub fn new(config: StampedeConfig, catalog: ScenarioCatalog) -> Self {
        let http_config: stampede_http::HttpConfig = config.http.clone().into();
        let client_factory: ClientFactory = Arc::new(move |_user_id| {
            let client = HttpManager::with_config(http_config.clone())?;
            Ok(Arc::new(client) as Arc<dyn HttpClient>)
        });

        Self {
            config,
            catalog,
            client_factory,
        }
    }

    pub fn with_client_factory(mut self, client_factory: ClientFactory) -> Self {
        self.client_factory = client_factory;
        self
    }

    pub fn config(&self) -> &StampedeConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ScenarioCatalog {
        &self.catalog
    }

    pub fn tag_filter(&self) -> TagFilter {
        TagFilter::new(
            self.config.run.tags.iter().cloned(),
            self.config.run.exclude_tags.iter().cloned(),
        )
    }

    /// Scheduler for the configured filter; fails on an empty candidate set
    pub fn scheduler(&self) -> Result<TaskScheduler, HarnessError> {
        Ok(TaskScheduler::new(&self.catalog, &self.tag_filter())?)
    }

    /// Run until the configured duration elapses or Ctrl-C arrives
    pub async fn run(&self) -> Result<RunReport, HarnessError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C, relying on run duration: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until the configured duration elapses or `stop` resolves
    pub async fn run_until<F>(&self, stop: F) -> Result<RunReport, HarnessError>
    where
        F: Future<Output = ()>,
    {
        let run = &self.config.run;
        let base_url = Url::parse(&run.host)?;
        let filter = self.tag_filter();
        let scheduler = TaskScheduler::new(&self.catalog, &filter)?;

        let seed = run.seed.unwrap_or_else(rand::random);
        // A run-level range replaces per-scenario ones as well
        let pacing = Pacing::from(run.pacing.unwrap_or_else(|| self.catalog.pacing()));
        let warmup = if run.skip_warmup {
            Vec::new()
        } else {
            self.catalog.warmup().targets_for(&filter)
        };

        let bootstrap = Arc::new(SessionBootstrap::new(&self.config.auth, warmup));
        if !bootstrap.has_credentials()
            && scheduler
                .candidates()
                .iter()
                .all(|scenario| scenario.definition.auth_required)
        {
            warn!("Every selected scenario requires auth but no API key is configured; users will idle");
        }

        let metrics = Arc::new(MetricsAggregator::new());
        let coordinator = ShutdownCoordinator::with_timeout(run.graceful_timeout);
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!("============================================================");
        info!("  Load test started");
        info!("  Host: {}", base_url);
        info!("  Start Time: {}", started_at.to_rfc3339());
        info!("  Run: {} (seed {})", run_id, seed);
        info!("  Catalog: {} ({})", self.catalog.name(), self.catalog.profile());
        info!("  Tags: {}", filter);
        info!(
            "  Users: {} at {}/s for {:?}",
            run.users, run.spawn_rate, run.duration
        );
        for (name, share) in scheduler.shares() {
            info!("    {:<24} {:>5.1}%", name, share * 100.0);
        }
        info!("============================================================");

        let mut handles: Vec<JoinHandle<u64>> = Vec::with_capacity(run.users as usize);
        let mut setup_error = None;

        let mut ramp = tokio::time::interval(ramp_period(run.spawn_rate));
        ramp.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = tokio::time::sleep(run.duration);
        tokio::pin!(deadline);
        tokio::pin!(stop);

        let mut next_id: u32 = 0;
        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("Run duration elapsed");
                    break;
                }
                _ = &mut stop => {
                    info!("Stop requested");
                    break;
                }
                _ = ramp.tick(), if next_id < run.users => {
                    let client = match (self.client_factory)(next_id) {
                        Ok(client) => client,
                        Err(e) => {
                            error!(user_id = next_id, "Cannot build HTTP client: {}", e);
                            setup_error = Some(e);
                            break;
                        }
                    };

                    let mut user = VirtualUser::new(
                        next_id,
                        client,
                        base_url.clone(),
                        scheduler.clone(),
                        Arc::clone(&bootstrap),
                        Arc::clone(&metrics),
                        pacing,
                        run.expected_timeout_threshold,
                        seed,
                    );
                    if run.pacing.is_some() {
                        user = user.with_fixed_pacing();
                    }
                    let guard = coordinator.track();
                    let listener = coordinator.subscribe();
                    handles.push(tokio::spawn(async move {
                        let _guard = guard;
                        user.run(listener).await
                    }));

                    next_id += 1;
                    if next_id == run.users {
                        info!("All {} users spawned", run.users);
                    }
                }
            }
        }

        match coordinator.shutdown().await {
            Ok(()) => {}
            Err(ShutdownError::TasksRemaining(remaining)) => {
                warn!("Aborting {} users that ignored the forced stop", remaining);
                for handle in &handles {
                    handle.abort();
                }
            }
            Err(e) => warn!("Shutdown: {}", e),
        }

        let iterations: u64 = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter_map(Result::ok)
            .sum();

        if let Some(e) = setup_error {
            return Err(e.into());
        }

        let snapshot = metrics.snapshot();
        let ended_at = Utc::now();
        info!(
            "Load test finished at {} after {} iterations",
            ended_at.to_rfc3339(),
            iterations
        );

        let thresholds = Thresholds::for_profile(
            self.catalog.profile(),
            self.config.report.max_failure_ratio,
            self.config.report.max_p99_ms,
        );
        let reporter = RunReporter::new(&self.catalog, thresholds);
        let report = reporter.build_report(
            RunMetadata {
                run_id,
                seed,
                host: base_url.to_string(),
                users: next_id,
                tags: run.tags.clone(),
                started_at,
                ended_at,
            },
            snapshot,
        );
        RunReporter::log_summary(&report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogProfile, ScenarioDefinition};
    use crate::classifier::ClassifierPolicy;
    use serde_json::json;
    use stampede_config::PacingOverride;
    use stampede_http::mock::{MockHttpClient, MockResponse};
    use stampede_http::HttpMethod;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn catalog() -> ScenarioCatalog {
        let mut catalog = ScenarioCatalog::new("test", CatalogProfile::Steady);
        catalog.add_policy("plain", ClassifierPolicy::default());
        catalog
            .register(
                ScenarioDefinition::new("read", HttpMethod::Get, "/read/{id}")
                    .policy("plain")
                    .tags(["v3"])
                    .param("id", ["1", "2"]),
            )
            .unwrap();
        catalog
    }

    fn config(users: u32, duration: Duration) -> StampedeConfig {
        let mut config = StampedeConfig::default();
        config.run.host = "http://target".into();
        config.run.users = users;
        config.run.spawn_rate = 10.0;
        config.run.duration = duration;
        config.run.graceful_timeout = Duration::from_secs(1);
        config.run.seed = Some(7);
        config.run.pacing = Some(PacingOverride {
            min_wait: 0.1,
            max_wait: 0.2,
        });
        config
    }

    fn shared_client(client: Arc<MockHttpClient>, built: Arc<AtomicU32>) -> ClientFactory {
        Arc::new(move |_| {
            built.fetch_add(1, Ordering::SeqCst);
            Ok(client.clone() as Arc<dyn HttpClient>)
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ramps_users_and_reports() {
        let client = Arc::new(
            MockHttpClient::new()
                .with_mock(HttpMethod::Get, "/read/", MockResponse::json(200, json!({"ok": true}))),
        );
        let built = Arc::new(AtomicU32::new(0));
        let harness = Harness::new(config(3, Duration::from_secs(5)), catalog())
            .with_client_factory(shared_client(client.clone(), built.clone()));

        let report = harness.run_until(std::future::pending()).await.unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 3);
        assert_eq!(report.users, 3);
        assert_eq!(report.seed, 7);
        assert_eq!(report.totals.total_requests as usize, client.request_count());
        assert!(report.totals.total_requests > 0);
        assert_eq!(report.totals.total_failures, 0);
        assert!(!report.has_alerts());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_filter_fails_before_any_user() {
        let client = Arc::new(MockHttpClient::new());
        let built = Arc::new(AtomicU32::new(0));
        let mut config = config(3, Duration::from_secs(5));
        config.run.tags = vec!["nope".into()];

        let harness = Harness::new(config, catalog())
            .with_client_factory(shared_client(client.clone(), built.clone()));
        let err = harness.run_until(std::future::pending()).await.unwrap_err();

        assert!(matches!(err, HarnessError::Scheduler(_)));
        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_future_ends_run_early() {
        let client = Arc::new(
            MockHttpClient::new()
                .with_mock(HttpMethod::Get, "/read/", MockResponse::json(200, json!({}))),
        );
        let harness = Harness::new(config(50, Duration::from_secs(600)), catalog())
            .with_client_factory(shared_client(client, Arc::new(AtomicU32::new(0))));

        let started = tokio::time::Instant::now();
        let report = harness
            .run_until(tokio::time::sleep(Duration::from_millis(450)))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(report.users < 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_requests_are_abandoned_after_graceful_timeout() {
        let client = Arc::new(MockHttpClient::new().with_mock(
            HttpMethod::Get,
            "/read/",
            MockResponse::json(200, json!({})).with_delay(Duration::from_secs(3600)),
        ));
        let harness = Harness::new(config(2, Duration::from_secs(2)), catalog())
            .with_client_factory(shared_client(client, Arc::new(AtomicU32::new(0))));

        let started = tokio::time::Instant::now();
        let report = harness.run_until(std::future::pending()).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(report.totals.total_requests, 0);
    }

    #[test]
    fn test_ramp_period_bounds() {
        assert_eq!(ramp_period(10.0), Duration::from_millis(100));
        assert_eq!(ramp_period(1e10), MIN_RAMP_PERIOD);
        assert_eq!(ramp_period(f64::INFINITY), MIN_RAMP_PERIOD);
        assert_eq!(ramp_period(1e-300), MAX_RAMP_PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extreme_spawn_rate_spawns_every_user() {
        let client = Arc::new(
            MockHttpClient::new()
                .with_mock(HttpMethod::Get, "/read/", MockResponse::json(200, json!({}))),
        );
        let built = Arc::new(AtomicU32::new(0));
        let mut config = config(3, Duration::from_secs(1));
        config.run.spawn_rate = 1e10;
        config.validate_all().unwrap();

        let harness = Harness::new(config, catalog())
            .with_client_factory(shared_client(client, built.clone()));
        let report = harness.run_until(std::future::pending()).await.unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 3);
        assert_eq!(report.users, 3);
    }

    #[tokio::test]
    async fn test_client_setup_failure_is_reported() {
        let harness = Harness::new(config(2, Duration::from_secs(5)), catalog())
            .with_client_factory(Arc::new(|_| Err(HttpError::ConfigError("bad tls".into()))));

        let err = harness.run_until(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, HarnessError::Http(_)));
    }
}

//! End-of-run reporting and threshold alerts

use crate::catalog::{CatalogProfile, ScenarioCatalog};
use crate::metrics::{LatencySummary, MetricsSnapshot, ScenarioSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

const RULE: &str = "============================================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    FailureRatio,
    P99Latency,
}

/// Informational threshold breach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    /// `tag: cause` entries drawn from the catalog hints
    pub likely_causes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub max_failure_ratio: f64,
    pub max_p99_ms: f64,
}

impl Thresholds {
    /// Explicit ratio if given, otherwise the profile default
    pub fn for_profile(profile: CatalogProfile, max_failure_ratio: Option<f64>, max_p99_ms: f64) -> Self {
        Self {
            max_failure_ratio: max_failure_ratio.unwrap_or(profile.default_failure_threshold()),
            max_p99_ms,
        }
    }
}

/// Run facts that do not come from the metrics
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub seed: u64,
    pub host: String,
    pub users: u32,
    pub tags: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub total_requests: u64,
    pub total_failures: u64,
    pub expected_exceptions: u64,
    pub failure_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub overall_rps: f64,
    pub current_rps: f64,
}

/// Machine-readable run summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub seed: u64,
    pub catalog: String,
    pub profile: CatalogProfile,
    pub host: String,
    pub users: u32,
    pub tags: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub totals: ReportTotals,
    pub latency: LatencySummary,
    pub throughput: Throughput,
    pub thresholds: Thresholds,
    pub scenarios: Vec<ScenarioSnapshot>,
    pub failure_reasons: BTreeMap<String, u64>,
    pub alerts: Vec<Alert>,
}

impl RunReport {
    pub fn has_alerts(&self) -> bool {
        !self.alerts.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Turns the final snapshot into a [`RunReport`]
#[derive(Debug, Clone)]
pub struct RunReporter {
    thresholds: Thresholds,
    catalog_name: String,
    profile: CatalogProfile,
    hints: BTreeMap<String, String>,
    scenario_tags: BTreeMap<String, BTreeSet<String>>,
}

impl RunReporter {
    pub fn new(catalog: &ScenarioCatalog, thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            catalog_name: catalog.name().to_string(),
            profile: catalog.profile(),
            hints: catalog.hints().clone(),
            scenario_tags: catalog
                .scenarios()
                .iter()
                .map(|scenario| (scenario.name().to_string(), scenario.tags().clone()))
                .collect(),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Alerts raised by `snapshot`; never fatal
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if snapshot.failure_ratio > self.thresholds.max_failure_ratio {
            let failing: Vec<&ScenarioSnapshot> = snapshot
                .scenarios
                .iter()
                .filter(|scenario| scenario.failure_ratio > self.thresholds.max_failure_ratio)
                .collect();
            alerts.push(Alert {
                kind: AlertKind::FailureRatio,
                message: format!(
                    "Failure rate {:.2}% exceeded {:.2}%",
                    snapshot.failure_ratio * 100.0,
                    self.thresholds.max_failure_ratio * 100.0
                ),
                likely_causes: self.attribute(&failing, snapshot),
            });
        }

        if snapshot.latency.p99_ms > self.thresholds.max_p99_ms {
            let slow: Vec<&ScenarioSnapshot> = snapshot
                .scenarios
                .iter()
                .filter(|scenario| scenario.latency.p99_ms > self.thresholds.max_p99_ms)
                .collect();
            alerts.push(Alert {
                kind: AlertKind::P99Latency,
                message: format!(
                    "P99 response time {:.0}ms exceeded {:.0}ms",
                    snapshot.latency.p99_ms, self.thresholds.max_p99_ms
                ),
                likely_causes: self.attribute(&slow, snapshot),
            });
        }

        alerts
    }

    // Hinted tags of the offending scenarios; if none of them carries a hint,
    // every hint relevant to a scenario that ran at all.
    fn attribute(&self, offenders: &[&ScenarioSnapshot], snapshot: &MetricsSnapshot) -> Vec<String> {
        let causes = self.causes_for(offenders.iter().map(|scenario| scenario.name.as_str()));
        if !causes.is_empty() {
            return causes;
        }
        self.causes_for(snapshot.scenarios.iter().map(|scenario| scenario.name.as_str()))
    }

    fn causes_for<'a>(&self, scenarios: impl Iterator<Item = &'a str>) -> Vec<String> {
        let tags: BTreeSet<&String> = scenarios
            .filter_map(|name| self.scenario_tags.get(name))
            .flatten()
            .collect();
        tags.into_iter()
            .filter_map(|tag| self.hints.get(tag).map(|cause| format!("{}: {}", tag, cause)))
            .collect()
    }

    pub fn build_report(&self, metadata: RunMetadata, snapshot: MetricsSnapshot) -> RunReport {
        let alerts = self.evaluate(&snapshot);
        let duration_secs = (metadata.ended_at - metadata.started_at)
            .to_std()
            .map(|duration| duration.as_secs_f64())
            .unwrap_or(0.0);

        RunReport {
            run_id: metadata.run_id,
            seed: metadata.seed,
            catalog: self.catalog_name.clone(),
            profile: self.profile,
            host: metadata.host,
            users: metadata.users,
            tags: metadata.tags,
            started_at: metadata.started_at,
            ended_at: metadata.ended_at,
            duration_secs,
            totals: ReportTotals {
                total_requests: snapshot.total_requests,
                total_failures: snapshot.total_failures,
                expected_exceptions: snapshot.expected_exceptions,
                failure_ratio: snapshot.failure_ratio,
            },
            latency: snapshot.latency,
            throughput: Throughput {
                overall_rps: snapshot.overall_rps,
                current_rps: snapshot.current_rps,
            },
            thresholds: self.thresholds,
            scenarios: snapshot.scenarios,
            failure_reasons: snapshot.failure_reasons,
            alerts,
        }
    }

    /// Human-readable summary block
    pub fn log_summary(report: &RunReport) {
        info!("{}", RULE);
        info!("  Test Summary ({} / {})", report.catalog, report.profile);
        info!("{}", RULE);
        info!("  Total Requests: {}", report.totals.total_requests);
        info!("  Failures: {}", report.totals.total_failures);
        info!("  Expected Exceptions: {}", report.totals.expected_exceptions);
        info!("  Failure Rate: {:.2}%", report.totals.failure_ratio * 100.0);
        info!("  Median Response Time: {:.0}ms", report.latency.median_ms);
        info!("  P95 Response Time: {:.0}ms", report.latency.p95_ms);
        info!("  P99 Response Time: {:.0}ms", report.latency.p99_ms);
        info!(
            "  Min/Avg/Max Response Time: {:.2}/{:.2}/{:.2}ms",
            report.latency.min_ms, report.latency.avg_ms, report.latency.max_ms
        );
        info!(
            "  RPS: {:.2} (last window {:.2})",
            report.throughput.overall_rps, report.throughput.current_rps
        );

        for scenario in &report.scenarios {
            info!(
                "  {:<24} {:>8} req {:>6} fail {:>6} expected  p95 {:.0}ms",
                scenario.name,
                scenario.requests,
                scenario.failures,
                scenario.expected_exceptions,
                scenario.latency.p95_ms
            );
        }
        for (reason, count) in &report.failure_reasons {
            info!("  {:>8} x {}", count, reason);
        }

        for alert in &report.alerts {
            warn!("  [ALERT] {}", alert.message);
            for cause in &alert.likely_causes {
                warn!("    - {}", cause);
            }
        }
        info!("{}", RULE);
    }
}

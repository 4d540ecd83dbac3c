//! Shared metrics aggregation
//!
//! One [`MetricsAggregator`] is shared by every virtual user. Outcomes are
//! folded into running aggregates under a short mutex section and never
//! retained individually. Latencies go into HDR histograms recorded in
//! microseconds with 3 significant figures, so reported percentiles are
//! within 0.1% of the exact value while memory stays bounded regardless of
//! run length.

use crate::outcome::{ExtractedMetrics, RequestOutcome, Verdict};
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

/// Highest trackable latency: one hour, in microseconds
const MAX_TRACKABLE_MICROS: u64 = 3_600_000_000;
const SIGNIFICANT_FIGURES: u8 = 3;
const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Latency distribution plus exact min/max/sum
struct LatencyStats {
    histogram: Histogram<u64>,
    count: u64,
    failures: u64,
    expected_exceptions: u64,
    sum_ms: f64,
    min_ms: f64,
    max_ms: f64,
}

impl LatencyStats {
    fn new() -> Self {
        Self {
            histogram: Histogram::new_with_bounds(1, MAX_TRACKABLE_MICROS, SIGNIFICANT_FIGURES)
                .expect("static histogram bounds are valid"),
            count: 0,
            failures: 0,
            expected_exceptions: 0,
            sum_ms: 0.0,
            min_ms: f64::INFINITY,
            max_ms: 0.0,
        }
    }

    fn record(&mut self, outcome: &RequestOutcome) {
        let micros = u64::try_from(outcome.elapsed.as_micros()).unwrap_or(u64::MAX);
        self.histogram.saturating_record(micros.max(1));

        let elapsed_ms = outcome.elapsed_ms();
        self.count += 1;
        self.sum_ms += elapsed_ms;
        self.min_ms = self.min_ms.min(elapsed_ms);
        self.max_ms = self.max_ms.max(elapsed_ms);

        match outcome.verdict {
            Verdict::Failure(_) => self.failures += 1,
            Verdict::ExpectedException { .. } => self.expected_exceptions += 1,
            Verdict::Success => {}
        }
    }

    fn percentile_ms(&self, quantile: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.histogram.value_at_quantile(quantile) as f64 / 1000.0
    }

    fn latency(&self) -> LatencySummary {
        if self.count == 0 {
            return LatencySummary::default();
        }
        LatencySummary {
            min_ms: self.min_ms,
            avg_ms: self.sum_ms / self.count as f64,
            max_ms: self.max_ms,
            median_ms: self.percentile_ms(0.50),
            p95_ms: self.percentile_ms(0.95),
            p99_ms: self.percentile_ms(0.99),
        }
    }

    fn failure_ratio(&self) -> f64 {
        ratio(self.failures, self.count)
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

struct ScenarioAccumulator {
    latency: LatencyStats,
    last_page: Option<ExtractedMetrics>,
}

struct MetricsState {
    overall: LatencyStats,
    scenarios: BTreeMap<String, ScenarioAccumulator>,
    failure_reasons: BTreeMap<String, u64>,
    /// Request counts per whole second since start, oldest first
    recent: VecDeque<(u64, u64)>,
}

/// Latency figures in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatencySummary {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Per-scenario breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSnapshot {
    pub name: String,
    pub requests: u64,
    pub failures: u64,
    pub expected_exceptions: u64,
    pub failure_ratio: f64,
    pub latency: LatencySummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_page: Option<ExtractedMetrics>,
}

/// Point-in-time view of the aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_failures: u64,
    pub expected_exceptions: u64,
    pub failure_ratio: f64,
    pub latency: LatencySummary,
    /// Requests per second over the whole run
    pub overall_rps: f64,
    /// Requests per second over the sliding window
    pub current_rps: f64,
    pub elapsed_secs: f64,
    pub scenarios: Vec<ScenarioSnapshot>,
    pub failure_reasons: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn scenario(&self, name: &str) -> Option<&ScenarioSnapshot> {
        self.scenarios.iter().find(|scenario| scenario.name == name)
    }
}

/// Thread-safe accumulator shared by all virtual users
pub struct MetricsAggregator {
    state: Mutex<MetricsState>,
    started: Instant,
    window: Duration,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Aggregator whose current throughput covers `window`
    pub fn with_window(window: Duration) -> Self {
        Self {
            state: Mutex::new(MetricsState {
                overall: LatencyStats::new(),
                scenarios: BTreeMap::new(),
                failure_reasons: BTreeMap::new(),
                recent: VecDeque::new(),
            }),
            started: Instant::now(),
            window: window.max(Duration::from_secs(1)),
        }
    }

    /// Fold one outcome into the aggregates
    pub fn record(&self, outcome: &RequestOutcome) {
        let reason = outcome.failure_reason().map(ToString::to_string);

        let mut guard = self.state.lock();
        // Read under the lock so buckets are pushed in order
        let second = self.started.elapsed().as_secs();
        let state = &mut *guard;
        state.overall.record(outcome);

        let scenario = state
            .scenarios
            .entry(outcome.scenario.clone())
            .or_insert_with(|| ScenarioAccumulator {
                latency: LatencyStats::new(),
                last_page: None,
            });
        scenario.latency.record(outcome);
        if outcome.extracted.is_some() {
            scenario.last_page = outcome.extracted;
        }

        if let Some(reason) = reason {
            *state.failure_reasons.entry(reason).or_insert(0) += 1;
        }

        let same_second = state
            .recent
            .back()
            .is_some_and(|(bucket, _)| *bucket == second);
        if !same_second {
            state.recent.push_back((second, 0));
        }
        if let Some((_, count)) = state.recent.back_mut() {
            *count += 1;
        }
        let horizon = second.saturating_sub(self.window.as_secs());
        while state
            .recent
            .front()
            .is_some_and(|(bucket, _)| *bucket < horizon)
        {
            state.recent.pop_front();
        }
    }

    /// Summary of everything recorded so far
    pub fn snapshot(&self) -> MetricsSnapshot {
        let elapsed = self.started.elapsed();
        let now_second = elapsed.as_secs();
        let window_secs = self.window.as_secs();

        let state = self.state.lock();

        let window_start = now_second.saturating_sub(window_secs);
        let in_window: u64 = state
            .recent
            .iter()
            .filter(|(bucket, _)| *bucket >= window_start)
            .map(|(_, count)| count)
            .sum();
        // Short runs divide by their actual length, not the full window
        let window_span = elapsed.as_secs_f64().min(self.window.as_secs_f64());

        let scenarios = state
            .scenarios
            .iter()
            .map(|(name, accumulator)| ScenarioSnapshot {
                name: name.clone(),
                requests: accumulator.latency.count,
                failures: accumulator.latency.failures,
                expected_exceptions: accumulator.latency.expected_exceptions,
                failure_ratio: accumulator.latency.failure_ratio(),
                latency: accumulator.latency.latency(),
                last_page: accumulator.last_page,
            })
            .collect();

        MetricsSnapshot {
            total_requests: state.overall.count,
            total_failures: state.overall.failures,
            expected_exceptions: state.overall.expected_exceptions,
            failure_ratio: state.overall.failure_ratio(),
            latency: state.overall.latency(),
            overall_rps: per_second(state.overall.count, elapsed.as_secs_f64()),
            current_rps: per_second(in_window, window_span),
            elapsed_secs: elapsed.as_secs_f64(),
            scenarios,
            failure_reasons: state.failure_reasons.clone(),
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn per_second(count: u64, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        0.0
    } else {
        count as f64 / seconds
    }
}

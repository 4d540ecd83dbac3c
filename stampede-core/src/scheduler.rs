//! Weighted scenario selection and pacing

use crate::catalog::{Scenario, ScenarioCatalog, TagFilter};
use crate::error::SchedulerError;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use stampede_config::PacingOverride;
use std::sync::Arc;
use std::time::Duration;

/// Candidate scenarios with their weighted distribution
///
/// Built once per run; an empty candidate set is rejected here, before any
/// user starts.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    candidates: Vec<Arc<Scenario>>,
    distribution: WeightedIndex<u32>,
}

impl TaskScheduler {
    /// Scheduler over the enabled scenarios of `catalog` matching `filter`
    pub fn new(catalog: &ScenarioCatalog, filter: &TagFilter) -> Result<Self, SchedulerError> {
        Self::from_candidates(catalog.candidates(filter)).ok_or_else(|| {
            SchedulerError::NoMatchingScenarios {
                filter: filter.to_string(),
            }
        })?
    }

    /// `None` when no candidate has a positive weight
    fn from_candidates(candidates: Vec<Arc<Scenario>>) -> Option<Result<Self, SchedulerError>> {
        let candidates: Vec<_> = candidates
            .into_iter()
            .filter(|scenario| scenario.weight() > 0)
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let distribution = WeightedIndex::new(candidates.iter().map(|scenario| scenario.weight()))
            .map_err(|e| SchedulerError::InvalidWeights(e.to_string()));
        Some(distribution.map(|distribution| Self {
            candidates,
            distribution,
        }))
    }

    /// Reduced scheduler keeping only the scenarios `keep` accepts
    ///
    /// Returns `None` when nothing is left.
    pub fn restricted(&self, keep: impl Fn(&Scenario) -> bool) -> Option<Self> {
        let kept = self
            .candidates
            .iter()
            .filter(|scenario| keep(scenario))
            .cloned()
            .collect();
        Self::from_candidates(kept).and_then(Result::ok)
    }

    /// Draw one scenario proportionally to its weight
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> &Arc<Scenario> {
        &self.candidates[self.distribution.sample(rng)]
    }

    pub fn candidates(&self) -> &[Arc<Scenario>] {
        &self.candidates
    }

    /// Selection probability of each candidate
    pub fn shares(&self) -> Vec<(&str, f64)> {
        let total: u64 = self
            .candidates
            .iter()
            .map(|scenario| u64::from(scenario.weight()))
            .sum();
        self.candidates
            .iter()
            .map(|scenario| {
                (
                    scenario.name(),
                    f64::from(scenario.weight()) / total as f64,
                )
            })
            .collect()
    }
}

/// Wait between two iterations of a user, drawn uniformly from `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    /// No pause at all: maximum-throughput mode
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let drawn = rng.random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::try_from_secs_f64(drawn)
            .unwrap_or(self.max)
            .clamp(self.min, self.max)
    }
}

/// Negative and NaN waits become zero, unrepresentable ones saturate
impl From<PacingOverride> for Pacing {
    fn from(pacing: PacingOverride) -> Self {
        let seconds =
            |value: f64| Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX);
        Self::new(seconds(pacing.min_wait), seconds(pacing.max_wait))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogProfile, ScenarioDefinition};
    use crate::classifier::ClassifierPolicy;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use stampede_http::HttpMethod;

    fn catalog(entries: &[(&str, &[&str], u32)]) -> ScenarioCatalog {
        let mut catalog = ScenarioCatalog::new("test", CatalogProfile::Steady);
        catalog.add_policy("plain", ClassifierPolicy::default());
        for (name, tags, weight) in entries {
            catalog
                .register(
                    ScenarioDefinition::new(*name, HttpMethod::Get, format!("/{}", name))
                        .policy("plain")
                        .tags(tags.iter().copied())
                        .weight(*weight),
                )
                .unwrap();
        }
        catalog
    }

    #[test]
    fn test_weighted_selection_converges() {
        let catalog = catalog(&[("a", &["x"], 3), ("b", &["x"], 1)]);
        let scheduler = TaskScheduler::new(&catalog, &TagFilter::all()).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let draws = 10_000;
        let a = (0..draws)
            .filter(|_| scheduler.select(&mut rng).name() == "a")
            .count();
        let share = a as f64 / draws as f64;
        assert!((0.70..=0.80).contains(&share), "share of a was {share}");
    }

    #[test]
    fn test_zero_weight_is_never_selected() {
        let catalog = catalog(&[("on", &["x"], 1), ("off", &["x"], 0)]);
        let scheduler = TaskScheduler::new(&catalog, &TagFilter::all()).unwrap();
        assert_eq!(scheduler.candidates().len(), 1);

        let mut rng = StdRng::seed_from_u64(1);
        assert!((0..1000).all(|_| scheduler.select(&mut rng).name() == "on"));
    }

    #[test]
    fn test_empty_filter_is_a_config_error() {
        let catalog = catalog(&[("a", &["v3"], 1), ("off", &["v9"], 0)]);

        for tags in [vec!["missing"], vec!["v9"]] {
            let filter = TagFilter::new(tags, Vec::<String>::new());
            let err = TaskScheduler::new(&catalog, &filter).unwrap_err();
            assert!(matches!(err, SchedulerError::NoMatchingScenarios { .. }));
        }
    }

    #[test]
    fn test_restricted_scheduler() {
        let catalog = catalog(&[("a", &["x"], 1), ("b", &["x"], 1)]);
        let scheduler = TaskScheduler::new(&catalog, &TagFilter::all()).unwrap();

        let only_b = scheduler.restricted(|scenario| scenario.name() == "b").unwrap();
        assert_eq!(only_b.candidates().len(), 1);
        assert!(scheduler.restricted(|_| false).is_none());
    }

    #[test]
    fn test_seeded_selection_is_reproducible() {
        let catalog = catalog(&[("a", &["x"], 2), ("b", &["x"], 5), ("c", &["x"], 1)]);
        let scheduler = TaskScheduler::new(&catalog, &TagFilter::all()).unwrap();

        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..100)
                .map(|_| scheduler.select(&mut rng).name().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));

        let shares = scheduler.shares();
        assert_eq!(shares[1], ("b", 0.625));
    }

    #[test]
    fn test_pacing_sampling() {
        let mut rng = StdRng::seed_from_u64(3);
        let none = Pacing::none();
        assert_eq!(none.sample(&mut rng), Duration::ZERO);

        let pacing = Pacing::from(PacingOverride {
            min_wait: 0.1,
            max_wait: 0.5,
        });
        for _ in 0..1000 {
            let wait = pacing.sample(&mut rng);
            assert!(wait >= Duration::from_millis(100) && wait <= Duration::from_millis(500));
        }

        let fixed = Pacing::new(Duration::from_millis(250), Duration::from_millis(250));
        assert_eq!(fixed.sample(&mut rng), Duration::from_millis(250));
    }

    #[test]
    fn test_pacing_from_out_of_range_waits() {
        let mut rng = StdRng::seed_from_u64(5);
        let huge = Pacing::from(PacingOverride {
            min_wait: 0.0,
            max_wait: 1e20,
        });
        assert_eq!(huge.max(), Duration::MAX);
        for _ in 0..100 {
            assert!(huge.sample(&mut rng) >= huge.min());
        }

        let nonsense = Pacing::from(PacingOverride {
            min_wait: f64::NAN,
            max_wait: -3.0,
        });
        assert_eq!(nonsense, Pacing::none());
    }
}

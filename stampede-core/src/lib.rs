//! Core engine for Stampede
//!
//! A run is a set of virtual users. Each one bootstraps its session, then
//! loops over weighted scenarios drawn from a [`ScenarioCatalog`], classifies
//! every response and folds the outcome into a shared [`MetricsAggregator`].
//! When the run stops, [`RunReporter`] turns the final snapshot into a
//! machine-readable [`RunReport`] with threshold alerts.

pub mod bootstrap;
pub mod catalog;
pub mod classifier;
pub mod error;
pub mod harness;
pub mod metrics;
pub mod outcome;
pub mod reporter;
pub mod scheduler;
pub mod user;

pub use bootstrap::{BootstrapResult, SessionBootstrap};
pub use catalog::{
    CatalogFile, CatalogProfile, Scenario, ScenarioCatalog, ScenarioDefinition, TagFilter,
    WarmupPlan, WarmupTarget,
};
pub use classifier::{classify, classify_transport_error, ClassifierPolicy, ClassifyContext};
pub use error::{CatalogError, HarnessError, SchedulerError};
pub use harness::{ClientFactory, Harness};
pub use metrics::{MetricsAggregator, MetricsSnapshot, ScenarioSnapshot};
pub use outcome::{Classification, ExtractedMetrics, FailureReason, RequestOutcome, Verdict};
pub use reporter::{Alert, AlertKind, RunMetadata, RunReport, RunReporter, Thresholds};
pub use scheduler::{Pacing, TaskScheduler};
pub use user::{UserState, VirtualUser};

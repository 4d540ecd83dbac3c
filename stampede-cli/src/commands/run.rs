//! `stampede run`

use crate::cli::RunArgs;
use anyhow::{Context, Result};
use stampede_config::StampedeConfig;
use stampede_core::{Harness, ScenarioCatalog};
use std::process::ExitCode;
use tracing::{info, warn};

/// Exit status when `--fail-on-alert` is set and an alert fired
pub const ALERT_EXIT_CODE: u8 = 2;

pub async fn execute(mut config: StampedeConfig, args: &RunArgs) -> Result<ExitCode> {
    args.apply(&mut config);

    let catalog = ScenarioCatalog::load(&config.run.catalog)
        .with_context(|| format!("Failed to load catalog '{}'", config.run.catalog))?;
    if let Some(pacing) = args.pacing(config.run.pacing.unwrap_or_else(|| catalog.pacing())) {
        config.run.pacing = Some(pacing);
    }
    config
        .validate_all()
        .context("Invalid configuration after command-line overrides")?;

    let harness = Harness::new(config, catalog);
    let report = harness.run().await.context("Load run failed")?;

    let json = report
        .to_json()
        .context("Failed to format run report as JSON")?;
    println!("{}", json);

    let report_config = &harness.config().report;
    if let Some(path) = &report_config.output {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write run report to {:?}", path))?;
        info!("Run report written to {:?}", path);
    }

    if report_config.fail_on_alert && report.has_alerts() {
        warn!("{} alert(s) fired, failing the run", report.alerts.len());
        return Ok(ExitCode::from(ALERT_EXIT_CODE));
    }
    Ok(ExitCode::SUCCESS)
}

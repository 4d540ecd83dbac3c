//! `stampede config`

use crate::cli::ConfigCommands;
use anyhow::{anyhow, Context, Result};
use stampede_config::{ConfigLoader, StampedeConfig};
use stampede_core::{Harness, ScenarioCatalog};
use std::path::Path;

pub fn execute(command: &ConfigCommands, config_path: Option<&Path>) -> Result<()> {
    match command {
        ConfigCommands::Validate => {
            let path = config_path.ok_or_else(|| anyhow!("config validate needs --config PATH"))?;
            let summary = validate(path)?;
            println!("{}", summary);
            Ok(())
        }
        ConfigCommands::Sample { output, force } => sample(output.as_deref(), *force),
    }
}

/// Load, validate and check that the configured tag filter selects something
pub fn validate(path: &Path) -> Result<String> {
    let config = ConfigLoader::new()
        .from_file(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;

    let catalog = ScenarioCatalog::load(&config.run.catalog)
        .with_context(|| format!("Failed to load catalog '{}'", config.run.catalog))?;
    let run = &config.run;
    let summary = format!(
        "Configuration is valid: {} users at {}/s for {:?} against {} using catalog '{}'",
        run.users,
        run.spawn_rate,
        run.duration,
        run.host,
        catalog.name()
    );

    let harness = Harness::new(config, catalog);
    let scheduler = harness.scheduler()?;
    Ok(format!(
        "{} ({} candidate scenarios)",
        summary,
        scheduler.candidates().len()
    ))
}

pub fn sample(output: Option<&Path>, force: bool) -> Result<()> {
    let sample = StampedeConfig::generate_sample();
    match output {
        None => print!("{}", sample),
        Some(path) => {
            if path.exists() && !force {
                return Err(anyhow!(
                    "{:?} already exists. Use --force to overwrite",
                    path
                ));
            }
            std::fs::write(path, sample)
                .with_context(|| format!("Failed to write sample configuration to {:?}", path))?;
            println!("Sample configuration written to {:?}", path);
        }
    }
    Ok(())
}

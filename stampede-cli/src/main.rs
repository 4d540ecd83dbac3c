use anyhow::{Context, Result};
use clap::Parser;
use stampede_config::{ConfigLoader, LoggingConfig, StampedeConfig};
use stampede_logging::{init_logging_from_config, init_simple_tracing, LogLevel};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, info};

mod cli;
mod commands;
use cli::{Cli, Commands};
use commands::scenarios::ScenariosArgs;

/// Load configuration from file or use defaults
fn load_config(config_path: Option<&Path>) -> Result<StampedeConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) if path.exists() => loader
            .from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        Some(path) => {
            eprintln!("Configuration file not found: {:?}. Using defaults.", path);
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
        None => loader
            .from_env()
            .context("Failed to load configuration from environment"),
    }
}

/// Initialize logging from configuration with fallback to simple tracing
fn init_logging(config: &LoggingConfig, log_level: Option<&str>) {
    let mut logging = config.clone();
    if let Some(level) = log_level {
        match level.parse::<LogLevel>() {
            Ok(level) => logging.level = level,
            Err(e) => eprintln!("{}, keeping '{}'", e, logging.level),
        }
    }

    if let Err(e) = init_logging_from_config(&logging) {
        eprintln!(
            "Failed to initialize structured logging: {}, falling back to simple tracing",
            e
        );
        let _ = init_simple_tracing(logging.level.as_str());
    }
    debug!("Logging initialized at {}", logging.level);
}

/// Configuration and logging shared by the commands that talk to a target
fn startup(config_path: Option<&Path>, log_level: Option<&str>) -> Result<StampedeConfig> {
    let config = load_config(config_path)?;
    init_logging(&config.logging, log_level);
    info!("Stampede {} starting", env!("CARGO_PKG_VERSION"));
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let Cli {
        config: config_path,
        log_level,
        command,
    } = Cli::parse();

    match command {
        Commands::Run(args) => {
            let config = startup(config_path.as_deref(), log_level.as_deref())?;
            commands::run::execute(config, &args).await
        }
        Commands::Scenarios {
            catalog,
            tags,
            exclude_tags,
            yaml,
        } => {
            let config = startup(config_path.as_deref(), log_level.as_deref())?;
            commands::scenarios::execute(
                &config,
                ScenariosArgs {
                    catalog: catalog.as_deref(),
                    tags: &tags,
                    exclude_tags: &exclude_tags,
                    yaml,
                },
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { config_cmd } => {
            let _ = init_simple_tracing(log_level.as_deref().unwrap_or("warn"));
            commands::config::execute(&config_cmd, config_path.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

use anyhow::Result;
use stampede_config::domains::logging::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(config.level.as_str()))
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // Use try_init to avoid panic if global subscriber already set
    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    if tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(log_level))
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Filter from the given directive, then `RUST_LOG`, then `info`
pub fn build_env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

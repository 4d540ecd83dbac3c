//! CLI argument parsing definitions

use clap::{Args, Parser, Subcommand};
use stampede_config::{PacingOverride, StampedeConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a load test against the target host
    Run(RunArgs),

    /// List a catalog and the scenarios a tag filter selects
    Scenarios {
        /// Built-in catalog name (steady, nightmare) or catalog file path
        #[arg(long, value_name = "NAME|PATH")]
        catalog: Option<String>,

        /// Comma-separated tag filter
        #[arg(long, value_name = "TAGS", value_delimiter = ',')]
        tags: Vec<String>,

        /// Comma-separated tags to exclude
        #[arg(long, value_name = "TAGS", value_delimiter = ',')]
        exclude_tags: Vec<String>,

        /// Print the whole catalog as YAML instead of a listing
        #[arg(long)]
        yaml: bool,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Base URL of the target service
    #[arg(long, value_name = "URL")]
    pub host: Option<String>,

    /// Number of concurrent virtual users
    #[arg(short = 'u', long, value_name = "USERS")]
    pub users: Option<u32>,

    /// Users started per second during ramp-up
    #[arg(short = 'r', long, value_name = "RATE")]
    pub spawn_rate: Option<f64>,

    /// Run duration (e.g. 60s, 5m)
    #[arg(short = 't', long, value_name = "DURATION", value_parser = stampede_config::parse_duration)]
    pub duration: Option<Duration>,

    /// Comma-separated tag filter
    #[arg(long, value_name = "TAGS", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Comma-separated tags to exclude
    #[arg(long, value_name = "TAGS", value_delimiter = ',')]
    pub exclude_tags: Vec<String>,

    /// Built-in catalog name (steady, nightmare) or catalog file path
    #[arg(long, value_name = "NAME|PATH")]
    pub catalog: Option<String>,

    /// Seed for scenario selection and pacing
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Minimum wait between iterations in seconds
    #[arg(long, value_name = "S")]
    pub wait_min: Option<f64>,

    /// Maximum wait between iterations in seconds (0/0 = maximum throughput)
    #[arg(long, value_name = "S")]
    pub wait_max: Option<f64>,

    /// Also write the JSON report to this file
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Exit non-zero when any alert fired
    #[arg(long)]
    pub fail_on_alert: bool,

    /// Skip the catalog's warm-up requests
    #[arg(long)]
    pub skip_warmup: bool,
}

impl RunArgs {
    /// Command-line values win over file and environment values
    pub fn apply(&self, config: &mut StampedeConfig) {
        let run = &mut config.run;
        if let Some(host) = &self.host {
            run.host = host.clone();
        }
        if let Some(users) = self.users {
            run.users = users;
        }
        if let Some(spawn_rate) = self.spawn_rate {
            run.spawn_rate = spawn_rate;
        }
        if let Some(duration) = self.duration {
            run.duration = duration;
        }
        if !self.tags.is_empty() {
            run.tags = self.tags.clone();
        }
        if !self.exclude_tags.is_empty() {
            run.exclude_tags = self.exclude_tags.clone();
        }
        if let Some(catalog) = &self.catalog {
            run.catalog = catalog.clone();
        }
        if self.seed.is_some() {
            run.seed = self.seed;
        }
        run.skip_warmup |= self.skip_warmup;

        if let Some(output) = &self.output {
            config.report.output = Some(output.clone());
        }
        config.report.fail_on_alert |= self.fail_on_alert;
    }

    /// Pacing after `--wait-min`/`--wait-max`, filling the missing bound from `base`
    pub fn pacing(&self, base: PacingOverride) -> Option<PacingOverride> {
        if self.wait_min.is_none() && self.wait_max.is_none() {
            return None;
        }
        Some(PacingOverride {
            min_wait: self.wait_min.unwrap_or(base.min_wait),
            max_wait: self.wait_max.unwrap_or(base.max_wait),
        })
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate the file given with --config
    Validate,

    /// Print a sample configuration file
    Sample {
        /// Write to this file instead of stdout
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_flags_override_config() {
        let args = run_args(&[
            "stampede", "run", "--host", "http://target:9000", "-u", "200", "-r", "20", "-t",
            "5m", "--tags", "n08,n10", "--catalog", "nightmare", "--seed", "42",
            "--fail-on-alert",
        ]);

        let mut config = StampedeConfig::default();
        args.apply(&mut config);

        assert_eq!(config.run.host, "http://target:9000");
        assert_eq!(config.run.users, 200);
        assert_eq!(config.run.spawn_rate, 20.0);
        assert_eq!(config.run.duration, Duration::from_secs(300));
        assert_eq!(config.run.tags, vec!["n08", "n10"]);
        assert_eq!(config.run.catalog, "nightmare");
        assert_eq!(config.run.seed, Some(42));
        assert!(config.report.fail_on_alert);
    }

    #[test]
    fn test_absent_flags_keep_config_values() {
        let args = run_args(&["stampede", "run"]);
        let mut config = StampedeConfig::default();
        config.run.users = 7;
        config.run.tags = vec!["v3".into()];
        args.apply(&mut config);

        assert_eq!(config.run.users, 7);
        assert_eq!(config.run.tags, vec!["v3"]);
        assert!(!config.report.fail_on_alert);
    }

    #[test]
    fn test_wait_flags_fill_missing_bound() {
        let base = PacingOverride {
            min_wait: 0.1,
            max_wait: 0.5,
        };
        assert_eq!(run_args(&["stampede", "run"]).pacing(base), None);

        let throughput = run_args(&["stampede", "run", "--wait-min", "0", "--wait-max", "0"]);
        assert_eq!(
            throughput.pacing(base),
            Some(PacingOverride {
                min_wait: 0.0,
                max_wait: 0.0
            })
        );

        let only_max = run_args(&["stampede", "run", "--wait-max", "2"]);
        assert_eq!(only_max.pacing(base).map(|p| p.min_wait), Some(0.1));
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli =
            Cli::try_parse_from(["stampede", "config", "validate", "--config", "load.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("load.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                config_cmd: ConfigCommands::Validate
            }
        ));
    }

    #[test]
    fn test_bad_duration_is_rejected() {
        assert!(Cli::try_parse_from(["stampede", "run", "-t", "soon"]).is_err());
    }
}

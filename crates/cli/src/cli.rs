//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// lidar-sim - rotating 2D LiDAR simulator
#[derive(Parser, Debug)]
#[command(
    name = "lidar-sim",
    author,
    version,
    about = "Simulated rotating 2D LiDAR scan pipeline",
    long_about = "Steps a simulation clock, synthesizes LaserScan-compatible scans by ray casting \n\
                  against a configured scene, and streams encoded frames to configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LIDAR_SIM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "LIDAR_SIM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Filter directive applied when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the simulation and stream scans to the configured sinks
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display derived scan geometry per sensor
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "lidar.toml", env = "LIDAR_SIM_CONFIG")]
    pub config: PathBuf,

    /// Override simulated duration in seconds
    #[arg(long, env = "LIDAR_SIM_DURATION")]
    pub duration: Option<f64>,

    /// Override step frequency in Hz
    #[arg(long, env = "LIDAR_SIM_STEP_HZ")]
    pub step_hz: Option<f64>,

    /// Stop after this many scans across all sensors (0 = unlimited)
    #[arg(long, default_value = "0", env = "LIDAR_SIM_MAX_SCANS")]
    pub max_scans: u64,

    /// Wall-clock timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "LIDAR_SIM_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Channel buffer size between the step loop and the dispatcher
    #[arg(long, default_value = "100", env = "LIDAR_SIM_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "LIDAR_SIM_METRICS_PORT")]
    pub metrics_port: u16,

    /// Step as fast as possible instead of pacing to the wall clock
    #[arg(long)]
    pub no_realtime: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "lidar.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "lidar.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show full scan parameters per sensor
    #[arg(long)]
    pub sensors: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args_parse() {
        let cli = Cli::parse_from([
            "lidar-sim",
            "-v",
            "run",
            "--config",
            "scene.toml",
            "--duration",
            "2.5",
            "--max-scans",
            "40",
            "--no-realtime",
        ]);
        assert_eq!(cli.log_level(), "debug");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("scene.toml"));
                assert_eq!(args.duration, Some(2.5));
                assert_eq!(args.max_scans, 40);
                assert!(args.no_realtime);
                assert_eq!(args.step_hz, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["lidar-sim", "-q", "-v", "info"]).is_err());
        let quiet = Cli::parse_from(["lidar-sim", "-q", "info"]);
        assert_eq!(quiet.log_level(), "warn");
    }
}

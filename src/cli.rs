//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// valuetrack - run oracle trackers and report aggregated values
///
/// Builds the configured trackers, runs one cycle of each, and prints the
/// value every pre-specified request would report right now.
///
/// Examples:
///   valuetrack --config miner.toml
///   valuetrack --trackers psr,gas --chain-snapshot chain.json
///   valuetrack --dry-run
///   valuetrack --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .valuetrack.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "VALUETRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Trackers to run (comma-separated), overriding the config file
    ///
    /// Example: --trackers psr,gas,disputeChecker
    #[arg(short, long, value_name = "NAMES", value_delimiter = ',')]
    pub trackers: Option<Vec<String>>,

    /// JSON snapshot of chain state for chain-backed trackers
    #[arg(long, value_name = "FILE")]
    pub chain_snapshot: Option<PathBuf>,

    /// Tracker cycle in seconds (used for the day-average quorum)
    #[arg(long, value_name = "SECS")]
    pub cycle: Option<u64>,

    /// Data source request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output format for the value report (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Build and list the trackers without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .valuetrack.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the value report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text table (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.cycle == Some(0) {
            return Err("Cycle must be at least 1 second".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let Some(ref trackers) = self.trackers {
            if trackers.iter().any(|t| t.trim().is_empty()) {
                return Err("Tracker names must not be empty".to_string());
            }
        }

        if let Some(ref snapshot) = self.chain_snapshot {
            if !snapshot.is_file() {
                return Err(format!(
                    "Chain snapshot does not exist: {}",
                    snapshot.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

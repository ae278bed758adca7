//! Configuration file handling.
//!
//! This module handles loading, validating and merging configuration from
//! `.valuetrack.toml` files. Reporting method tags are resolved while the
//! file is parsed, so an unknown tag fails the load.

use crate::error::ConfigError;
use crate::models::{DataSource, PrespecifiedRequest};
use crate::processor::ReportingMethod;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".valuetrack.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Data source fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Dispute checker settings.
    #[serde(default)]
    pub dispute: DisputeConfig,

    /// Pre-specified requests.
    #[serde(default, rename = "psr")]
    pub requests: Vec<PsrConfig>,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Tracker names handed to the tracker factory.
    #[serde(default = "default_trackers")]
    pub trackers: Vec<String>,

    /// Interval between tracker cycles, in seconds.
    #[serde(default = "default_cycle")]
    pub tracker_cycle_seconds: u64,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            trackers: default_trackers(),
            tracker_cycle_seconds: default_cycle(),
            verbose: false,
        }
    }
}

fn default_trackers() -> Vec<String> {
    vec!["psr".to_string()]
}

fn default_cycle() -> u64 {
    60
}

/// Data source fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

/// Dispute checker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeConfig {
    /// Relative deviation from the local value that flags a submitted value.
    #[serde(default = "default_deviation")]
    pub deviation_threshold: f64,
}

impl Default for DisputeConfig {
    fn default() -> Self {
        Self {
            deviation_threshold: default_deviation(),
        }
    }
}

fn default_deviation() -> f64 {
    0.1
}

/// One `[[psr]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsrConfig {
    pub request_id: u64,

    #[serde(default = "default_granularity")]
    pub granularity: u64,

    /// Reporting method tag: "value", "median", "dayAvg" or empty.
    #[serde(default)]
    pub transformation: ReportingMethod,

    #[serde(default)]
    pub sources: Vec<DataSource>,
}

fn default_granularity() -> u64 {
    1
}

impl Config {
    /// Load and validate configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Check settings that serde can't.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.tracker_cycle_seconds == 0 {
            return Err(ConfigError::Invalid(
                "tracker_cycle_seconds must be at least 1".to_string(),
            ));
        }
        if self.general.tracker_cycle_seconds > 24 * 60 * 60 {
            return Err(ConfigError::Invalid(
                "tracker_cycle_seconds must not exceed one day".to_string(),
            ));
        }
        if self.fetch.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "fetch timeout_seconds must be at least 1".to_string(),
            ));
        }
        let threshold = self.dispute.deviation_threshold;
        if threshold.is_nan() || threshold <= 0.0 {
            return Err(ConfigError::Invalid(
                "dispute deviation_threshold must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for psr in &self.requests {
            if !seen.insert(psr.request_id) {
                return Err(ConfigError::Invalid(format!(
                    "request id {} is configured more than once",
                    psr.request_id
                )));
            }
            if psr.granularity == 0 {
                return Err(ConfigError::Invalid(format!(
                    "request id {} has zero granularity",
                    psr.request_id
                )));
            }
        }

        Ok(())
    }

    /// The tracker sampling interval.
    pub fn tracker_cycle(&self) -> Duration {
        Duration::from_secs(self.general.tracker_cycle_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_seconds)
    }

    /// Build every configured request with its processor resolved.
    pub fn prespecified_requests(&self) -> Vec<PrespecifiedRequest> {
        let cycle = self.tracker_cycle();
        self.requests
            .iter()
            .map(|psr| {
                PrespecifiedRequest::new(
                    psr.request_id,
                    psr.granularity,
                    psr.transformation,
                    psr.sources.clone(),
                    cycle,
                )
            })
            .collect()
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref trackers) = args.trackers {
            self.general.trackers = trackers.clone();
        }

        if let Some(cycle) = args.cycle {
            self.general.tracker_cycle_seconds = cycle;
        }

        if let Some(timeout) = args.timeout {
            self.fetch.timeout_seconds = timeout;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let mut config = Config::default();
        config.requests.push(PsrConfig {
            request_id: 1,
            granularity: 1000,
            transformation: ReportingMethod::Median,
            sources: vec![DataSource {
                url: "https://api.example.com/v1/ticker/ethusd".to_string(),
                args: vec!["data".to_string(), "price".to_string()],
            }],
        });
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

//! valuetrack - value aggregation for pre-specified oracle requests.
//!
//! Trackers fetch raw observations from external data sources, value
//! processors turn them into one canonical number per request, and the
//! value store keeps the timed history those processors report from.

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod payload;
pub mod processor;
pub mod report;
pub mod store;
pub mod tracker;

pub use config::Config;
pub use error::{ConfigError, PayloadError};
pub use models::{Aggregate, DataSource, PrespecifiedRequest, TimedSample};
pub use processor::{ReportingMethod, ValueProcessor};
pub use store::{MemoryStore, ValueStore};
pub use tracker::{create_tracker, Tracker, TrackerContext};

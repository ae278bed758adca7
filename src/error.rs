//! Error types.
//!
//! Configuration problems are fatal at load time and are surfaced to the
//! operator as-is. Payload errors never leave the strategy layer: a sample
//! that fails to parse is dropped and the cycle continues.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A PSR names a reporting method we don't know.
    #[error("unrecognized transformation in PSR: {0}")]
    UnknownTransformation(String),

    /// The tracker factory was asked for a name it doesn't know.
    #[error("no tracker with the name {0}")]
    UnknownTracker(String),

    /// The `psr` tracker group was requested but no PSR is configured.
    #[error("tracker group 'psr' requested but no pre-specified requests are configured")]
    NoPrespecifiedRequests,

    /// Any other invalid setting.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while turning a raw payload into a numeric sample.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("argument '{arg}' not found in payload")]
    MissingField { arg: String },

    #[error("value at '{path}' is not numeric")]
    NotNumeric { path: String },

    #[error("parsed value {0} is not finite")]
    NotFinite(f64),
}

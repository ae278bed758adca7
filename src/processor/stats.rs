//! Numeric helpers shared by the value processors.

use crate::models::TimedSample;
use chrono::{DateTime, Utc};

/// Age (in seconds) at which a sample's exponential weight drops to 1/e.
const DECAY_SECONDS: f64 = 86400.0 / 3.0;

/// Arithmetic mean. Empty input yields 0.
pub fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return 0.0;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

/// Sorts `vals` and returns the element at index `len / 2`.
///
/// For even lengths this is the upper of the two middle elements, not their
/// average: `[1, 2, 3, 4]` gives `3`. Reported values depend on this exact
/// behavior. Empty input yields 0.
pub fn median(vals: &mut [f64]) -> f64 {
    if vals.is_empty() {
        return 0.0;
    }
    vals.sort_by(|a, b| a.total_cmp(b));
    vals[vals.len() / 2]
}

/// Weight of a sample of the given age.
///
/// new values 1.00, 6 hours old ~0.5, 24 hours old ~0.05
pub fn exp_weight(age_seconds: f64) -> f64 {
    (-age_seconds / DECAY_SECONDS).exp()
}

/// Exponentially time-weighted mean of `vals` as seen at `now`.
///
/// The weighted sum is divided by the sample count, not by the sum of the
/// weights, so older histories pull the result toward zero.
pub fn exp_time_weighted_mean(vals: &[TimedSample], now: DateTime<Utc>) -> f64 {
    if vals.is_empty() {
        return 0.0;
    }

    let sum: f64 = vals
        .iter()
        .map(|s| {
            let age = (now - s.created).num_milliseconds() as f64 / 1000.0;
            s.value * exp_weight(age)
        })
        .sum();

    sum / vals.len() as f64
}

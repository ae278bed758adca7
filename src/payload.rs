//! Payload parsing.
//!
//! Data sources answer with JSON. A request's argument group for a source
//! is a path into that JSON: object keys, or array indices written as
//! decimal strings. The addressed leaf must be a number or a numeric string.

use crate::error::PayloadError;
use serde_json::Value;

/// Parse one raw payload into a sample scaled by `granularity`.
pub fn parse_payload(raw: &[u8], granularity: u64, args: &[String]) -> Result<f64, PayloadError> {
    let root: Value = serde_json::from_slice(raw)?;

    let mut current = &root;
    for arg in args {
        let next = match current {
            Value::Object(map) => map.get(arg),
            Value::Array(items) => arg.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| PayloadError::MissingField { arg: arg.clone() })?;
    }

    let value = match current {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| PayloadError::NotNumeric {
        path: args.join("."),
    })?;

    let scaled = value * granularity as f64;
    if !scaled.is_finite() {
        return Err(PayloadError::NotFinite(scaled));
    }

    Ok(scaled)
}

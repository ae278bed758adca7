//! Reportable value summaries.
//!
//! After a tracker pass the binary prints what each pre-specified request
//! would report right now, either as a text table or as JSON.

use crate::models::{PrespecifiedRequest, ValueReport};
use crate::processor::DAY_WINDOW;
use crate::store::ValueStore;
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Collect the reportable state of every request at `now`.
pub fn collect_reports(
    requests: &[PrespecifiedRequest],
    store: &dyn ValueStore,
    now: DateTime<Utc>,
) -> Vec<ValueReport> {
    let window = chrono::Duration::seconds(DAY_WINDOW.as_secs() as i64);

    requests
        .iter()
        .map(|request| ValueReport {
            request_id: request.request_id,
            method: request.method,
            value: request.processor().value(request, store, now),
            latest: store.latest(request.request_id),
            samples_24h: store
                .samples_in_window(request.request_id, now, window)
                .len(),
        })
        .collect()
}

/// Generate a JSON report.
pub fn generate_json_report(reports: &[ValueReport]) -> Result<String> {
    Ok(serde_json::to_string_pretty(reports)?)
}

/// Generate a plain text table.
pub fn generate_text_report(reports: &[ValueReport]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{:>10}  {:<8}  {:>20}  {:>11}  {}\n",
        "REQUEST", "METHOD", "VALUE", "SAMPLES/24H", "LATEST"
    ));

    for report in reports {
        let value = match report.value {
            Some(v) => format!("{:.4}", v),
            None => "not ready".to_string(),
        };
        let latest = match report.latest {
            Some(sample) => format!(
                "{} @ {}",
                sample.value,
                sample.created.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => "-".to_string(),
        };

        output.push_str(&format!(
            "{:>10}  {:<8}  {:>20}  {:>11}  {}\n",
            report.request_id, report.method.as_str(), value, report.samples_24h, latest
        ));
    }

    output
}

//! Detection of events caused by this layer's own issue writes.
//!
//! The sender of a webhook does not reliably identify the app, and labels are
//! attached after creation, so the title shape `[<8 hex>] <title>` is the only
//! marker present from the first event onward.

use serde_json::Value;

use crate::error_fingerprint::is_fingerprint_token;
use crate::report_config::ReportConfig;

/// Returns true when `payload.issue.title` looks like a tracking issue title.
pub fn is_own_echo(config: &ReportConfig, payload: &Value) -> bool {
    payload
        .get("issue")
        .and_then(|issue| issue.get("title"))
        .and_then(Value::as_str)
        .is_some_and(|title| is_tracking_title(config, title))
}

pub fn is_tracking_title(config: &ReportConfig, title: &str) -> bool {
    has_fingerprint_prefix(title) && title.ends_with(config.title.as_str())
}

fn has_fingerprint_prefix(title: &str) -> bool {
    let Some(rest) = title.strip_prefix('[') else {
        return false;
    };
    rest.get(..9)
        .and_then(|candidate| candidate.strip_suffix(']'))
        .is_some_and(is_fingerprint_token)
}

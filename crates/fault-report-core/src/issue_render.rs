use std::sync::OnceLock;

use regex::Regex;

use crate::error_fingerprint::Fingerprint;
use crate::report_config::ReportConfig;

pub const OCCURRENCES_LABEL: &str = "Occurrences:";
pub const SEARCH_SORT_TOKEN: &str = "sort:updated-desc";
pub const SEARCH_OPEN_TOKEN: &str = "is:open";

fn occurrences_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?m)^Occurrences:[ \t]*([0-9]+)[ \t]*\r?$").ok())
        .as_ref()
}

/// `[<fingerprint>] <configured title>`; echo detection relies on this exact shape.
pub fn render_issue_title(fingerprint: &Fingerprint, config: &ReportConfig) -> String {
    format!("[{}] {}", fingerprint, config.title)
}

pub fn render_issue_body(config: &ReportConfig, normalized_error: &str) -> String {
    [
        config.body.clone(),
        format!("```\n{normalized_error}\n```"),
        format!("{OCCURRENCES_LABEL} 1"),
    ]
    .join("\n\n")
}

/// Closed issues only need to surface when they may be reopened.
pub fn build_search_query(fingerprint: &Fingerprint, reopen: bool) -> String {
    let open_filter = if reopen { "" } else { SEARCH_OPEN_TOKEN };
    [fingerprint.as_str(), SEARCH_SORT_TOKEN, open_filter]
        .into_iter()
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Increments the last `Occurrences: N` line in `body`, leaving every other
/// byte untouched, and returns the new body with the new count.
///
/// Only a line holding nothing but the counter qualifies, and the last one
/// wins: the fenced error text precedes the counter and may quote it.
/// A body without a counter gets `Occurrences: 2` appended since the caller
/// only bumps on a recurrence.
pub fn bump_occurrences(body: &str) -> (String, u64) {
    let digits = occurrences_pattern()
        .and_then(|pattern| pattern.captures_iter(body).last())
        .and_then(|captures| captures.get(1));
    let Some(digits) = digits else {
        let next = 2_u64;
        let bumped = if body.trim().is_empty() {
            format!("{OCCURRENCES_LABEL} {next}")
        } else {
            format!("{body}\n\n{OCCURRENCES_LABEL} {next}")
        };
        return (bumped, next);
    };

    let current = digits.as_str().parse::<u64>().unwrap_or(u64::MAX);
    let next = current.saturating_add(1);
    let mut bumped = String::with_capacity(body.len().saturating_add(1));
    bumped.push_str(&body[..digits.start()]);
    bumped.push_str(&next.to_string());
    bumped.push_str(&body[digits.end()..]);
    (bumped, next)
}

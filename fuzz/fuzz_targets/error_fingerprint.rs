#![no_main]

use fault_report_core::error_fingerprint::{fingerprint, is_fingerprint_token, normalize_error};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let value = serde_json::from_str::<serde_json::Value>(&raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));

    let normalized = normalize_error(&value);
    assert!(!normalized.trim().is_empty());

    let first = fingerprint(&normalized);
    assert!(is_fingerprint_token(first.as_str()));
    assert_eq!(first, fingerprint(&normalize_error(&value)));
});

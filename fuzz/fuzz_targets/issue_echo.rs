#![no_main]

use fault_report_core::error_fingerprint::fingerprint;
use fault_report_core::issue_echo::is_own_echo;
use fault_report_core::issue_render::render_issue_title;
use fault_report_core::ReportConfig;
use libfuzzer_sys::fuzz_target;
use serde_json::json;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let config = ReportConfig::default().with_title(raw.to_string());

    let _ = is_own_echo(&config, &json!({"issue": {"title": raw}}));

    let title = render_issue_title(&fingerprint(&raw), &config);
    assert!(is_own_echo(&config, &json!({"issue": {"title": title}})));
});

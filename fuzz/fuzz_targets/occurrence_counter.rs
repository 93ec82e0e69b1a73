#![no_main]

use fault_report_core::issue_render::bump_occurrences;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let body = String::from_utf8_lossy(data);
    let (bumped, count) = bump_occurrences(&body);
    assert!(count >= 2);
    assert!(bumped.contains("Occurrences:"));
    assert!(bumped.contains(&count.to_string()));
});

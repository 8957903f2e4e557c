// Run locally (from the repo root):
//   cargo +nightly fuzz run fuzz_report_line -- -runs=100000
#![no_main]

use libfuzzer_sys::fuzz_target;
use vintage_detect::{parse_report_line, ReportLine};

mod utils;

fuzz_target!(|data: &[u8]| {
    let Some(text) = utils::truncate_utf8(data) else {
        return;
    };

    for line in text.lines() {
        // Oracle: never panics; a parsed feature always names a construct.
        if let Ok(ReportLine::Feature { construct, .. }) = parse_report_line(line) {
            assert!(!construct.trim().is_empty(), "empty construct from {line:?}");
        }
    }
});

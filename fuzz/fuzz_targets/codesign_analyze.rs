#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = ipascope::formats::codesign::analyze_signature(data, 0, data.len());
});

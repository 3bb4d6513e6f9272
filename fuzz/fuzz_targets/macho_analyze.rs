#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(info) = ipascope::formats::macho::analyze(data) {
        let _ = ipascope::formats::codesign::analyze_embedded(data, &info);
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use scorealign_core::{maps_from_json, maps_to_json, parse_attributes_json};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let _ = parse_attributes_json(text);
    if let Ok(observations) = maps_from_json(text) {
        let json = maps_to_json(&observations).expect("re-serialization failed");
        let again: serde_json::Value = serde_json::from_str(&json).expect("invalid MAPS JSON");
        assert!(again.is_array());
    }
});

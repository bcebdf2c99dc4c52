//! Fuzz target: telemetry payload decode
//!
//! Feeds arbitrary notification bodies through `TelemetryPayload::decode`
//! and asserts that only 8-byte bodies are accepted and that accepted
//! bodies re-encode to the same bytes.
//!
//! cargo fuzz run fuzz_payload_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use thermovalve::protocol::{PAYLOAD_LEN, TelemetryPayload};

fuzz_target!(|data: &[u8]| {
    match TelemetryPayload::decode(data) {
        Ok(payload) => {
            assert_eq!(data.len(), PAYLOAD_LEN, "accepted a non-8-byte body");
            assert_eq!(&payload.encode()[..], data, "decode/encode not bit-exact");
        }
        Err(_) => assert_ne!(data.len(), PAYLOAD_LEN, "rejected an 8-byte body"),
    }
});

//! Fuzz target: advertising-data walker
//!
//! Scan reports come straight off the air.  The AD structure walker and
//! the service / name lookups built on it must never panic or read past
//! the report, whatever the length bytes claim.
//!
//! cargo fuzz run fuzz_adv_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use thermovalve::protocol::SERVICE_UUID;
use thermovalve::protocol::advert::{AdStructures, advertises_service, local_name};

fuzz_target!(|data: &[u8]| {
    let mut consumed = 0usize;
    for (_, body) in AdStructures::new(data) {
        consumed += body.len() + 2;
    }
    assert!(consumed <= data.len(), "walker read past the report");

    let _ = advertises_service(data, SERVICE_UUID);
    if let Some(name) = local_name(data) {
        assert!(name.len() <= data.len());
    }
});

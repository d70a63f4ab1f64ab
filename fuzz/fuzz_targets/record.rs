#![no_main]

use libfuzzer_sys::fuzz_target;
use minitls_core::key_schedule::KeyMaterial;
use minitls_core::{Direction, Record, RecordLayer};

fuzz_target!(|data: &[u8]| {
    let Ok((record, consumed)) = Record::parse(data) else {
        return;
    };
    assert!(consumed <= data.len());

    // Opening garbage must fail cleanly, never panic.
    let Ok(keys) = KeyMaterial::from_pre_master_secret(&[7u8; 32], &[1u8; 32], &[2u8; 32]) else {
        return;
    };
    let mut records = RecordLayer::new(&keys);
    let _ = records.open(Direction::ServerToClient, &record);
});

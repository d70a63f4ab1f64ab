#![no_main]

use libfuzzer_sys::fuzz_target;
use minitls_core::message::{HandshakeDeframer, HandshakeMessage};

fuzz_target!(|data: &[u8]| {
    // Parsing must never panic, whatever the length fields claim.
    if let Ok(message) = HandshakeMessage::parse(data) {
        if let Ok(serialized) = message.serialize() {
            let reparsed = HandshakeMessage::parse(&serialized);
            assert!(reparsed.is_ok(), "Roundtrip parsing failed for valid message");
            assert_eq!(reparsed.ok(), Some(message));
        }
    }

    // Same bytes through the reassembly path, split at an arbitrary point.
    let split = data.first().map_or(0, |b| *b as usize % (data.len() + 1));
    let mut deframer = HandshakeDeframer::new(16 * 1024);
    deframer.push(&data[..split]);
    deframer.push(&data[split..]);
    while let Ok(Some(message)) = deframer.pop() {
        let _ = HandshakeMessage::parse(&message);
    }
});

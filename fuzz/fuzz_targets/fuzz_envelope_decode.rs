//! Fuzz target: `Envelope::decode`
//!
//! Arbitrary frame payloads must decode to an envelope or an error, never a
//! panic.  Anything that decodes must re-encode to the same bytes.
//!
//! cargo fuzz run fuzz_envelope_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use paramcom::rpc::message::Envelope;

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = Envelope::decode(data) {
        let encoded = envelope.encode().expect("decoded envelope re-encodes");
        assert_eq!(Envelope::decode(&encoded).ok(), Some(envelope));
    }
});

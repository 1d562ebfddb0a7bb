//! Fuzz target: `FrameDecoder::feed`
//!
//! Drives arbitrary byte sequences into the streaming frame decoder, split
//! at an arbitrary point, and asserts that it never panics and never yields
//! an empty or oversized payload.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use paramcom::rpc::codec::FrameDecoder;

const MAX: usize = 4096;

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new(MAX);
    let split = data.first().map_or(0, |b| *b as usize).min(data.len());

    let mut frames = decoder.feed(&data[..split]);
    frames.extend(decoder.feed(&data[split..]));
    for payload in &frames {
        assert!(payload.len() <= MAX, "payload exceeds max frame size");
        assert!(!payload.is_empty(), "decoder must not yield empty payload");
    }

    // After a reset the decoder must accept bytes cleanly again.
    decoder.reset();
    let _ = decoder.feed(data);
});

//! Length-prefix frame codec.
//!
//! Wire format:
//! ```text
//! ┌────────────┬──────────────────────────┐
//! │ Length (4B)│ Envelope payload (N B)   │
//! │ LE u32     │                          │
//! └────────────┴──────────────────────────┘
//! ```
//!
//! The decoder accumulates incoming bytes and yields every complete frame.
//! A single read may carry part of a header, part of a payload, or several
//! frames back to back.

use log::warn;

use crate::error::{ProtocolError, Result};

/// Frame header size (4-byte little-endian length).
pub const HEADER_SIZE: usize = 4;

/// Decoder state machine.
enum DecoderState {
    /// Waiting for header bytes.
    ReadingHeader { collected: usize },
    /// Header received, reading payload.
    ReadingPayload { expected: usize },
}

/// Streaming frame decoder.
pub struct FrameDecoder {
    state: DecoderState,
    header_buf: [u8; HEADER_SIZE],
    payload_buf: Vec<u8>,
    max_frame_size: usize,
    rejected: u64,
}

impl FrameDecoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            state: DecoderState::ReadingHeader { collected: 0 },
            header_buf: [0; HEADER_SIZE],
            payload_buf: Vec::new(),
            max_frame_size,
            rejected: 0,
        }
    }

    /// Feed bytes into the decoder and collect every completed payload.
    ///
    /// Headers announcing an empty or oversized frame are skipped and
    /// counted in [`rejected`](Self::rejected).
    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            match &mut self.state {
                DecoderState::ReadingHeader { collected } => {
                    let to_copy = (HEADER_SIZE - *collected).min(data.len() - offset);
                    self.header_buf[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);
                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == HEADER_SIZE {
                        let expected = u32::from_le_bytes(self.header_buf) as usize;
                        if expected == 0 || expected > self.max_frame_size {
                            warn!(
                                "codec: dropping frame header announcing {} byte(s)",
                                expected
                            );
                            self.rejected += 1;
                            self.state = DecoderState::ReadingHeader { collected: 0 };
                            continue;
                        }
                        self.payload_buf.clear();
                        self.payload_buf.reserve(expected);
                        self.state = DecoderState::ReadingPayload { expected };
                    }
                }

                DecoderState::ReadingPayload { expected } => {
                    let needed = *expected - self.payload_buf.len();
                    let to_copy = needed.min(data.len() - offset);
                    self.payload_buf
                        .extend_from_slice(&data[offset..offset + to_copy]);
                    offset += to_copy;

                    if self.payload_buf.len() == *expected {
                        self.state = DecoderState::ReadingHeader { collected: 0 };
                        frames.push(core::mem::take(&mut self.payload_buf));
                    }
                }
            }
        }

        frames
    }

    /// Number of frame headers skipped as invalid.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Whether a frame is partially received.
    pub fn is_mid_frame(&self) -> bool {
        !matches!(self.state, DecoderState::ReadingHeader { collected: 0 })
    }

    /// Reset decoder state (e.g. after a transport reconnect).
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingHeader { collected: 0 };
        self.payload_buf.clear();
    }
}

/// Encode a payload into a length-prefixed frame.
pub fn encode_frame(payload: &[u8], max_frame_size: usize) -> Result<Vec<u8>> {
    if payload.is_empty() || payload.len() > max_frame_size {
        return Err(ProtocolError::FrameSize {
            len: payload.len(),
            max: max_frame_size,
        }
        .into());
    }
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

// ── Tests ────────────────────────────────────────────────────

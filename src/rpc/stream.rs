//! Frame transport over any byte stream.
//!
//! ```text
//!   Manager ──frame──▶ StreamSender ──[len|payload]──▶ socket
//!   Driver  ◀──frame── StreamReceiver ◀── FrameDecoder ◀── socket
//! ```
//!
//! The receiver relies on the underlying reader's own timeout (e.g.
//! `UnixStream::set_read_timeout`); a timed-out read is reported as "no
//! frame yet".  A rejected frame header leaves the byte stream misaligned,
//! so the receiver reports the connection closed once the frames decoded
//! before it have been handed out.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;

use super::codec::{FrameDecoder, encode_frame};
use super::transport::{Receiver, Sender};
use crate::error::{Result, TransportError};

const READ_BUF_SIZE: usize = 4096;

/// Writes length-prefixed frames to a byte sink.
pub struct StreamSender<W: Write + Send> {
    writer: Mutex<W>,
    max_frame_size: usize,
}

impl<W: Write + Send> StreamSender<W> {
    pub fn new(writer: W, max_frame_size: usize) -> Self {
        Self {
            writer: Mutex::new(writer),
            max_frame_size,
        }
    }
}

impl<W: Write + Send> Sender for StreamSender<W> {
    fn send(&self, frame: Vec<u8>) -> Result<()> {
        let bytes = encode_frame(&frame, self.max_frame_size)?;
        let mut writer = self.writer.lock();
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }
}

/// Reads length-prefixed frames from a byte source.
pub struct StreamReceiver<R: Read + Send> {
    reader: R,
    decoder: FrameDecoder,
    pending: VecDeque<Vec<u8>>,
    buf: Box<[u8; READ_BUF_SIZE]>,
    desynchronized: bool,
}

impl<R: Read + Send> StreamReceiver<R> {
    pub fn new(reader: R, max_frame_size: usize) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::new(max_frame_size),
            pending: VecDeque::new(),
            buf: Box::new([0; READ_BUF_SIZE]),
            desynchronized: false,
        }
    }
}

impl<R: Read + Send> Receiver for StreamReceiver<R> {
    fn recv_timeout(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
            if self.desynchronized {
                return Err(TransportError::Closed.into());
            }
            match self.reader.read(&mut self.buf[..]) {
                Ok(0) => {
                    debug!("stream: peer closed");
                    return Err(TransportError::Closed.into());
                }
                Ok(n) => {
                    let frames = self.decoder.feed(&self.buf[..n]);
                    if self.decoder.rejected() > 0 {
                        warn!("stream: invalid frame header, dropping connection");
                        self.desynchronized = true;
                        self.pending.extend(frames);
                        continue;
                    }
                    if frames.is_empty() {
                        // Partial frame: keep reading until the reader times out.
                        continue;
                    }
                    self.pending.extend(frames);
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Split a Unix stream socket into a sender/receiver pair.
#[cfg(unix)]
pub fn unix_stream_transport(
    stream: std::os::unix::net::UnixStream,
    max_frame_size: usize,
    read_timeout: Duration,
) -> Result<(
    StreamSender<std::os::unix::net::UnixStream>,
    StreamReceiver<std::os::unix::net::UnixStream>,
)> {
    stream.set_read_timeout(Some(read_timeout))?;
    let writer = stream.try_clone()?;
    Ok((
        StreamSender::new(writer, max_frame_size),
        StreamReceiver::new(stream, max_frame_size),
    ))
}

// ── Tests ────────────────────────────────────────────────────

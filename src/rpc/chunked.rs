//! Chunking decorator for the file API.
//!
//! Splits reads and writes larger than the configured bounds into a strict
//! sequence of sub-calls on the wrapped [`FileApi`], so no single message
//! exceeds the transport's frame limit.
//!
//! ```text
//! read(id, 12, 1234), max 42
//!   ─▶ read(id,   12, 42) ─▶ read(id,   54, 42) ─▶ … ─▶ read(id, 1230, 16)
//!        └─ append ─────────── append ─────────────────── resolve outer
//!
//! write(id, 12, [1234 bytes]), max 42
//!   ─▶ write(id, 12, [0..42]) ─▶ write(id, 54, [42..84]) ─▶ … ─▶ resolve outer
//! ```
//!
//! The next chunk is only issued once the previous one settled.  A short
//! read ends the transfer early; the first failing chunk (error status or
//! exception) ends it with that failure.  Dismissing the outer future
//! dismisses the chunk in flight and stops the sequence.
//!
//! Sub-futures that settle synchronously are consumed in a loop instead of
//! through nested continuations, so stack depth does not grow with the
//! number of chunks.

use std::mem;
use std::sync::{Arc, Weak};

use log::debug;
use parking_lot::Mutex;

use crate::config::ComConfig;
use crate::error::{Error, Result};
use crate::future::{DismissHandle, Future, Promise};
use crate::model::{
    FileId, FileIdResponse, FileInfoResponse, FileReadResponse, ParameterInstanceId, Response,
};
use crate::service::ports::FileApi;

/// [`FileApi`] decorator that bounds the size of every read and write.
pub struct ChunkingFileApi {
    inner: Arc<dyn FileApi>,
    max_read_chunk_size: u64,
    max_write_chunk_size: u64,
}

impl ChunkingFileApi {
    pub fn new(
        inner: Arc<dyn FileApi>,
        max_read_chunk_size: u64,
        max_write_chunk_size: u64,
    ) -> Result<Self> {
        if max_read_chunk_size == 0 || max_write_chunk_size == 0 {
            return Err(Error::Config(format!(
                "chunk sizes must be positive (read {max_read_chunk_size}, write {max_write_chunk_size})"
            )));
        }
        Ok(Self {
            inner,
            max_read_chunk_size,
            max_write_chunk_size,
        })
    }

    pub fn from_config(inner: Arc<dyn FileApi>, config: &ComConfig) -> Result<Self> {
        Self::new(
            inner,
            config.max_read_chunk_size,
            config.max_write_chunk_size,
        )
    }

    pub fn max_read_chunk_size(&self) -> u64 {
        self.max_read_chunk_size
    }

    pub fn max_write_chunk_size(&self) -> u64 {
        self.max_write_chunk_size
    }
}

impl FileApi for ChunkingFileApi {
    fn get_file_info(&self, id: FileId) -> Future<FileInfoResponse> {
        self.inner.get_file_info(id)
    }

    fn read(&self, id: FileId, offset: u64, length: u64) -> Future<FileReadResponse> {
        if length <= self.max_read_chunk_size {
            return self.inner.read(id, offset, length);
        }
        debug!(
            "chunked read {id}: {length} byte(s) at {offset} in parts of {}",
            self.max_read_chunk_size
        );
        let (promise, future) = Promise::pair();
        let job = Arc::new(ReadJob {
            inner: Arc::clone(&self.inner),
            id,
            part: self.max_read_chunk_size,
            promise,
            current: Mutex::new(None),
            progress: Mutex::new(ReadProgress {
                data: Vec::new(),
                offset,
                remaining: length,
                requested: 0,
            }),
        });
        watch_dismiss(&job, &job.promise);
        drive(job);
        future
    }

    fn write(&self, id: FileId, offset: u64, data: Vec<u8>) -> Future<Response> {
        let part = usize::try_from(self.max_write_chunk_size).unwrap_or(usize::MAX);
        if data.len() <= part {
            return self.inner.write(id, offset, data);
        }
        debug!(
            "chunked write {id}: {} byte(s) at {offset} in parts of {part}",
            data.len()
        );
        let (promise, future) = Promise::pair();
        let job = Arc::new(WriteJob {
            inner: Arc::clone(&self.inner),
            id,
            part,
            base: offset,
            data,
            promise,
            current: Mutex::new(None),
            progress: Mutex::new(WriteProgress {
                written: 0,
                pending: 0,
            }),
        });
        watch_dismiss(&job, &job.promise);
        drive(job);
        future
    }

    fn create(&self, id: FileId, capacity: u64) -> Future<Response> {
        self.inner.create(id, capacity)
    }

    fn create_parameter_upload_id(&self, context: ParameterInstanceId) -> Future<FileIdResponse> {
        self.inner.create_parameter_upload_id(context)
    }
}

// ── Chunk sequencing ─────────────────────────────────────────

/// One chunked transfer: issues sub-calls and folds their outcomes.
trait ChunkJob: Send + Sync + 'static {
    type Part: Send + 'static;

    /// Issue the next sub-call.
    fn next_part(&self) -> Future<Self::Part>;

    /// Fold one settled sub-call.  Returns `true` when another part is due.
    fn absorb(&self, outcome: Result<Self::Part>) -> bool;

    fn outer_dismissed(&self) -> bool;

    /// Handle of the sub-call in flight.
    fn current(&self) -> &Mutex<Option<DismissHandle>>;
}

fn drive<J: ChunkJob>(job: Arc<J>) {
    loop {
        if job.outer_dismissed() {
            return;
        }
        let part = job.next_part();
        *job.current().lock() = Some(part.dismiss_handle());
        // Dismissed between the check above and publishing the handle.
        if job.outer_dismissed() {
            part.dismiss();
            return;
        }
        match part.try_take() {
            Some(outcome) => {
                job.current().lock().take();
                if !job.absorb(outcome) {
                    return;
                }
            }
            None => {
                let next = Arc::clone(&job);
                part.on_settled(move |outcome| {
                    next.current().lock().take();
                    if next.absorb(outcome) {
                        drive(next);
                    }
                });
                return;
            }
        }
    }
}

/// Forward dismissal of the outer future to the sub-call in flight.
fn watch_dismiss<J: ChunkJob, T: Send + 'static>(job: &Arc<J>, promise: &Promise<T>) {
    let weak: Weak<J> = Arc::downgrade(job);
    promise.set_dismiss_notifier(move || {
        let Some(job) = weak.upgrade() else {
            return;
        };
        let in_flight = job.current().lock().take();
        if let Some(handle) = in_flight {
            debug!("chunked transfer dismissed");
            handle.dismiss();
        }
    });
}

// ── Read ─────────────────────────────────────────────────────

struct ReadProgress {
    data: Vec<u8>,
    offset: u64,
    remaining: u64,
    requested: u64,
}

struct ReadJob {
    inner: Arc<dyn FileApi>,
    id: FileId,
    part: u64,
    promise: Promise<FileReadResponse>,
    current: Mutex<Option<DismissHandle>>,
    progress: Mutex<ReadProgress>,
}

impl ChunkJob for ReadJob {
    type Part = FileReadResponse;

    fn next_part(&self) -> Future<FileReadResponse> {
        let (offset, length) = {
            let mut progress = self.progress.lock();
            progress.requested = progress.remaining.min(self.part);
            (progress.offset, progress.requested)
        };
        self.inner.read(self.id.clone(), offset, length)
    }

    fn absorb(&self, outcome: Result<FileReadResponse>) -> bool {
        let mut response = match outcome {
            Ok(response) => response,
            Err(e) => {
                let _ = self.promise.set_exception(e);
                return false;
            }
        };
        if !response.status.is_success() {
            let _ = self.promise.set_value(response);
            return false;
        }

        let mut progress = self.progress.lock();
        let requested = progress.requested;
        response.data.truncate(usize::try_from(requested).unwrap_or(usize::MAX));
        let received = response.data.len() as u64;
        progress.data.append(&mut response.data);
        progress.offset += received;
        progress.remaining -= received;
        if progress.remaining > 0 && received == requested {
            return true;
        }
        let data = mem::take(&mut progress.data);
        drop(progress);
        let _ = self.promise.set_value(FileReadResponse::with_data(data));
        false
    }

    fn outer_dismissed(&self) -> bool {
        self.promise.is_dismissed()
    }

    fn current(&self) -> &Mutex<Option<DismissHandle>> {
        &self.current
    }
}

// ── Write ────────────────────────────────────────────────────

struct WriteProgress {
    written: usize,
    pending: usize,
}

struct WriteJob {
    inner: Arc<dyn FileApi>,
    id: FileId,
    part: usize,
    base: u64,
    data: Vec<u8>,
    promise: Promise<Response>,
    current: Mutex<Option<DismissHandle>>,
    progress: Mutex<WriteProgress>,
}

impl ChunkJob for WriteJob {
    type Part = Response;

    fn next_part(&self) -> Future<Response> {
        let (start, end) = {
            let mut progress = self.progress.lock();
            let end = progress.written.saturating_add(self.part).min(self.data.len());
            progress.pending = end - progress.written;
            (progress.written, end)
        };
        let offset = self.base + start as u64;
        self.inner
            .write(self.id.clone(), offset, self.data[start..end].to_vec())
    }

    fn absorb(&self, outcome: Result<Response>) -> bool {
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                let _ = self.promise.set_exception(e);
                return false;
            }
        };
        if !response.is_success() {
            let _ = self.promise.set_value(response);
            return false;
        }

        let mut progress = self.progress.lock();
        progress.written += progress.pending;
        progress.pending = 0;
        if progress.written < self.data.len() {
            return true;
        }
        drop(progress);
        let _ = self.promise.set_value(response);
        false
    }

    fn outer_dismissed(&self) -> bool {
        self.promise.is_dismissed()
    }

    fn current(&self) -> &Mutex<Option<DismissHandle>> {
        &self.current
    }
}

// ── Tests ────────────────────────────────────────────────────

//! Instrumented in-memory file API.
//!
//! Answers truthfully and records every read and write it receives, so
//! tests can assert on the exact sub-call sequence a decorator issues.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use paramcom::future::{Future, resolved};
use paramcom::model::{
    FileId, FileIdResponse, FileInfoResponse, FileReadResponse, ParameterInstanceId, Response,
    StatusCode,
};
use paramcom::service::ports::FileApi;

/// One recorded sub-call: `(offset, length)`.
pub type Call = (u64, u64);

#[derive(Default)]
pub struct MockFileApi {
    files: Mutex<BTreeMap<FileId, Vec<u8>>>,
    reads: Mutex<Vec<Call>>,
    writes: Mutex<Vec<Call>>,
    others: Mutex<usize>,
}

impl MockFileApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(id: &str, contents: Vec<u8>) -> Self {
        let mock = Self::new();
        mock.files.lock().insert(id.into(), contents);
        mock
    }

    pub fn contents(&self, id: &str) -> Option<Vec<u8>> {
        self.files.lock().get(id).cloned()
    }

    pub fn reads(&self) -> Vec<Call> {
        self.reads.lock().clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.writes.lock().clone()
    }

    /// Calls other than read and write.
    pub fn other_calls(&self) -> usize {
        *self.others.lock()
    }
}

impl FileApi for MockFileApi {
    fn get_file_info(&self, id: FileId) -> Future<FileInfoResponse> {
        *self.others.lock() += 1;
        resolved(match self.files.lock().get(&id) {
            Some(data) => FileInfoResponse {
                status: StatusCode::Success,
                message: String::new(),
                file_size: data.len() as u64,
            },
            None => FileInfoResponse::error(StatusCode::UnknownFileId, id),
        })
    }

    fn read(&self, id: FileId, offset: u64, length: u64) -> Future<FileReadResponse> {
        self.reads.lock().push((offset, length));
        let files = self.files.lock();
        let Some(data) = files.get(&id) else {
            return resolved(FileReadResponse::error(StatusCode::UnknownFileId, id));
        };
        let start = (offset as usize).min(data.len());
        let end = offset.saturating_add(length).min(data.len() as u64) as usize;
        resolved(FileReadResponse::with_data(data[start..end].to_vec()))
    }

    fn write(&self, id: FileId, offset: u64, data: Vec<u8>) -> Future<Response> {
        self.writes.lock().push((offset, data.len() as u64));
        let mut files = self.files.lock();
        let file = files.entry(id).or_default();
        let end = offset as usize + data.len();
        if file.len() < end {
            file.resize(end, 0);
        }
        file[offset as usize..end].copy_from_slice(&data);
        resolved(Response::success())
    }

    fn create(&self, id: FileId, _capacity: u64) -> Future<Response> {
        *self.others.lock() += 1;
        self.files.lock().insert(id, Vec::new());
        resolved(Response::success())
    }

    fn create_parameter_upload_id(&self, context: ParameterInstanceId) -> Future<FileIdResponse> {
        *self.others.lock() += 1;
        resolved(FileIdResponse {
            status: StatusCode::Success,
            message: String::new(),
            file_id: format!("upload:{context}"),
        })
    }
}

//! File API over IPC: proxy and stub dispatch.

use std::sync::Arc;

use super::manager::Manager;
use super::message::decode_value;
use super::methods::{FileApiMethod, MethodCatalogue};
use super::proxy::Proxy;
use super::stub::{Dispatch, Stub, Target, encoded};
use crate::error::Result;
use crate::future::Future;
use crate::model::{
    FileId, FileIdResponse, FileInfoResponse, FileReadResponse, ParameterInstanceId, Response,
};
use crate::service::ports::FileApi;

/// Remote [`FileApi`] reached through a connection.
pub struct FileApiProxy {
    proxy: Proxy,
}

impl FileApiProxy {
    pub fn new(manager: &Arc<Manager>, object_id: u32) -> Result<Self> {
        Ok(Self {
            proxy: Proxy::register(manager, FileApiMethod::INTERFACE, object_id)?,
        })
    }

    pub fn open_call_count(&self) -> usize {
        self.proxy.open_call_count()
    }
}

impl FileApi for FileApiProxy {
    fn get_file_info(&self, id: FileId) -> Future<FileInfoResponse> {
        self.proxy.call(FileApiMethod::GetFileInfo, &id)
    }

    fn read(&self, id: FileId, offset: u64, length: u64) -> Future<FileReadResponse> {
        self.proxy.call(FileApiMethod::Read, &(id, offset, length))
    }

    fn write(&self, id: FileId, offset: u64, data: Vec<u8>) -> Future<Response> {
        self.proxy.call(FileApiMethod::Write, &(id, offset, data))
    }

    fn create(&self, id: FileId, capacity: u64) -> Future<Response> {
        self.proxy.call(FileApiMethod::Create, &(id, capacity))
    }

    fn create_parameter_upload_id(&self, context: ParameterInstanceId) -> Future<FileIdResponse> {
        self.proxy
            .call(FileApiMethod::CreateParameterUploadId, &context)
    }
}

/// Stub-side adapter for a [`FileApi`] implementation.
pub struct FileApiDispatch {
    target: Target<dyn FileApi>,
}

impl FileApiDispatch {
    pub fn shared(target: Arc<dyn FileApi>) -> Self {
        Self {
            target: Target::Shared(target),
        }
    }

    pub fn owned(target: Box<dyn FileApi>) -> Self {
        Self {
            target: Target::Owned(target),
        }
    }
}

impl Dispatch for FileApiDispatch {
    fn interface(&self) -> &'static str {
        FileApiMethod::INTERFACE
    }

    fn dispatch(&self, method_id: u16, args: &[u8]) -> Result<Future<Vec<u8>>> {
        Ok(match FileApiMethod::try_from(method_id)? {
            FileApiMethod::GetFileInfo => {
                let id: FileId = decode_value(args)?;
                encoded(self.target.get_file_info(id))
            }
            FileApiMethod::Read => {
                let (id, offset, length): (FileId, u64, u64) = decode_value(args)?;
                encoded(self.target.read(id, offset, length))
            }
            FileApiMethod::Write => {
                let (id, offset, data): (FileId, u64, Vec<u8>) = decode_value(args)?;
                encoded(self.target.write(id, offset, data))
            }
            FileApiMethod::Create => {
                let (id, capacity): (FileId, u64) = decode_value(args)?;
                encoded(self.target.create(id, capacity))
            }
            FileApiMethod::CreateParameterUploadId => {
                let context: ParameterInstanceId = decode_value(args)?;
                encoded(self.target.create_parameter_upload_id(context))
            }
        })
    }
}

pub type FileApiStub = Stub<FileApiDispatch>;

// ── Tests ────────────────────────────────────────────────────

//! Open file backed by a handle on the peer.

use std::fmt;

use bytes::Bytes;
use tracing::debug;
use vfuse_proto::{CloseReq, ReadReq, TruncateReq};
use vfuse_types::FileHandle;

use crate::client::RelayClient;
use crate::errno::FsResult;
use crate::ops::FileOps;
use crate::types::{OpenFlags, RequestContext};

/// A file opened through the relay. Every operation is forwarded by
/// handle; nothing is cached locally.
pub struct RemoteFile {
    client: RelayClient,
    handle: FileHandle,
    // Kept for diagnostics only.
    orig_name: String,
    orig_flags: u32,
}

impl RemoteFile {
    pub(crate) fn new(client: RelayClient, handle: FileHandle, name: &str, flags: u32) -> Self {
        Self {
            client,
            handle,
            orig_name: name.to_string(),
            orig_flags: flags,
        }
    }

    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.orig_name
    }
}

impl fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile")
            .field("handle", &self.handle)
            .field("name", &self.orig_name)
            .field("flags", &OpenFlags::from_raw(self.orig_flags))
            .finish()
    }
}

#[async_trait::async_trait]
impl FileOps for RemoteFile {
    async fn read(&self, ctx: &RequestContext, size: u32, offset: u64) -> FsResult<Bytes> {
        debug!(fh = %self.handle, name = %self.orig_name, size, offset, "read");
        let req = ReadReq {
            handle: self.handle,
            offset,
            size: size as u64,
        };
        let rsp = self.client.call(ctx, req).await?;
        Ok(rsp.data)
    }

    async fn truncate(&self, ctx: &RequestContext, size: u64) -> FsResult<()> {
        debug!(fh = %self.handle, name = %self.orig_name, size, "ftruncate");
        self.client
            .call(ctx, TruncateReq::by_handle(self.handle, size))
            .await?;
        Ok(())
    }

    async fn flush(&self, ctx: &RequestContext) -> FsResult<()> {
        debug!(fh = %self.handle, name = %self.orig_name, "flush");
        self.client.call(ctx, CloseReq { handle: self.handle }).await?;
        Ok(())
    }
}

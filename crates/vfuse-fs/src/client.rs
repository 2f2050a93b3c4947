//! Relay calls with filesystem error semantics.

use tracing::debug;
use vfuse_net::Connection;
use vfuse_proto::{Call, Reply};

use crate::errno::{check_remote, net_errno, FsResult};
use crate::types::RequestContext;

/// Thin wrapper over the shared [`Connection`] that turns every failure
/// into an errno. Cloned into each open file.
#[derive(Debug, Clone)]
pub struct RelayClient {
    conn: Connection,
}

impl RelayClient {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Send `req`, wait for the matching response and reject it if the
    /// peer reported an error.
    pub async fn call<R: Call>(&self, ctx: &RequestContext, req: R) -> FsResult<R::Response> {
        let rsp = self
            .conn
            .call(req, ctx.deadline)
            .await
            .map_err(|e| net_errno(R::NAME, &e))?;
        if let Some(err) = rsp.remote_error() {
            debug!(op = R::NAME, error = %err, "peer reported error");
        }
        check_remote(rsp.remote_error())?;
        Ok(rsp)
    }
}

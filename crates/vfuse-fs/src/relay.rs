//! Filesystem whose every operation is forwarded to a remote peer.

use std::time::SystemTime;

use tracing::{debug, warn};
use vfuse_net::{Connection, ConnectionProvider};
use vfuse_proto::{
    Attr, AttrReq, ChmodReq, MkdirReq, MknodReq, OpenReq, ReaddirReq, ReadlinkReq, RenameReq,
    RmdirReq, SymlinkReq, TruncateReq, UnlinkReq, UtimeReq,
};
use vfuse_types::Timespec;

use crate::client::RelayClient;
use crate::config::RelayConfig;
use crate::errno::FsResult;
use crate::file::RemoteFile;
use crate::ops::{FileOps, PathFs};
use crate::types::{DirEntry, FileAttr, RequestContext, StatFs, S_IFDIR};

/// Relay filesystem over a single lazily established connection.
#[derive(Debug)]
pub struct RelayFs {
    client: RelayClient,
    config: RelayConfig,
}

impl RelayFs {
    pub fn new(provider: impl ConnectionProvider, config: RelayConfig) -> Self {
        let conn = Connection::new(provider).with_request_timeout(config.request_timeout());
        Self::with_connection(conn, config)
    }

    pub fn with_connection(conn: Connection, config: RelayConfig) -> Self {
        Self {
            client: RelayClient::new(conn),
            config,
        }
    }

    pub fn connection(&self) -> &Connection {
        self.client.connection()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Attributes of the mount root, answered without asking the peer.
    pub fn root_attr(&self) -> FileAttr {
        FileAttr {
            size: 0,
            blocks: 1,
            mode: S_IFDIR | self.config.root_mode,
            nlink: 1,
            blksize: self.config.block_size,
        }
    }

    fn to_file_attr(&self, attr: Attr) -> FileAttr {
        let blksize = self.config.block_size.max(1);
        FileAttr {
            size: attr.size,
            blocks: attr.size / blksize as u64,
            mode: attr.mode,
            nlink: 1,
            blksize,
        }
    }
}

fn is_root(path: &str) -> bool {
    path.trim_matches('/').is_empty()
}

/// Names on the wire are relative to the mount root.
fn wire_name(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

fn wire_time(t: Option<SystemTime>) -> Timespec {
    t.map(Timespec::from).unwrap_or(Timespec::UNSET)
}

#[async_trait::async_trait]
impl PathFs for RelayFs {
    async fn getattr(&self, ctx: &RequestContext, path: &str) -> FsResult<FileAttr> {
        debug!(path, pid = ctx.pid, "getattr");
        if is_root(path) {
            return Ok(self.root_attr());
        }
        let rsp = self
            .client
            .call(ctx, AttrReq {
                name: wire_name(path),
            })
            .await?;
        match rsp.attr {
            Some(attr) => Ok(self.to_file_attr(attr)),
            None => {
                warn!(path, "attr response carried neither error nor attributes");
                Err(libc::EIO)
            }
        }
    }

    async fn chmod(&self, ctx: &RequestContext, path: &str, mode: u32) -> FsResult<()> {
        debug!(path, mode = format_args!("{:o}", mode), "chmod");
        self.client
            .call(ctx, ChmodReq {
                name: wire_name(path),
                mode,
            })
            .await?;
        Ok(())
    }

    async fn truncate(&self, ctx: &RequestContext, path: &str, size: u64) -> FsResult<()> {
        debug!(path, size, "truncate");
        self.client
            .call(ctx, TruncateReq::by_name(wire_name(path), size))
            .await?;
        Ok(())
    }

    async fn utimens(
        &self,
        ctx: &RequestContext,
        path: &str,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> FsResult<()> {
        let req = UtimeReq {
            name: wire_name(path),
            atime: wire_time(atime),
            mtime: wire_time(mtime),
        };
        debug!(path, atime = ?req.atime, mtime = ?req.mtime, "utimens");
        self.client.call(ctx, req).await?;
        Ok(())
    }

    async fn open(
        &self,
        ctx: &RequestContext,
        path: &str,
        flags: u32,
    ) -> FsResult<Box<dyn FileOps>> {
        debug!(path, flags = format_args!("{:#x}", flags), pid = ctx.pid, "open");
        let rsp = self
            .client
            .call(ctx, OpenReq {
                name: wire_name(path),
                flags,
            })
            .await?;
        if !rsp.handle.is_valid() {
            warn!(path, "open succeeded without a file handle");
            return Err(libc::EIO);
        }
        debug!(path, fh = %rsp.handle, "opened");
        Ok(Box::new(RemoteFile::new(
            self.client.clone(),
            rsp.handle,
            path,
            flags,
        )))
    }

    async fn mknod(&self, ctx: &RequestContext, path: &str, mode: u32, dev: u32) -> FsResult<()> {
        debug!(path, mode = format_args!("{:o}", mode), dev, "mknod");
        self.client
            .call(ctx, MknodReq {
                name: wire_name(path),
                mode,
                dev,
            })
            .await?;
        Ok(())
    }

    async fn unlink(&self, ctx: &RequestContext, path: &str) -> FsResult<()> {
        debug!(path, "unlink");
        self.client
            .call(ctx, UnlinkReq {
                name: wire_name(path),
            })
            .await?;
        Ok(())
    }

    async fn rename(&self, ctx: &RequestContext, from: &str, to: &str) -> FsResult<()> {
        debug!(from, to, "rename");
        self.client
            .call(ctx, RenameReq {
                name: wire_name(from),
                target: wire_name(to),
            })
            .await?;
        Ok(())
    }

    async fn opendir(&self, ctx: &RequestContext, path: &str) -> FsResult<Vec<DirEntry>> {
        debug!(path, "opendir");
        let rsp = self
            .client
            .call(ctx, ReaddirReq {
                name: wire_name(path),
            })
            .await?;
        Ok(rsp.entries.into_iter().map(DirEntry::from).collect())
    }

    async fn mkdir(&self, ctx: &RequestContext, path: &str, mode: u32) -> FsResult<()> {
        debug!(path, mode = format_args!("{:o}", mode), "mkdir");
        self.client
            .call(ctx, MkdirReq {
                name: wire_name(path),
                mode,
            })
            .await?;
        Ok(())
    }

    async fn rmdir(&self, ctx: &RequestContext, path: &str) -> FsResult<()> {
        debug!(path, "rmdir");
        self.client
            .call(ctx, RmdirReq {
                name: wire_name(path),
            })
            .await?;
        Ok(())
    }

    async fn symlink(&self, ctx: &RequestContext, target: &str, link_path: &str) -> FsResult<()> {
        debug!(target, link_path, "symlink");
        self.client
            .call(ctx, SymlinkReq {
                value: target.to_string(),
                name: wire_name(link_path),
            })
            .await?;
        Ok(())
    }

    async fn readlink(&self, ctx: &RequestContext, path: &str) -> FsResult<String> {
        debug!(path, "readlink");
        let rsp = self
            .client
            .call(ctx, ReadlinkReq {
                name: wire_name(path),
            })
            .await?;
        Ok(rsp.target)
    }

    async fn statfs(&self, _ctx: &RequestContext, path: &str) -> FsResult<StatFs> {
        debug!(path, "statfs");
        Ok(StatFs::from(&self.config.statfs))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use vfuse_net::{provider_fn, ConnectionState, NetError};

    use super::*;

    /// A filesystem whose provider only counts how often it is asked.
    fn counting_fs() -> (RelayFs, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fs = RelayFs::new(
            provider_fn(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<tokio::io::DuplexStream, _>(NetError::ConnectionFailed("no peer".into()))
            }),
            RelayConfig::default(),
        );
        (fs, calls)
    }

    #[tokio::test]
    async fn test_root_attr_is_local() {
        let (fs, calls) = counting_fs();
        let ctx = RequestContext::default();

        for path in ["", "/"] {
            let attr = fs.getattr(&ctx, path).await.unwrap();
            assert_eq!(attr.mode, S_IFDIR | 0o755);
            assert_eq!(attr.nlink, 1);
            assert_eq!(attr.blksize, 1024);
            assert_eq!(attr.blocks, 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(fs.connection().state(), ConnectionState::Unconnected);
    }

    #[tokio::test]
    async fn test_statfs_is_constant() {
        let (fs, calls) = counting_fs();
        let st = fs.statfs(&RequestContext::default(), "").await.unwrap();
        assert_eq!(st.bsize, 1024);
        assert_eq!(st.blocks, 1_000_000);
        assert_eq!(st.bfree, 500_000);
        assert_eq!(st.bavail, 500_000);
        assert_eq!(st.files, 1000);
        assert_eq!(st.ffree, 998);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_is_eio() {
        let (fs, calls) = counting_fs();
        let ctx = RequestContext::default();
        assert_eq!(fs.getattr(&ctx, "a").await, Err(libc::EIO));
        assert_eq!(fs.mkdir(&ctx, "d", 0o755).await, Err(libc::EIO));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_attr_translation() {
        let (fs, _) = counting_fs();
        let attr = fs.to_file_attr(Attr {
            size: 5000,
            mode: 0o100644,
        });
        assert_eq!(attr.size, 5000);
        assert_eq!(attr.blocks, 4);
        assert_eq!(attr.nlink, 1);
        assert_eq!(attr.blksize, 1024);
    }

    #[test]
    fn test_wire_names() {
        assert!(is_root(""));
        assert!(is_root("/"));
        assert!(!is_root("a"));
        assert_eq!(wire_name("/a/b"), "a/b");
        assert_eq!(wire_name("a"), "a");
        assert_eq!(wire_time(None), Timespec::UNSET);
    }
}

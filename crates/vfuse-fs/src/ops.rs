//! Path-based handler contract called by the FUSE dispatch layer.
//!
//! Paths are relative to the mount root, without a leading slash; the root
//! itself is `""`. Default implementations return `ENOSYS`.

use std::time::SystemTime;

use bytes::Bytes;

use crate::errno::FsResult;
use crate::types::{DirEntry, FileAttr, RequestContext, StatFs};

#[async_trait::async_trait]
pub trait PathFs: Send + Sync + 'static {
    // ── Attributes ──────────────────────────────────────────────────────

    async fn getattr(&self, ctx: &RequestContext, path: &str) -> FsResult<FileAttr> {
        let _ = (ctx, path);
        Err(libc::ENOSYS)
    }

    async fn chmod(&self, ctx: &RequestContext, path: &str, mode: u32) -> FsResult<()> {
        let _ = (ctx, path, mode);
        Err(libc::ENOSYS)
    }

    async fn truncate(&self, ctx: &RequestContext, path: &str, size: u64) -> FsResult<()> {
        let _ = (ctx, path, size);
        Err(libc::ENOSYS)
    }

    /// `None` leaves the corresponding timestamp unchanged.
    async fn utimens(
        &self,
        ctx: &RequestContext,
        path: &str,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> FsResult<()> {
        let _ = (ctx, path, atime, mtime);
        Err(libc::ENOSYS)
    }

    // ── Files ───────────────────────────────────────────────────────────

    async fn open(
        &self,
        ctx: &RequestContext,
        path: &str,
        flags: u32,
    ) -> FsResult<Box<dyn FileOps>> {
        let _ = (ctx, path, flags);
        Err(libc::ENOSYS)
    }

    async fn mknod(&self, ctx: &RequestContext, path: &str, mode: u32, dev: u32) -> FsResult<()> {
        let _ = (ctx, path, mode, dev);
        Err(libc::ENOSYS)
    }

    async fn unlink(&self, ctx: &RequestContext, path: &str) -> FsResult<()> {
        let _ = (ctx, path);
        Err(libc::ENOSYS)
    }

    async fn rename(&self, ctx: &RequestContext, from: &str, to: &str) -> FsResult<()> {
        let _ = (ctx, from, to);
        Err(libc::ENOSYS)
    }

    // ── Directories ─────────────────────────────────────────────────────

    /// The whole listing, in the order the backing store produced it.
    async fn opendir(&self, ctx: &RequestContext, path: &str) -> FsResult<Vec<DirEntry>> {
        let _ = (ctx, path);
        Err(libc::ENOSYS)
    }

    async fn mkdir(&self, ctx: &RequestContext, path: &str, mode: u32) -> FsResult<()> {
        let _ = (ctx, path, mode);
        Err(libc::ENOSYS)
    }

    async fn rmdir(&self, ctx: &RequestContext, path: &str) -> FsResult<()> {
        let _ = (ctx, path);
        Err(libc::ENOSYS)
    }

    // ── Links ───────────────────────────────────────────────────────────

    /// Create `link_path` pointing at `target`.
    async fn symlink(&self, ctx: &RequestContext, target: &str, link_path: &str) -> FsResult<()> {
        let _ = (ctx, target, link_path);
        Err(libc::ENOSYS)
    }

    async fn readlink(&self, ctx: &RequestContext, path: &str) -> FsResult<String> {
        let _ = (ctx, path);
        Err(libc::ENOSYS)
    }

    // ── Filesystem ──────────────────────────────────────────────────────

    async fn statfs(&self, ctx: &RequestContext, path: &str) -> FsResult<StatFs> {
        let _ = (ctx, path);
        Err(libc::ENOSYS)
    }
}

/// Operations on an open file.
#[async_trait::async_trait]
pub trait FileOps: Send + Sync + std::fmt::Debug {
    /// Up to `size` bytes starting at `offset`. Fewer bytes than asked for
    /// is not an error.
    async fn read(&self, ctx: &RequestContext, size: u32, offset: u64) -> FsResult<Bytes> {
        let _ = (ctx, size, offset);
        Err(libc::ENOSYS)
    }

    async fn truncate(&self, ctx: &RequestContext, size: u64) -> FsResult<()> {
        let _ = (ctx, size);
        Err(libc::ENOSYS)
    }

    /// Called on every close of the descriptor.
    async fn flush(&self, ctx: &RequestContext) -> FsResult<()> {
        let _ = ctx;
        Ok(())
    }
}

//! Filesystem-facing types handed back to the FUSE dispatch layer.

use std::time::Duration;

use tokio::time::Instant;

// ── File type bits (matching libc S_IF* constants) ──────────────────────────

pub const S_IFMT: u32 = libc::S_IFMT as u32;
pub const S_IFREG: u32 = libc::S_IFREG as u32;
pub const S_IFDIR: u32 = libc::S_IFDIR as u32;
pub const S_IFLNK: u32 = libc::S_IFLNK as u32;

// ── File attributes ─────────────────────────────────────────────────────────

/// Attributes reported for a path. Only what the peer provides is filled
/// in; timestamps and ownership are left to the dispatch layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileAttr {
    pub size: u64,
    /// Number of `blksize` blocks.
    pub blocks: u64,
    /// Type + permission bits.
    pub mode: u32,
    pub nlink: u32,
    pub blksize: u32,
}

impl FileAttr {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// One directory entry, in the order the peer listed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub mode: u32,
}

impl From<vfuse_proto::DirEntry> for DirEntry {
    fn from(e: vfuse_proto::DirEntry) -> Self {
        Self {
            name: e.name,
            mode: e.mode,
        }
    }
}

// ── Filesystem statistics ───────────────────────────────────────────────────

/// Mirrors `struct statvfs`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatFs {
    pub bsize: u64,
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub namelen: u32,
}

// ── Open file flags ─────────────────────────────────────────────────────────

/// Parsed open flags, kept with an open file for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub read_only: bool,
    pub write_only: bool,
    pub read_write: bool,
    pub create: bool,
    pub truncate: bool,
    pub append: bool,
}

impl OpenFlags {
    pub fn from_raw(flags: u32) -> Self {
        let flags = flags as i32;
        let access_mode = flags & libc::O_ACCMODE;
        Self {
            read_only: access_mode == libc::O_RDONLY,
            write_only: access_mode == libc::O_WRONLY,
            read_write: access_mode == libc::O_RDWR,
            create: flags & libc::O_CREAT != 0,
            truncate: flags & libc::O_TRUNC != 0,
            append: flags & libc::O_APPEND != 0,
        }
    }

    pub fn is_writable(&self) -> bool {
        self.write_only || self.read_write
    }
}

// ── Request context ─────────────────────────────────────────────────────────

/// Caller identity plus an optional deadline for the whole operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
    pub deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(uid: u32, gid: u32, pid: u32) -> Self {
        Self {
            uid,
            gid,
            pid,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }
}

//! Request/response message pairs, one per relayed filesystem operation.
//!
//! Paths are relative to the mount root; the root itself is `""`. Every
//! response carries an optional [`RemoteError`] next to its payload.

use std::fmt;

use bytes::Bytes;
use vfuse_serde::{WireDeserialize, WireSerialize};
use vfuse_types::{FileHandle, Timespec};

// ---------------------------------------------------------------------------
// Shared records
// ---------------------------------------------------------------------------

/// Failure reported by the peer. The flags are checked in declaration order
/// when mapping to an errno; a record with no flag set is a generic failure.
#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct RemoteError {
    pub not_exist: bool,
    pub read_only: bool,
    pub not_dir: bool,
    /// Free-form diagnostic from the peer. Never interpreted.
    pub message: Option<String>,
}

impl RemoteError {
    pub fn not_exist() -> Self {
        Self {
            not_exist: true,
            ..Default::default()
        }
    }

    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    pub fn not_dir() -> Self {
        Self {
            not_dir: true,
            ..Default::default()
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.not_exist {
            "not exist"
        } else if self.read_only {
            "read only"
        } else if self.not_dir {
            "not a directory"
        } else {
            "remote failure"
        };
        match &self.message {
            Some(msg) => write!(f, "{}: {}", kind, msg),
            None => f.write_str(kind),
        }
    }
}

impl std::error::Error for RemoteError {}

/// File attributes as the peer reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct Attr {
    pub size: u64,
    /// Type bits plus permission bits, as in `st_mode`.
    pub mode: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct DirEntry {
    pub name: String,
    pub mode: u32,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, mode: u32) -> Self {
        Self {
            name: name.into(),
            mode,
        }
    }
}

// ---- Attr ----

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct AttrReq {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct AttrRsp {
    pub err: Option<RemoteError>,
    pub attr: Option<Attr>,
}

// ---- Open ----

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct OpenReq {
    pub name: String,
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct OpenRsp {
    pub err: Option<RemoteError>,
    pub handle: FileHandle,
}

// ---- Close ----

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct CloseReq {
    pub handle: FileHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct CloseRsp {
    pub err: Option<RemoteError>,
}

// ---- Read ----

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct ReadReq {
    pub handle: FileHandle,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct ReadRsp {
    pub err: Option<RemoteError>,
    pub data: Bytes,
}

// ---- Readdir ----

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct ReaddirReq {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct ReaddirRsp {
    pub err: Option<RemoteError>,
    pub entries: Vec<DirEntry>,
}

// ---- Readlink ----

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct ReadlinkReq {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct ReadlinkRsp {
    pub err: Option<RemoteError>,
    pub target: String,
}

// ---- Rename ----

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct RenameReq {
    pub name: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct RenameRsp {
    pub err: Option<RemoteError>,
}

// ---- Mkdir ----

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct MkdirReq {
    pub name: String,
    pub mode: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct MkdirRsp {
    pub err: Option<RemoteError>,
}

// ---- Rmdir ----

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct RmdirReq {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct RmdirRsp {
    pub err: Option<RemoteError>,
}

// ---- Symlink ----

/// Create a link at `name` whose content is `value`.
#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct SymlinkReq {
    pub value: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct SymlinkRsp {
    pub err: Option<RemoteError>,
}

// ---- Unlink ----

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct UnlinkReq {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct UnlinkRsp {
    pub err: Option<RemoteError>,
}

// ---- Truncate ----

/// Exactly one of `name` and `handle` is set.
#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct TruncateReq {
    pub name: Option<String>,
    pub handle: Option<FileHandle>,
    pub size: u64,
}

impl TruncateReq {
    pub fn by_name(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: Some(name.into()),
            handle: None,
            size,
        }
    }

    pub fn by_handle(handle: FileHandle, size: u64) -> Self {
        Self {
            name: None,
            handle: Some(handle),
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct TruncateRsp {
    pub err: Option<RemoteError>,
}

// ---- Chmod ----

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct ChmodReq {
    pub name: String,
    pub mode: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct ChmodRsp {
    pub err: Option<RemoteError>,
}

// ---- Utime ----

/// Both timestamps are always present; [`Timespec::UNSET`] means "leave as is".
#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct UtimeReq {
    pub name: String,
    pub atime: Timespec,
    pub mtime: Timespec,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct UtimeRsp {
    pub err: Option<RemoteError>,
}

// ---- Mknod ----

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct MknodReq {
    pub name: String,
    pub mode: u32,
    pub dev: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, WireSerialize, WireDeserialize)]
pub struct MknodRsp {
    pub err: Option<RemoteError>,
}

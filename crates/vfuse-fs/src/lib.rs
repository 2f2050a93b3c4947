//! Relay filesystem: a path-based FUSE handler that forwards every
//! operation over one connection to the peer that owns the data.
//!
//! # Modules
//!
//! - [`ops`]: `PathFs` and `FileOps`, the handler contract
//! - [`relay`]: `RelayFs`, the forwarding implementation
//! - [`file`]: `RemoteFile`, an open handle on the peer
//! - [`errno`]: mapping of remote and local failures to errno
//! - [`config`]: `RelayConfig`
//! - [`types`]: attributes, directory entries, statfs, request context

pub mod client;
pub mod config;
pub mod errno;
pub mod file;
pub mod ops;
pub mod relay;
pub mod types;

pub use client::RelayClient;
pub use config::{RelayConfig, StatFsConfig};
pub use errno::FsResult;
pub use file::RemoteFile;
pub use ops::{FileOps, PathFs};
pub use relay::RelayFs;
pub use types::{DirEntry, FileAttr, OpenFlags, RequestContext, StatFs};

//! Translation of relay failures into errno values.

use tracing::warn;
use vfuse_net::NetError;
use vfuse_proto::RemoteError;

/// Result of a filesystem operation; the error is a positive errno.
pub type FsResult<T> = std::result::Result<T, i32>;

/// errno for an error record reported by the peer. Flags are checked in
/// order; a record with none of them set is a generic I/O failure.
pub fn remote_errno(err: &RemoteError) -> i32 {
    if err.not_exist {
        libc::ENOENT
    } else if err.read_only {
        libc::EROFS
    } else if err.not_dir {
        libc::ENOTDIR
    } else {
        libc::EIO
    }
}

/// Success when the peer reported nothing, otherwise the mapped errno.
pub fn check_remote(err: Option<&RemoteError>) -> FsResult<()> {
    match err {
        None => Ok(()),
        Some(e) => Err(remote_errno(e)),
    }
}

/// Every local failure (transport, timeout, desync, wrong response kind)
/// surfaces to the kernel as `EIO`.
pub fn net_errno(op: &'static str, err: &NetError) -> i32 {
    match err {
        NetError::Timeout => warn!(op, "relay call timed out"),
        e => warn!(op, error = %e, "relay call failed"),
    }
    libc::EIO
}

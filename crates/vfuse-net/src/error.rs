use thiserror::Error;
use vfuse_types::RequestId;

/// Errors raised by the packet transport and the connection it runs on.
///
/// Transport failures and [`NetError::ProtocolDesync`] end the connection;
/// [`NetError::Timeout`] and [`NetError::UnexpectedResponse`] only fail the
/// call that observed them.
#[derive(Debug, Error)]
pub enum NetError {
    /// The peer closed the stream, or the connection was already torn down.
    #[error("connection closed")]
    ConnectionClosed,

    /// Establishing the connection failed; the failure is permanent.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The call's deadline passed before a response arrived.
    #[error("timeout")]
    Timeout,

    /// An I/O error from the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The frame checksum did not match the computed CRC32C.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// The frame header does not carry the packet magic number.
    #[error("invalid frame: bad magic (checksum low byte: {0:#04x})")]
    InvalidMagic(u8),

    /// The frame size exceeds the maximum allowed.
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A response arrived for an id that has no pending request.
    #[error("protocol desync: response for unknown request {0}")]
    ProtocolDesync(RequestId),

    /// The response kind does not answer the request that was sent.
    #[error("unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },

    /// The payload could not be encoded or decoded.
    #[error("wire error: {0}")]
    Wire(#[from] vfuse_serde::WireError),
}

impl NetError {
    /// Whether a call that failed with this error leaves the connection
    /// unusable. Encoding failures are caught before any byte is written,
    /// so they stay local to the call. The read loop ends the connection
    /// on any error regardless.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            NetError::Timeout
                | NetError::UnexpectedResponse { .. }
                | NetError::Wire(_)
                | NetError::MessageTooLarge { .. }
        )
    }
}

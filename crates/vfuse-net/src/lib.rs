//! Packet transport and request correlation for the relay connection.

pub mod connection;
pub mod error;
pub mod message;
pub mod provider;
pub mod registry;
pub mod transport;

pub use connection::{Connection, ConnectionState};
pub use error::NetError;
pub use message::FrameHeader;
pub use provider::{
    provider_fn, BoxedStream, ConnectionProvider, DuplexStream, FnProvider, ReadyStream,
    TcpAcceptor, TcpConnector,
};
pub use registry::{CorrelationRegistry, Dispatch};
pub use transport::{PacketReader, PacketWriter};

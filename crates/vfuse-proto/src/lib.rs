//! Wire protocol between the relay filesystem and the peer that owns the
//! data: fifteen request/response pairs carried in [`Packet`]s.

pub mod body;
pub mod messages;

pub use body::{Body, Call, Reply, Packet};
pub use messages::*;

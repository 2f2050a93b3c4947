mod wire;

pub use vfuse_serde_derive::{WireDeserialize, WireSerialize};
pub use wire::{from_bytes, to_bytes, WireDeserialize, WireError, WireSerialize};

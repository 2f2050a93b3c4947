#[macro_use]
pub mod strong_type;

pub mod ids;
pub mod time;

pub use ids::*;
pub use time::Timespec;

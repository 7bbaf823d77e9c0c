//! Data structures: the order aggregate and the tracking wire messages.

pub mod message;
pub mod order;

pub use message::*;
pub use order::*;

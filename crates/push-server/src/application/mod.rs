//! Application layer: use cases that sit between the socket loops and the
//! registry.

pub mod relay;

pub use relay::{relay_chunk, RELAY_OPCODE};

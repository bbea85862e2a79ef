//! Domain layer: connections, frames, and handshake metadata.
//!
//! Nothing in this module performs I/O on its own.  A [`Connection`] owns a
//! socket, but only the registry decides when that socket is written to or
//! closed.
//!
//! [`Connection`]: connection::Connection

pub mod connection;
pub mod handshake;
pub mod id;
pub mod message;

pub use connection::Connection;
pub use handshake::{HandshakeHeaders, HeaderField};
pub use id::ConnectionId;
pub use message::{Message, CLOSE_FRAME};

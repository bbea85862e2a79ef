//! # push-core
//!
//! Connection registry and broadcast engine for a socket-based push server.
//!
//! The crate tracks every currently-connected client, serializes concurrent
//! mutation of that set behind a single lock, and delivers already-encoded
//! protocol frames to one, some, or all connected clients.
//!
//! # Architecture overview (for beginners)
//!
//! A push server has many threads touching the same set of connections at
//! once: the accept loop adds new clients, every per-connection reader thread
//! broadcasts what it received, and any of them may notice that a client has
//! gone away.  This crate is the part that keeps that shared set consistent.
//!
//! - **`domain`** – Plain data: the identity of a connection, the outbound
//!   frame model (`Message`), the parsed handshake headers, and the
//!   `Connection` that owns all of them.
//!
//! - **`socket`** – The `Socket` trait: the only seam between the registry
//!   and the operating system.  Production code uses `TcpSocket`; tests use
//!   `mock::RecordingSocket` or the `mockall`-generated `MockSocket`.
//!
//! - **`registry`** – `Registry`, the thread-safe ordered collection of live
//!   connections, with add/remove/delete/lookup and the three broadcast
//!   variants.
//!
//! The handshake negotiation and the frame codec are *not* part of this
//! crate.  They produce `HandshakeHeaders` and `Message` values; this crate
//! only stores them and sends the encoded bytes.

pub mod domain;
pub mod registry;
pub mod socket;

// Re-export the most-used types at the crate root so callers can write
// `push_core::Registry` instead of `push_core::registry::list::Registry`.
pub use domain::connection::Connection;
pub use domain::handshake::{HandshakeHeaders, HeaderField};
pub use domain::id::ConnectionId;
pub use domain::message::{Message, CLOSE_FRAME};
pub use registry::{BroadcastReport, ConnectionInfo, Registry, RegistryConfig, RegistryError};
pub use socket::{Socket, SocketHandle, TcpSocket};

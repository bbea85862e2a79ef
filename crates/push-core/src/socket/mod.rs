//! Socket abstraction used by the registry.
//!
//! The registry never talks to the operating system directly.  Everything it
//! needs from a client socket is captured by the [`Socket`] trait: a stable
//! handle for lookups, a blocking send of encoded bytes, and a close.
//!
//! # Testability
//!
//! The production implementation is [`TcpSocket`].  Tests use
//! [`mock::RecordingSocket`], which records every send and close in shared
//! counters, or the `mockall`-generated `MockSocket` for exact-call
//! expectations.

use std::fmt;
use std::io;

pub mod mock;
pub mod tcp;

pub use tcp::TcpSocket;

/// OS-level identifier of an open socket (a file descriptor on Unix, a
/// `SOCKET` on Windows).  Unique only while the socket is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketHandle(pub u64);

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The operations the registry performs on a client socket.
#[cfg_attr(test, mockall::automock)]
pub trait Socket: Send {
    /// Returns the OS handle of this socket.
    fn handle(&self) -> SocketHandle;

    /// Sends all of `bytes`, blocking until they are handed to the OS.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the peer is gone or the socket
    /// has been closed.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Closes the socket.  Called exactly once, when the owning connection
    /// is released.
    fn close(&mut self);
}

//! The connection registry and its broadcast engine.
//!
//! [`Registry`] is the single source of truth for which clients are online.
//! Every operation, including the blocking sends of a broadcast, runs under
//! one mutex, so a broadcast always sees a consistent set of connections: no
//! add or remove can land half-way through it.

use std::collections::TryReserveError;
use std::thread::ThreadId;

use thiserror::Error;

use crate::domain::ConnectionId;
use crate::socket::SocketHandle;

mod broadcast;
mod list;

pub use list::Registry;

/// Error type for registry construction.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Pre-reserving connection slots failed.
    #[error("failed to reserve space for {requested} connections: {source}")]
    Allocation {
        requested: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Behaviour switches for a [`Registry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Remove and release connections whose send failed, at the end of the
    /// same broadcast.  When `false`, failures are only reported; the read
    /// loop is expected to notice the dead peer and call `remove` itself.
    pub reap_failed_sends: bool,
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections that accepted the bytes.
    pub delivered: usize,
    /// Connections whose send returned an error, in registry order.
    pub failed: Vec<ConnectionId>,
    /// Length of the encoded frame sent to each target.
    pub bytes_per_send: usize,
    /// How many of `failed` were removed because of
    /// [`RegistryConfig::reap_failed_sends`].
    pub reaped: usize,
}

impl BroadcastReport {
    /// Number of sends attempted.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed.len()
    }

    /// `true` when every attempted send succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Read-only view of one connection, for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub socket: SocketHandle,
    pub address: String,
    pub worker: Option<ThreadId>,
    pub established: bool,
}

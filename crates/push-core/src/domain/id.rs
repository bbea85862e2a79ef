//! Process-unique connection identities.
//!
//! # Why not compare sockets? (for beginners)
//!
//! The operating system reuses socket descriptors: after descriptor 7 is
//! closed, the very next `accept()` may hand out descriptor 7 again.  A thread
//! still holding "the connection on socket 7" would then act on a stranger.
//!
//! A [`ConnectionId`] is allocated from a single atomic counter the moment a
//! connection is created and is never handed out twice.  Every registry
//! operation that takes an id re-checks it under the lock, so an id that
//! refers to an already-removed connection simply matches nothing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Next id to hand out.  Starts at 1 so that 0 never names a connection.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, never-reused identity of one [`Connection`](super::Connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates a fresh identity.
    ///
    /// Uses `Ordering::Relaxed`: the only requirement is uniqueness, which
    /// `fetch_add` guarantees regardless of ordering.
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value, for logging.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

//! Registry storage, membership, and teardown.
//!
//! # Data structure
//!
//! Connections live in a `Vec` in insertion order.  New clients are appended
//! at the tail; removal finds the client by identity and shifts the rest
//! down.  "First" and "last" are simply the two ends of the vector, so the
//! count/first/last invariants can never drift apart.
//!
//! # Locking discipline
//!
//! One `std::sync::Mutex` guards the vector.  Every public method acquires it
//! once for its whole body and never calls another locking method while
//! holding it.  A poisoned lock (a collaborator thread panicked mid-call) is
//! recovered rather than propagated, so other threads keep working.

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use tracing::{debug, info};

use super::{ConnectionInfo, RegistryConfig, RegistryError};
use crate::domain::{Connection, ConnectionId, Message};
use crate::socket::{Socket, SocketHandle, TcpSocket};

/// Thread-safe ordered collection of live connections.
///
/// Share it between threads with an `Arc<Registry>`.  Each registry is fully
/// independent; there is no process-wide instance.
pub struct Registry<S: Socket = TcpSocket> {
    connections: Mutex<Vec<Connection<S>>>,
    pub(super) config: RegistryConfig,
}

impl<S: Socket> Registry<S> {
    /// Creates an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Creates an empty registry with the given configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Creates an empty registry with room for `capacity` connections.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Allocation`] if the space cannot be reserved.
    /// The caller decides whether to retry, degrade, or exit.
    pub fn try_with_capacity(
        capacity: usize,
        config: RegistryConfig,
    ) -> Result<Self, RegistryError> {
        let mut connections = Vec::new();
        connections
            .try_reserve(capacity)
            .map_err(|source| RegistryError::Allocation {
                requested: capacity,
                source,
            })?;
        Ok(Self {
            connections: Mutex::new(connections),
            config,
        })
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, Vec<Connection<S>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ── Membership ────────────────────────────────────────────────────────────

    /// Appends `connection` at the tail and takes ownership of it.
    ///
    /// Returns the id to use for every later operation on this connection.
    pub fn add(&self, connection: Connection<S>) -> ConnectionId {
        let id = connection.id();
        let mut list = self.lock();
        debug!(
            "registering {id} ({}, socket {})",
            connection.address(),
            connection.socket_handle()
        );
        list.push(connection);
        debug!("{} connection(s) online", list.len());
        id
    }

    /// Unlinks the connection, releases its resources, and closes its socket.
    ///
    /// Returns `false` (doing nothing) when `id` is not in the registry, for
    /// example because another thread already removed it.  Of any number of
    /// concurrent calls with the same id, exactly one returns `true`.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut list = self.lock();
        match unlink(&mut list, id) {
            Some(connection) => {
                debug!("removing {id} ({}); {} left", connection.address(), list.len());
                connection.release();
                true
            }
            None => false,
        }
    }

    /// Unlinks the connection *without* releasing it and hands it back.
    ///
    /// The socket stays open and the buffers stay intact; the caller now owns
    /// the teardown.  Returns `None` when `id` is not in the registry.
    pub fn delete(&self, id: ConnectionId) -> Option<Connection<S>> {
        let mut list = self.lock();
        let connection = unlink(&mut list, id)?;
        debug!("detached {id} ({}); {} left", connection.address(), list.len());
        Some(connection)
    }

    /// Finds the connection with this socket handle and peer address.
    ///
    /// The returned id is a snapshot: the connection may be removed by another
    /// thread right after this call returns.  Every id-taking method checks
    /// the id again under the lock, and ids are never reused, so acting on a
    /// stale id is a harmless no-op.
    pub fn lookup(&self, address: &str, socket: SocketHandle) -> Option<ConnectionId> {
        self.lock()
            .iter()
            .find(|c| c.socket_handle() == socket && c.address() == address)
            .map(Connection::id)
    }

    /// `true` if `id` is currently registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().iter().any(|c| c.id() == id)
    }

    /// Runs `f` on the connection with this id under the registry lock.
    ///
    /// This is the look-up-and-act primitive: the connection cannot be removed
    /// while `f` runs.  Returns `None` when `id` is not registered.
    ///
    /// `f` must not call back into this registry; the lock is not re-entrant.
    pub fn with_connection<R>(
        &self,
        id: ConnectionId,
        f: impl FnOnce(&mut Connection<S>) -> R,
    ) -> Option<R> {
        let mut list = self.lock();
        list.iter_mut().find(|c| c.id() == id).map(f)
    }

    /// Attaches `message` as the connection's outgoing message.
    ///
    /// The superseded message, if any, is released.  Returns `false` when `id`
    /// is not registered (the message is dropped).
    pub fn set_message(&self, id: ConnectionId, message: Message) -> bool {
        self.with_connection(id, |c| {
            if let Some(mut old) = c.replace_message(message) {
                old.release();
            }
        })
        .is_some()
    }

    // ── Introspection ─────────────────────────────────────────────────────────

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Id of the connection at the head of the registry.
    pub fn first(&self) -> Option<ConnectionId> {
        self.lock().first().map(Connection::id)
    }

    /// Id of the connection at the tail of the registry.
    pub fn last(&self) -> Option<ConnectionId> {
        self.lock().last().map(Connection::id)
    }

    /// Ids of every registered connection, in registry order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.lock().iter().map(Connection::id).collect()
    }

    /// Read-only copy of every connection's identity, for status displays.
    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        self.lock()
            .iter()
            .map(|c| ConnectionInfo {
                id: c.id(),
                socket: c.socket_handle(),
                address: c.address().to_string(),
                worker: c.worker,
                established: c.is_established(),
            })
            .collect()
    }

    /// Logs every registered connection at `info` level.
    pub fn log_state(&self) {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            info!("No clients are online.");
            return;
        }
        for info in &snapshot {
            info!("{}: socket {}, client {}", info.id, info.socket, info.address);
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────────

    /// Releases every connection and leaves the registry empty but usable.
    ///
    /// Returns how many connections were released.
    pub fn drain(&self) -> usize {
        let mut list = self.lock();
        let released = release_all(&mut list);
        if released > 0 {
            debug!("released {released} connection(s)");
        }
        released
    }

    /// Releases every connection and consumes the registry.
    ///
    /// Taking `self` by value means the registry cannot be used, or destroyed
    /// again, afterwards.  Returns how many connections were released.
    pub fn destroy(self) -> usize {
        self.drain()
    }
}

impl<S: Socket> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Socket> Drop for Registry<S> {
    fn drop(&mut self) {
        let list = self
            .connections
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        release_all(list);
    }
}

/// Never blocks: while the lock is held (for example when formatting from
/// inside a `with_connection` closure) the length prints as `<locked>`.
impl<S: Socket> std::fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("Registry");
        match self.connections.try_lock() {
            Ok(list) => out.field("len", &list.len()),
            Err(TryLockError::Poisoned(poisoned)) => out.field("len", &poisoned.into_inner().len()),
            Err(TryLockError::WouldBlock) => out.field("len", &format_args!("<locked>")),
        };
        out.field("config", &self.config).finish()
    }
}

/// Removes the connection with this id from the list, preserving the order of
/// the rest.  Shared by `remove`, `delete`, and broadcast reaping.
pub(super) fn unlink<S: Socket>(
    list: &mut Vec<Connection<S>>,
    id: ConnectionId,
) -> Option<Connection<S>> {
    let position = list.iter().position(|c| c.id() == id)?;
    Some(list.remove(position))
}

fn release_all<S: Socket>(list: &mut Vec<Connection<S>>) -> usize {
    let count = list.len();
    for connection in list.drain(..) {
        connection.release();
    }
    count
}

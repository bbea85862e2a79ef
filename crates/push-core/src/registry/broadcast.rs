//! Broadcast engine: fan-out of encoded frames to registered connections.
//!
//! All four operations walk the registry under its lock and perform one
//! blocking send per target.  Holding the lock across the sends is what
//! guarantees that a broadcast reaches exactly the set of connections that
//! was registered when it started.  The cost is that a slow peer delays every
//! other registry operation until its send returns; socket-level timeouts are
//! the caller's tool for bounding that.
//!
//! Send failures never abort a broadcast.  They are logged, collected in the
//! [`BroadcastReport`], and, when the registry was built with
//! [`RegistryConfig::reap_failed_sends`](super::RegistryConfig), the failed
//! connections are removed at the end of the same lock acquisition.

use tracing::{debug, warn};

use super::list::{unlink, Registry};
use super::BroadcastReport;
use crate::domain::{Connection, ConnectionId, Message, CLOSE_FRAME};
use crate::socket::Socket;

impl<S: Socket> Registry<S> {
    /// Sends the source connection's attached message to every *other*
    /// connection.
    ///
    /// No-op when the source is not registered, has no attached message, or
    /// the message has no encoded bytes.
    pub fn broadcast_except(&self, source: ConnectionId) -> BroadcastReport {
        let mut list = self.lock();
        let Some(position) = list.iter().position(|c| c.id() == source) else {
            return BroadcastReport::default();
        };
        // Detach the message while its bytes are sent to the other connections;
        // it goes back before anything else can observe the source.
        let Some(message) = list[position].message.take() else {
            return BroadcastReport::default();
        };

        let report = match message.encoded() {
            Some(bytes) => send_each(&mut list, bytes, |c| c.id() != source),
            None => BroadcastReport::default(),
        };
        list[position].message = Some(message);

        debug!(
            "broadcast from {source}: {} delivered, {} failed",
            report.delivered,
            report.failed.len()
        );
        self.reap(&mut list, report)
    }

    /// Sends `message` to the single connection with this id.
    ///
    /// No-op when the target is not registered.
    pub fn broadcast_one(&self, target: ConnectionId, message: &Message) -> BroadcastReport {
        let Some(bytes) = message.encoded() else {
            return BroadcastReport::default();
        };
        let mut list = self.lock();
        let report = match list.iter_mut().find(|c| c.id() == target) {
            Some(connection) => send_each(std::slice::from_mut(connection), bytes, |_| true),
            None => BroadcastReport::default(),
        };
        self.reap(&mut list, report)
    }

    /// Sends `message` to every registered connection.
    pub fn broadcast_all(&self, message: &Message) -> BroadcastReport {
        let Some(bytes) = message.encoded() else {
            return BroadcastReport::default();
        };
        let mut list = self.lock();
        let report = send_each(&mut list, bytes, |_| true);
        debug!(
            "broadcast to all: {} delivered, {} failed",
            report.delivered,
            report.failed.len()
        );
        self.reap(&mut list, report)
    }

    /// Sends the close control frame to every connection.
    ///
    /// Nothing is removed and no socket is closed, even if a send fails: this
    /// is the notification step before [`Registry::drain`] or
    /// [`Registry::destroy`].
    pub fn close_all(&self) -> BroadcastReport {
        let mut list = self.lock();
        let report = send_each(&mut list, &CLOSE_FRAME, |_| true);
        debug!("close frame sent to {} connection(s)", report.delivered);
        report
    }

    /// Removes the connections that failed during this broadcast, if the
    /// registry is configured to.
    fn reap(&self, list: &mut Vec<Connection<S>>, mut report: BroadcastReport) -> BroadcastReport {
        if !self.config.reap_failed_sends {
            return report;
        }
        for &id in &report.failed {
            if let Some(connection) = unlink(list, id) {
                debug!("reaping {id} ({}) after failed send", connection.address());
                connection.release();
                report.reaped += 1;
            }
        }
        report
    }
}

/// Sends `bytes` to every connection in `targets` that `include` accepts.
fn send_each<S: Socket>(
    targets: &mut [Connection<S>],
    bytes: &[u8],
    include: impl Fn(&Connection<S>) -> bool,
) -> BroadcastReport {
    let mut report = BroadcastReport {
        bytes_per_send: bytes.len(),
        ..BroadcastReport::default()
    };
    for connection in targets.iter_mut().filter(|c| include(c)) {
        match connection.socket_mut().send(bytes) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(
                    "send to {} ({}) failed: {e}",
                    connection.id(),
                    connection.address()
                );
                report.failed.push(connection.id());
            }
        }
    }
    report
}

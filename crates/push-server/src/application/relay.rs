//! Relay use case: one received chunk in, one broadcast out.
//!
//! The server carries no frame codec, so whatever a client writes is treated
//! as an already-encoded frame.  Each chunk is consumed whole: it becomes
//! the connection's outgoing [`Message`] and is fanned out to every other
//! client with [`Registry::broadcast_except`].  Nothing is left over, so the
//! connection's pending-input buffer is not used.

use push_core::{BroadcastReport, ConnectionId, Message, Registry, Socket};
use tracing::debug;

/// Opcode recorded on relayed messages (binary data frame).
pub const RELAY_OPCODE: u8 = 0x2;

/// Relays `chunk`, received from connection `id`, to every other connection.
///
/// Returns `None` when `id` is no longer registered (it was reaped or removed
/// while the chunk was in flight); the caller's read loop should stop.
/// An empty chunk attaches nothing and sends nothing.
pub fn relay_chunk<S: Socket>(
    registry: &Registry<S>,
    id: ConnectionId,
    chunk: &[u8],
) -> Option<BroadcastReport> {
    if chunk.is_empty() {
        return registry.contains(id).then(BroadcastReport::default);
    }

    let mut message = Message::with_encoded(RELAY_OPCODE, chunk.to_vec());
    message.payload_len = chunk.len() as u64;
    if !registry.set_message(id, message) {
        return None;
    }

    let report = registry.broadcast_except(id);
    debug!(
        "relayed {} byte(s) from {id} to {} client(s)",
        report.bytes_per_send, report.delivered
    );
    Some(report)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

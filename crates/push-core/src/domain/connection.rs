//! One accepted client and its per-connection state.
//!
//! # Ownership (for beginners)
//!
//! A [`Connection`] owns everything that belongs to the client: the socket,
//! the address string, the pending input, the handshake headers, and the
//! outgoing message.  The only way to tear one down is
//! [`Connection::release`], which takes the connection *by value*.  After the
//! call the value no longer exists, so the compiler rejects a second
//! release: the socket is closed and the buffers are freed exactly once.

use std::thread::ThreadId;

use super::handshake::HandshakeHeaders;
use super::id::ConnectionId;
use super::message::Message;
use crate::socket::{Socket, SocketHandle};

/// A connected client.
///
/// `S` is the socket type; production code uses
/// [`TcpSocket`](crate::TcpSocket).
pub struct Connection<S: Socket> {
    id: ConnectionId,
    socket: S,
    address: String,
    /// Reader thread serving this client, once one is assigned.
    pub worker: Option<ThreadId>,
    /// Raw input received but not yet consumed.
    pub buffer: Option<Vec<u8>>,
    /// Present only once the handshake has completed.
    pub headers: Option<HandshakeHeaders>,
    /// Message currently being sent on behalf of this client.
    pub message: Option<Message>,
}

impl<S: Socket> Connection<S> {
    /// Creates a connection for an open socket and its resolved peer address.
    pub fn new(socket: S, address: impl Into<String>) -> Self {
        Self {
            id: ConnectionId::next(),
            socket,
            address: address.into(),
            worker: None,
            buffer: None,
            headers: None,
            message: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn socket_handle(&self) -> SocketHandle {
        self.socket.handle()
    }

    /// Mutable access to the socket, for sends.
    pub(crate) fn socket_mut(&mut self) -> &mut S {
        &mut self.socket
    }

    /// `true` once handshake headers have been attached.
    pub fn is_established(&self) -> bool {
        self.headers.is_some()
    }

    /// Replaces the outgoing message, returning the superseded one.
    pub fn replace_message(&mut self, message: Message) -> Option<Message> {
        self.message.replace(message)
    }

    /// Appends received bytes to the pending-input buffer.
    pub fn append_input(&mut self, bytes: &[u8]) {
        self.buffer.get_or_insert_with(Vec::new).extend_from_slice(bytes);
    }

    /// Removes and returns the pending-input buffer.
    pub fn take_input(&mut self) -> Option<Vec<u8>> {
        self.buffer.take()
    }

    /// Frees the owned buffers without closing the socket.
    ///
    /// The accept token is the only heap-owned header field; every other
    /// header is kept so the connection stays identifiable.
    pub fn clear_state(&mut self) {
        self.buffer = None;
        if let Some(headers) = self.headers.as_mut() {
            headers.release_accept();
        }
        if let Some(mut message) = self.message.take() {
            message.release();
        }
    }

    /// Releases every owned resource and closes the socket.
    pub fn release(mut self) {
        self.clear_state();
        self.headers = None;
        self.socket.close();
    }
}

impl<S: Socket> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("socket", &self.socket.handle())
            .field("address", &self.address)
            .field("worker", &self.worker)
            .field("buffered", &self.buffer.as_ref().map_or(0, Vec::len))
            .field("established", &self.is_established())
            .field("has_message", &self.message.is_some())
            .finish()
    }
}

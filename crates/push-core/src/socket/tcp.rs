//! [`Socket`] implementation over a blocking `std::net::TcpStream`.

use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use tracing::debug;

use super::{Socket, SocketHandle};

/// A client TCP connection.
///
/// The stream is written to with blocking `write_all`.  Reader threads keep
/// their own clone of the stream (see [`TcpSocket::try_clone_stream`]); a
/// close shuts down both directions, which also unblocks such a reader.
#[derive(Debug)]
pub struct TcpSocket {
    stream: TcpStream,
    handle: SocketHandle,
    closed: bool,
}

impl TcpSocket {
    /// Wraps an accepted stream.
    pub fn new(stream: TcpStream) -> Self {
        let handle = raw_handle(&stream);
        Self {
            stream,
            handle,
            closed: false,
        }
    }

    /// Address of the remote peer.
    ///
    /// # Errors
    ///
    /// Fails if the socket is no longer connected.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Returns an independently owned handle to the same stream, for a reader
    /// thread.
    ///
    /// # Errors
    ///
    /// Fails if the OS cannot duplicate the descriptor.
    pub fn try_clone_stream(&self) -> io::Result<TcpStream> {
        self.stream.try_clone()
    }
}

impl Socket for TcpSocket {
    fn handle(&self) -> SocketHandle {
        self.handle
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "socket closed"));
        }
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Fails with NotConnected when the peer already reset the connection.
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("socket {}: shutdown: {e}", self.handle);
        }
    }
}

#[cfg(unix)]
fn raw_handle(stream: &TcpStream) -> SocketHandle {
    use std::os::unix::io::AsRawFd;
    SocketHandle(stream.as_raw_fd() as u64)
}

#[cfg(windows)]
fn raw_handle(stream: &TcpStream) -> SocketHandle {
    use std::os::windows::io::AsRawSocket;
    SocketHandle(stream.as_raw_socket())
}

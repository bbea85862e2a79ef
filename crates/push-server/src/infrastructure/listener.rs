//! TCP accept loop and server shutdown.
//!
//! # Threads (for beginners)
//!
//! The server uses plain blocking sockets on OS threads instead of async
//! tasks, because every registry broadcast holds a `std::sync::Mutex` across
//! blocking sends:
//!
//! ```text
//!   push-accept ──accept──► Registry::add ──spawn──► push-reader-N
//!                                                      │ read chunk
//!                                                      ▼
//!                                          relay_chunk → broadcast_except
//! ```
//!
//! The listening socket is non-blocking and polled, so the accept thread can
//! notice a cleared `running` flag within [`ACCEPT_POLL_INTERVAL`].

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use push_core::{Connection, Registry, TcpSocket};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::session::{is_timeout_error, spawn_reader};
use crate::domain::ServerConfig;

/// How long the accept loop sleeps when no connection is pending.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Error type for the TCP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind listener on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The listening socket could not be configured after binding.
    #[error("failed to configure listener: {0}")]
    Configure(#[source] io::Error),

    /// The accept thread could not be started.
    #[error("failed to spawn accept thread: {0}")]
    Spawn(#[source] io::Error),
}

/// A bound listening socket plus everything an accepted client needs.
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: Arc<Registry<TcpSocket>>,
    read_buffer_size: usize,
    read_timeout: Duration,
    write_timeout: Duration,
    readers: Vec<JoinHandle<()>>,
}

impl Listener {
    /// Binds `config.bind_addr`.  Port 0 picks an ephemeral port; see
    /// [`Listener::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindFailed`] or [`ServerError::Configure`].
    pub fn bind(
        config: &ServerConfig,
        registry: Arc<Registry<TcpSocket>>,
    ) -> Result<Self, ServerError> {
        let addr = config.bind_addr;
        let listener =
            TcpListener::bind(addr).map_err(|source| ServerError::BindFailed { addr, source })?;
        listener
            .set_nonblocking(true)
            .map_err(ServerError::Configure)?;
        let local_addr = listener.local_addr().map_err(ServerError::Configure)?;

        Ok(Self {
            listener,
            local_addr,
            registry,
            read_buffer_size: config.read_buffer_size,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            readers: Vec::new(),
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the accept loop on the calling thread until `running` is cleared.
    ///
    /// Returns the handles of reader threads that are still alive, for the
    /// shutdown path to join.
    pub fn run(mut self, running: Arc<AtomicBool>) -> Vec<JoinHandle<()>> {
        info!("push server listening on {}", self.local_addr);

        while running.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => self.admit(stream, peer, &running),
                Err(e) if is_timeout_error(&e) => thread::sleep(ACCEPT_POLL_INTERVAL),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("accept failed: {e}");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
            self.readers.retain(|r| !r.is_finished());
        }

        info!("accept loop stopped");
        self.readers
    }

    /// Runs [`Listener::run`] on a thread named `push-accept`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Spawn`] if the thread cannot be created.
    pub fn spawn(
        self,
        running: Arc<AtomicBool>,
    ) -> Result<JoinHandle<Vec<JoinHandle<()>>>, ServerError> {
        thread::Builder::new()
            .name("push-accept".to_string())
            .spawn(move || self.run(running))
            .map_err(ServerError::Spawn)
    }

    /// Registers an accepted stream and starts its reader.
    fn admit(&mut self, stream: TcpStream, peer: SocketAddr, running: &Arc<AtomicBool>) {
        let reader_stream = match self.prepare(&stream) {
            Ok(clone) => clone,
            Err(e) => {
                warn!("rejecting {peer}: {e}");
                return;
            }
        };

        let id = self
            .registry
            .add(Connection::new(TcpSocket::new(stream), peer.to_string()));
        info!("{id} connected from {peer} ({} online)", self.registry.len());

        match spawn_reader(
            Arc::clone(&self.registry),
            id,
            reader_stream,
            self.read_buffer_size,
            Arc::clone(running),
        ) {
            Ok(handle) => self.readers.push(handle),
            Err(e) => {
                error!("failed to spawn reader for {id}: {e}");
                self.registry.remove(id);
            }
        }
    }

    /// Puts an accepted stream into blocking mode with the read and write
    /// timeouts and returns the clone the reader thread will own.
    ///
    /// The write timeout is what bounds a broadcast: sends run under the
    /// registry lock, so a client that stops reading would otherwise stall
    /// every other thread.
    fn prepare(&self, stream: &TcpStream) -> io::Result<TcpStream> {
        // Some platforms hand out accepted sockets that inherit non-blocking
        // mode from the listener.
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.read_timeout))?;
        stream.set_write_timeout(Some(self.write_timeout))?;
        stream.set_nodelay(true)?;
        stream.try_clone()
    }
}

/// Tears the server down once the accept thread has stopped.
///
/// Sends the close frame to every client, releases every connection (which
/// unblocks their reader threads), joins the readers, and finally destroys
/// the registry if this was the last reference to it.  Returns the number of
/// connections released.
pub fn shutdown(registry: Arc<Registry<TcpSocket>>, readers: Vec<JoinHandle<()>>) -> usize {
    let notified = registry.close_all();
    info!("sent close frame to {} client(s)", notified.delivered);

    let mut released = registry.drain();

    for reader in readers {
        if reader.join().is_err() {
            warn!("a reader thread panicked");
        }
    }

    match Arc::try_unwrap(registry) {
        Ok(registry) => released += registry.destroy(),
        Err(shared) => debug!(
            "registry still has {} other owner(s); leaving destroy to them",
            Arc::strong_count(&shared) - 1
        ),
    }

    info!("released {released} connection(s)");
    released
}

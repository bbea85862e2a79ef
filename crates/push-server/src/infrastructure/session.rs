//! Per-connection reader thread.
//!
//! Every accepted client gets one blocking reader thread.  The thread owns a
//! clone of the client's `TcpStream` (the registry owns the original, for
//! sending) and loops:
//!
//! 1. Read up to `read_buffer_size` bytes.
//! 2. Hand the chunk to [`relay_chunk`], which broadcasts it to the others.
//! 3. On EOF or a hard read error, remove the connection from the registry.
//!
//! The stream has a read timeout; on each timeout the thread checks the
//! `running` flag.  When the flag is cleared the thread exits *without*
//! removing its connection: the shutdown path sends the close frame to
//! everyone first and then releases every connection itself.

use std::io::{self, Read};
use std::net::TcpStream;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};

use push_core::{ConnectionId, Registry, TcpSocket};
use tracing::{debug, info};

use crate::application::relay_chunk;

/// Spawns the named reader thread for connection `id`.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be created.
pub(crate) fn spawn_reader(
    registry: Arc<Registry<TcpSocket>>,
    id: ConnectionId,
    stream: TcpStream,
    read_buffer_size: usize,
    running: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("push-reader-{}", id.as_u64()))
        .spawn(move || read_loop(&registry, id, stream, read_buffer_size, &running))
}

/// How a read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// Peer closed, read failed, or the connection was already removed.
    Disconnected,
    /// The server is shutting down and owns the teardown.
    Shutdown,
}

fn read_loop(
    registry: &Registry<TcpSocket>,
    id: ConnectionId,
    mut stream: TcpStream,
    read_buffer_size: usize,
    running: &AtomicBool,
) {
    let worker = thread::current().id();
    if registry.with_connection(id, |c| c.worker = Some(worker)).is_none() {
        debug!("{id}: gone before its reader started");
        return;
    }

    let mut buf = vec![0u8; read_buffer_size];
    let exit = loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                debug!("{id}: peer closed the connection");
                break Exit::Disconnected;
            }
            Ok(n) => {
                if relay_chunk(registry, id, &buf[..n]).is_none() {
                    debug!("{id}: no longer registered, stopping reader");
                    break Exit::Disconnected;
                }
            }
            Err(e) if is_timeout_error(&e) => {
                if !running.load(Ordering::Relaxed) {
                    break Exit::Shutdown;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("{id}: read error: {e}");
                break Exit::Disconnected;
            }
        }
    };

    if exit == Exit::Disconnected && registry.remove(id) {
        info!("{id} disconnected ({} online)", registry.len());
    }
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
pub(crate) fn is_timeout_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

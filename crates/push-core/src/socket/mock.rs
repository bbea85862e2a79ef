//! Recording socket for unit and integration tests.
//!
//! A [`RecordingSocket`] is moved into a connection (and from there into a
//! registry), so the test can no longer look at it directly.  Its paired
//! [`SocketProbe`] shares the same log and stays with the test.

use std::io;
use std::sync::{Arc, Mutex};

use super::{Socket, SocketHandle};

#[derive(Debug, Default)]
struct SocketLog {
    sends: Vec<Vec<u8>>,
    closes: u32,
    fail_sends: bool,
}

/// A [`Socket`] that records sends and closes instead of doing I/O.
#[derive(Debug)]
pub struct RecordingSocket {
    handle: SocketHandle,
    log: Arc<Mutex<SocketLog>>,
}

/// Test-side view of a [`RecordingSocket`]'s log.
#[derive(Debug, Clone)]
pub struct SocketProbe {
    log: Arc<Mutex<SocketLog>>,
}

impl RecordingSocket {
    /// Creates a socket with the given handle and the probe that observes it.
    pub fn new(handle: u64) -> (Self, SocketProbe) {
        let log = Arc::new(Mutex::new(SocketLog::default()));
        let socket = Self {
            handle: SocketHandle(handle),
            log: Arc::clone(&log),
        };
        (socket, SocketProbe { log })
    }
}

impl Socket for RecordingSocket {
    fn handle(&self) -> SocketHandle {
        self.handle
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut log = self.log.lock().expect("lock poisoned");
        if log.fail_sends || log.closes > 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
        }
        log.sends.push(bytes.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().expect("lock poisoned").closes += 1;
    }
}

impl SocketProbe {
    /// Every successful send so far, in order.
    pub fn sends(&self) -> Vec<Vec<u8>> {
        self.log.lock().expect("lock poisoned").sends.clone()
    }

    /// Number of successful sends so far.
    pub fn send_count(&self) -> usize {
        self.log.lock().expect("lock poisoned").sends.len()
    }

    /// Number of times `close` was called.
    pub fn close_count(&self) -> u32 {
        self.log.lock().expect("lock poisoned").closes
    }

    /// Makes every later send fail, as if the peer had disconnected.
    pub fn fail_sends(&self) {
        self.log.lock().expect("lock poisoned").fail_sends = true;
    }
}

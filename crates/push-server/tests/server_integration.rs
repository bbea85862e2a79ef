//! End-to-end tests over real loopback TCP sockets.
//!
//! Each test binds a server on an ephemeral port, connects plain
//! `TcpStream` clients, and drives the full path: accept → reader thread →
//! relay → broadcast, and finally the shutdown sequence.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use push_core::{Registry, RegistryConfig, TcpSocket, CLOSE_FRAME};
use push_server::domain::ServerConfig;
use push_server::infrastructure::{shutdown, Listener};

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    registry: Arc<Registry<TcpSocket>>,
    running: Arc<AtomicBool>,
    accept: JoinHandle<Vec<JoinHandle<()>>>,
}

impl TestServer {
    fn start() -> Self {
        Self::start_with(Duration::from_secs(5))
    }

    fn start_with(write_timeout: Duration) -> Self {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            read_timeout: Duration::from_millis(50),
            write_timeout,
            ..ServerConfig::default()
        };
        let registry = Arc::new(Registry::with_config(RegistryConfig {
            reap_failed_sends: config.reap_failed_sends,
        }));
        let listener = Listener::bind(&config, Arc::clone(&registry)).expect("bind");
        let addr = listener.local_addr();
        let running = Arc::new(AtomicBool::new(true));
        let accept = listener.spawn(Arc::clone(&running)).expect("spawn accept");
        Self {
            addr,
            registry,
            running,
            accept,
        }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        stream
    }

    fn wait_for_clients(&self, n: usize) {
        self.wait_for_clients_within(n, WAIT);
    }

    fn wait_for_clients_within(&self, n: usize, limit: Duration) {
        let deadline = Instant::now() + limit;
        while self.registry.len() != n {
            assert!(
                Instant::now() < deadline,
                "expected {n} clients, registry has {}",
                self.registry.len()
            );
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn stop(self) -> usize {
        self.running.store(false, Ordering::Relaxed);
        let readers = self.accept.join().expect("accept thread panicked");
        shutdown(self.registry, readers)
    }
}

fn read_exact_within(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let deadline = Instant::now() + WAIT;
    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    while out.len() < n {
        assert!(Instant::now() < deadline, "timed out after {out:?}");
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(k) => out.extend_from_slice(&buf[..k]),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => panic!("read failed: {e}"),
        }
    }
    out
}

fn receives_nothing(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 16];
    match stream.read(&mut buf) {
        Err(e) => matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut),
        Ok(_) => false,
    }
}

#[test]
fn test_chunk_is_relayed_to_every_other_client() {
    // Arrange
    let server = TestServer::start();
    let mut sender = server.connect();
    let mut b = server.connect();
    let mut c = server.connect();
    server.wait_for_clients(3);

    // Act
    sender.write_all(b"ping").unwrap();

    // Assert
    assert_eq!(read_exact_within(&mut b, 4), b"ping");
    assert_eq!(read_exact_within(&mut c, 4), b"ping");
    assert!(receives_nothing(&mut sender), "sender must not get its own bytes");

    server.stop();
}

#[test]
fn test_disconnected_client_is_removed_from_registry() {
    let server = TestServer::start();
    let a = server.connect();
    let _b = server.connect();
    server.wait_for_clients(2);

    drop(a);

    server.wait_for_clients(1);
    server.stop();
}

#[test]
fn test_reader_thread_is_recorded_as_worker() {
    let server = TestServer::start();
    let _a = server.connect();
    server.wait_for_clients(1);

    let deadline = Instant::now() + WAIT;
    loop {
        let snapshot = server.registry.snapshot();
        if snapshot[0].worker.is_some() {
            assert!(snapshot[0].address.starts_with("127.0.0.1:"));
            break;
        }
        assert!(Instant::now() < deadline, "worker never recorded");
        thread::sleep(Duration::from_millis(10));
    }

    server.stop();
}

#[test]
fn test_shutdown_sends_close_frame_then_closes() {
    // Arrange
    let server = TestServer::start();
    let mut a = server.connect();
    let mut b = server.connect();
    server.wait_for_clients(2);

    // Act
    let released = server.stop();

    // Assert
    assert_eq!(released, 2);
    for client in [&mut a, &mut b] {
        assert_eq!(read_exact_within(client, 2), CLOSE_FRAME.to_vec());
        let mut rest = [0u8; 8];
        assert_eq!(client.read(&mut rest).unwrap(), 0, "socket closed after frame");
    }
}

#[test]
fn test_client_that_stops_reading_is_dropped_and_server_stays_responsive() {
    // Arrange: a sender and a client that never reads its socket
    let server = TestServer::start_with(Duration::from_millis(200));
    let sender = server.connect();
    let _silent = server.connect();
    server.wait_for_clients(2);

    // Act: flood until the silent client's socket buffers are full
    let flooding = Arc::new(AtomicBool::new(true));
    let flooder = {
        let flooding = Arc::clone(&flooding);
        let mut sender = sender;
        sender
            .set_write_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        thread::spawn(move || {
            let chunk = vec![0x5A; 4096];
            while flooding.load(Ordering::Relaxed) {
                if let Err(e) = sender.write_all(&chunk) {
                    if !matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) {
                        break;
                    }
                }
            }
            sender
        })
    };

    // Assert: the blocked send times out and the silent client is reaped
    server.wait_for_clients_within(1, Duration::from_secs(20));
    assert!(server.registry.snapshot()[0].worker.is_some());

    // The registry is free again: the sender's disconnect and a new client
    // are both processed
    flooding.store(false, Ordering::Relaxed);
    drop(flooder.join().expect("flooder panicked"));
    server.wait_for_clients_within(0, Duration::from_secs(20));
    let _late = server.connect();
    server.wait_for_clients(1);

    server.stop();
}

//! Multi-threaded tests for the registry's locking discipline.
//!
//! Each test starts its threads behind a `Barrier` so they hit the registry
//! at the same moment, which makes lost updates and double teardown far more
//! likely to show up if the locking were wrong.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use push_core::socket::mock::{RecordingSocket, SocketProbe};
use push_core::{Connection, ConnectionId, Message, Registry, RegistryConfig};

#[test]
fn test_concurrent_adds_register_every_connection() {
    // Arrange
    let registry = Arc::new(Registry::new());
    let threads = 16;
    let per_thread = 50;
    let barrier = Arc::new(Barrier::new(threads));

    // Act
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..per_thread)
                    .map(|i| {
                        let (socket, _probe) = RecordingSocket::new((t * per_thread + i) as u64);
                        registry.add(Connection::new(socket, format!("10.0.{t}.{i}")))
                    })
                    .collect::<Vec<ConnectionId>>()
            })
        })
        .collect();

    let added: HashSet<ConnectionId> = handles
        .into_iter()
        .flat_map(|h| h.join().expect("adder panicked"))
        .collect();

    // Assert – nothing lost, nothing duplicated
    assert_eq!(registry.len(), threads * per_thread);
    let registered: HashSet<ConnectionId> = registry.ids().into_iter().collect();
    assert_eq!(registered, added);
}

#[test]
fn test_concurrent_remove_of_same_connection_tears_down_once() {
    for _ in 0..50 {
        // Arrange
        let registry = Arc::new(Registry::new());
        let (socket, probe) = RecordingSocket::new(1);
        let id = registry.add(Connection::new(socket, "10.0.0.1"));
        let barrier = Arc::new(Barrier::new(2));

        // Act – two threads race to remove the same connection
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.remove(id)
                })
            })
            .collect();
        let results: Vec<bool> = handles
            .into_iter()
            .map(|h| h.join().expect("remover panicked"))
            .collect();

        // Assert
        assert_eq!(results.iter().filter(|&&r| r).count(), 1);
        assert_eq!(probe.close_count(), 1);
        assert!(registry.is_empty());
    }
}

#[test]
fn test_broadcasts_see_consistent_set_while_clients_churn() {
    // Arrange – a stable core of clients that must receive every broadcast
    let registry = Arc::new(Registry::new());
    let stable: Vec<SocketProbe> = (0..4)
        .map(|h| {
            let (socket, probe) = RecordingSocket::new(h);
            registry.add(Connection::new(socket, "10.0.0.1"));
            probe
        })
        .collect();
    let rounds = 200;
    let barrier = Arc::new(Barrier::new(2));

    // Act – one thread churns temporary clients while another broadcasts
    let churn = {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..rounds {
                let (socket, _p) = RecordingSocket::new(1000 + i);
                let id = registry.add(Connection::new(socket, "10.9.9.9"));
                registry.remove(id);
            }
        })
    };
    let broadcaster = {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let msg = Message::with_encoded(0x1, vec![0xAA]);
            (0..rounds)
                .map(|_| registry.broadcast_all(&msg))
                .all(|report| report.is_clean() && report.delivered >= 4)
        })
    };

    churn.join().expect("churn thread panicked");
    let all_clean = broadcaster.join().expect("broadcaster panicked");

    // Assert
    assert!(all_clean);
    assert_eq!(registry.len(), 4);
    for probe in &stable {
        assert_eq!(probe.send_count(), rounds as usize);
    }
}

#[test]
fn test_reaping_and_read_loop_removal_race_tears_down_once() {
    for _ in 0..50 {
        // Arrange – a dead client that both the broadcaster and its own
        // reader thread will try to remove
        let registry = Arc::new(Registry::with_config(RegistryConfig {
            reap_failed_sends: true,
        }));
        let (socket, dead) = RecordingSocket::new(1);
        dead.fail_sends();
        let dead_id = registry.add(Connection::new(socket, "10.0.0.1"));
        let (socket, _alive) = RecordingSocket::new(2);
        registry.add(Connection::new(socket, "10.0.0.2"));
        let barrier = Arc::new(Barrier::new(2));

        // Act
        let reader = {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.remove(dead_id)
            })
        };
        let broadcaster = {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.broadcast_all(&Message::with_encoded(0x1, vec![1])).reaped
            })
        };
        let removed_by_reader = reader.join().expect("reader panicked");
        let reaped = broadcaster.join().expect("broadcaster panicked");

        // Assert – exactly one of the two paths did the teardown
        assert_eq!(usize::from(removed_by_reader) + reaped, 1);
        assert_eq!(dead.close_count(), 1);
        assert_eq!(registry.len(), 1);
    }
}

//! push-server library crate.
//!
//! A minimal TCP push server built on `push-core`: every byte a client sends
//! is relayed to all the other connected clients.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! TCP clients
//!       ↕
//! [push-server]
//!   ├── domain/           ServerConfig, TOML file schema, ConfigError
//!   ├── application/      relay_chunk: received bytes → broadcast_except
//!   └── infrastructure/
//!         ├── listener/   Accept loop, shutdown sequence
//!         └── session/    One blocking reader thread per client
//! ```
//!
//! # Layer rules
//!
//! - `domain` performs no I/O apart from reading the config file.
//! - `application` depends on `domain` and `push-core` only, and is generic
//!   over the socket type so it can be tested with recording sockets.
//! - `infrastructure` owns the real `TcpListener`/`TcpStream`s and threads.
//!
//! # What this server does *not* do
//!
//! There is no WebSocket handshake and no frame codec.  Clients are expected
//! to write bytes that are already valid frames for whoever is listening; the
//! server forwards them unchanged.

/// Domain layer: configuration types.
pub mod domain;

/// Application layer: the relay use case.
pub mod application;

/// Infrastructure layer: TCP accept loop and reader threads.
pub mod infrastructure;

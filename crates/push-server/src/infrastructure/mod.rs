//! Infrastructure layer: the OS sockets and threads.
//!
//! - **`listener`** – Binds the TCP port, runs the accept loop, and owns the
//!   shutdown sequence.
//! - **`session`** – The per-connection reader thread.

pub mod listener;
mod session;

pub use listener::{shutdown, Listener, ServerError, ACCEPT_POLL_INTERVAL};

//! Domain layer for push-server: configuration only.
//!
//! Connection and frame types come from `push-core`; nothing here performs
//! network I/O.

pub mod config;

pub use config::{ConfigError, FileConfig, ServerConfig};

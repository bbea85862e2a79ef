//! push-server entry point.
//!
//! Accepts TCP clients and relays every chunk one client writes to all the
//! others, using the `push-core` connection registry.
//!
//! # Usage
//!
//! ```text
//! push-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>          TOML config file
//!   --bind <IP>              Listen address [default: 0.0.0.0]
//!   --port <PORT>            Listen port [default: 8080]
//!   --read-buffer <BYTES>    Largest chunk read per call [default: 4096]
//!   --read-timeout-ms <MS>   Shutdown poll interval [default: 500]
//!   --write-timeout-ms <MS>  Longest a send to one client may block [default: 5000]
//!   --no-reap                Keep clients whose sends fail until they disconnect
//!   --log-level <FILTER>     Log filter when RUST_LOG is unset [default: info]
//! ```
//!
//! # Configuration precedence
//!
//! Built-in defaults, then the `--config` file, then environment variables
//! and flags.  A flag wins over its environment variable.
//!
//! | Variable                | Flag                 |
//! |-------------------------|----------------------|
//! | `PUSH_CONFIG`           | `--config`           |
//! | `PUSH_BIND`             | `--bind`             |
//! | `PUSH_PORT`             | `--port`             |
//! | `PUSH_READ_BUFFER`      | `--read-buffer`      |
//! | `PUSH_READ_TIMEOUT_MS`  | `--read-timeout-ms`  |
//! | `PUSH_WRITE_TIMEOUT_MS` | `--write-timeout-ms` |
//! | `PUSH_LOG`              | `--log-level`        |
//!
//! # Shutdown
//!
//! Ctrl+C clears the shared `running` flag.  The accept thread and idle
//! reader threads notice within one read timeout; then every client gets the
//! close frame, every connection is released, and the registry is destroyed.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use push_core::{Registry, RegistryConfig, TcpSocket};
use push_server::domain::{FileConfig, ServerConfig};
use push_server::infrastructure::{shutdown, Listener};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Socket push server.
///
/// Every option is optional; an unset option keeps the value from the config
/// file, or the built-in default.
#[derive(Debug, Default, Parser)]
#[command(
    name = "push-server",
    about = "Relays bytes from each TCP client to every other connected client",
    version
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, env = "PUSH_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on.
    ///
    /// Use `0.0.0.0` for every interface or `127.0.0.1` for local clients only.
    #[arg(long, env = "PUSH_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "PUSH_PORT")]
    port: Option<u16>,

    /// Largest chunk, in bytes, read from a client and relayed at once.
    #[arg(long, env = "PUSH_READ_BUFFER")]
    read_buffer: Option<usize>,

    /// Socket read timeout in milliseconds.
    #[arg(long, env = "PUSH_READ_TIMEOUT_MS")]
    read_timeout_ms: Option<u64>,

    /// Socket write timeout in milliseconds.  A client that stops reading
    /// fails its send after this long and is dropped.
    #[arg(long, env = "PUSH_WRITE_TIMEOUT_MS")]
    write_timeout_ms: Option<u64>,

    /// Do not drop clients whose sends fail during a broadcast.
    #[arg(long)]
    no_reap: bool,

    /// `tracing` filter used when `RUST_LOG` is not set.
    #[arg(long, env = "PUSH_LOG")]
    log_level: Option<String>,
}

impl Cli {
    /// Layers the CLI values over the config file (or the defaults).
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the merged
    /// settings are invalid.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut file = match &self.config {
            Some(path) => FileConfig::load(path)
                .with_context(|| format!("failed to load config file '{}'", path.display()))?,
            None => FileConfig::default(),
        };

        if let Some(bind) = self.bind {
            file.bind_address = bind;
        }
        if let Some(port) = self.port {
            file.port = port;
        }
        if let Some(read_buffer) = self.read_buffer {
            file.read_buffer_size = read_buffer;
        }
        if let Some(read_timeout_ms) = self.read_timeout_ms {
            file.read_timeout_ms = read_timeout_ms;
        }
        if let Some(write_timeout_ms) = self.write_timeout_ms {
            file.write_timeout_ms = write_timeout_ms;
        }
        if self.no_reap {
            file.reap_failed_sends = false;
        }
        if let Some(log_level) = self.log_level {
            file.log_level = log_level;
        }

        file.into_server_config().context("invalid configuration")
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// The socket work runs on plain OS threads; the Tokio runtime only waits for
/// Ctrl+C and hosts the blocking joins.
///
/// 1. CLI arguments (and the optional config file) become a [`ServerConfig`].
/// 2. `tracing_subscriber` is initialised; `RUST_LOG` overrides the
///    configured level.
/// 3. The listener binds and the accept loop starts on its own thread.
/// 4. Ctrl+C clears `running`; the accept thread is joined and
///    [`shutdown`] notifies and releases every client.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_server_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "push server starting: bind={}, read_buffer={}, reap_failed_sends={}",
        config.bind_addr, config.read_buffer_size, config.reap_failed_sends
    );

    let registry: Arc<Registry<TcpSocket>> = Arc::new(Registry::with_config(RegistryConfig {
        reap_failed_sends: config.reap_failed_sends,
    }));
    let listener = Listener::bind(&config, Arc::clone(&registry))
        .with_context(|| format!("cannot listen on {}", config.bind_addr))?;

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let accept = listener.spawn(Arc::clone(&running))?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C signal")?;
    info!("received Ctrl+C, shutting down");
    running.store(false, Ordering::Relaxed);

    // ── Teardown ──────────────────────────────────────────────────────────────
    let released = tokio::task::spawn_blocking(move || {
        let readers = accept
            .join()
            .map_err(|_| anyhow!("accept thread panicked"))?;
        registry.log_state();
        Ok::<_, anyhow::Error>(shutdown(registry, readers))
    })
    .await
    .context("shutdown task failed")??;

    info!("push server stopped ({released} connection(s) released)");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

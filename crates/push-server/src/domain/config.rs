//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! It is assembled in three layers, lowest precedence first:
//!
//! 1. [`ServerConfig::default`]
//! 2. An optional TOML file, parsed into [`FileConfig`]
//! 3. Command-line flags and environment variables (see `main.rs`)
//!
//! # Example file
//!
//! ```toml
//! bind_address = "0.0.0.0"
//! port = 8080
//! read_buffer_size = 4096
//! read_timeout_ms = 500
//! write_timeout_ms = 5000
//! reap_failed_sends = true
//! log_level = "info"
//! ```
//!
//! Every key is optional; a missing key keeps its default.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address '{value}': {source}")]
    InvalidAddress {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// A numeric setting is out of range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// All runtime configuration for the push server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address and port the TCP listener binds to.
    pub bind_addr: SocketAddr,
    /// Largest chunk a reader thread reads (and relays) at once.
    pub read_buffer_size: usize,
    /// Socket read timeout.  Reader threads and the accept loop check the
    /// shutdown flag at least this often.
    pub read_timeout: Duration,
    /// Socket write timeout.  Bounds how long a broadcast can block on a
    /// client that stopped reading; the send then fails and the client is
    /// reaped (with `reap_failed_sends`).
    pub write_timeout: Duration,
    /// Remove clients whose send failed during a broadcast, instead of
    /// waiting for their reader thread to notice.
    pub reap_failed_sends: bool,
    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for ServerConfig {
    /// | Field             | Default        |
    /// |-------------------|----------------|
    /// | bind_addr         | `0.0.0.0:8080` |
    /// | read_buffer_size  | 4096           |
    /// | read_timeout      | 500 ms         |
    /// | write_timeout     | 5 s            |
    /// | reap_failed_sends | `true`         |
    /// | log_level         | `"info"`       |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            read_buffer_size: DEFAULT_READ_BUFFER,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
            reap_failed_sends: true,
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Checks the settings that would make the server misbehave at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a zero buffer size or a zero
    /// socket timeout (which the OS rejects).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "read_buffer_size",
                reason: "must be at least 1 byte".to_string(),
            });
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "read_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "write_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_READ_BUFFER: usize = 4096;
const DEFAULT_READ_TIMEOUT_MS: u64 = 500;
const DEFAULT_WRITE_TIMEOUT_MS: u64 = 5000;

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER
}
fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}
fn default_write_timeout_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT_MS
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

/// On-disk configuration schema.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub reap_failed_sends: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            read_buffer_size: default_read_buffer_size(),
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            reap_failed_sends: default_true(),
            log_level: default_log_level(),
        }
    }
}

impl FileConfig {
    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown keys.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Resolves the file settings into a validated [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] or
    /// [`ConfigError::InvalidValue`].
    pub fn into_server_config(self) -> Result<ServerConfig, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|source| ConfigError::InvalidAddress {
                value: self.bind_address.clone(),
                source,
            })?;
        let config = ServerConfig {
            bind_addr: SocketAddr::new(ip, self.port),
            read_buffer_size: self.read_buffer_size,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            reap_failed_sends: self.reap_failed_sends,
            log_level: self.log_level,
        };
        config.validate()?;
        Ok(config)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_is_8080() {
        assert_eq!(ServerConfig::default().bind_addr.port(), 8080);
    }

    #[test]
    fn test_default_reaps_failed_sends() {
        assert!(ServerConfig::default().reap_failed_sends);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_file_matches_defaults() {
        // Arrange / Act
        let config = FileConfig::parse("").unwrap().into_server_config().unwrap();

        // Assert
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_file_values_override_defaults() {
        let text = r#"
            bind_address = "127.0.0.1"
            port = 9001
            read_buffer_size = 512
            read_timeout_ms = 50
            write_timeout_ms = 250
            reap_failed_sends = false
            log_level = "debug"
        "#;

        let config = FileConfig::parse(text).unwrap().into_server_config().unwrap();

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9001");
        assert_eq!(config.read_buffer_size, 512);
        assert_eq!(config.read_timeout, Duration::from_millis(50));
        assert_eq!(config.write_timeout, Duration::from_millis(250));
        assert!(!config.reap_failed_sends);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_partial_file_keeps_remaining_defaults() {
        let config = FileConfig::parse("port = 1234").unwrap();
        assert_eq!(config.port, 1234);
        assert_eq!(config.read_buffer_size, 4096);
        assert_eq!(config.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = FileConfig::parse("max_clients = 10");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let file = FileConfig {
            bind_address: "not.an.ip".to_string(),
            ..FileConfig::default()
        };
        assert!(matches!(
            file.into_server_config(),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_zero_buffer_is_rejected() {
        let file = FileConfig {
            read_buffer_size: 0,
            ..FileConfig::default()
        };
        assert!(matches!(
            file.into_server_config(),
            Err(ConfigError::InvalidValue {
                field: "read_buffer_size",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_read_timeout_is_rejected() {
        let config = ServerConfig {
            read_timeout: Duration::ZERO,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_write_timeout_is_five_seconds() {
        assert_eq!(ServerConfig::default().write_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_write_timeout_is_rejected() {
        let file = FileConfig {
            write_timeout_ms: 0,
            ..FileConfig::default()
        };
        assert!(matches!(
            file.into_server_config(),
            Err(ConfigError::InvalidValue {
                field: "write_timeout_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let path = Path::new("/definitely/not/here/push-server.toml");
        match FileConfig::load(path) {
            Err(ConfigError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_reads_toml_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "push-server-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "port = 7007\nlog_level = \"warn\"\n").unwrap();

        let file = FileConfig::load(&path);
        let _ = std::fs::remove_file(&path);

        let config = file.unwrap().into_server_config().unwrap();
        assert_eq!(config.bind_addr.port(), 7007);
        assert_eq!(config.log_level, "warn");
    }
}

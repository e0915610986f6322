//! # Configuration
//!
//! Plain data types describing where the pool connects and how it admits
//! callers. All of them deserialize with defaults filled in, so a config
//! file only needs the fields it overrides.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of simultaneously active connections.
pub const DEFAULT_POOL_SIZE: usize = 8;
/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default server port.
pub const DEFAULT_PORT: u16 = 6379;

/// Host and port of the remote key-value server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Admission and endpoint settings for a [`ConnectionPool`](crate::ConnectionPool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum simultaneously active connections; `0` means unbounded.
    pub pool_size: usize,
    /// Server endpoint every pooled connection is bound to.
    #[serde(flatten)]
    pub endpoint: Endpoint,
    /// When capacity is exhausted, hand out the oldest active connection
    /// instead of failing with `TooManyClients`.
    pub reuse_actives: bool,
}

impl PoolConfig {
    /// Configured ceiling, or `None` for an unbounded pool.
    pub fn capacity(&self) -> Option<usize> {
        match self.pool_size {
            0 => None,
            size => Some(size),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            pool_size: DEFAULT_POOL_SIZE,
            endpoint: Endpoint::default(),
            reuse_actives: true,
        }
    }
}

/// Socket settings forwarded to every [`TcpConnection`](crate::TcpConnection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpOptions {
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Disable Nagle's algorithm on new sockets.
    pub nodelay: bool,
}

impl Default for TcpOptions {
    fn default() -> Self {
        TcpOptions {
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            nodelay: true,
        }
    }
}

/// Configuration for [`KvClient`](crate::KvClient): pool policy plus socket options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub pool: PoolConfig,
    pub tcp: TcpOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PoolConfig::default();
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.endpoint.to_string(), "127.0.0.1:6379");
        assert!(config.reuse_actives);
        assert_eq!(config.capacity(), Some(8));
    }

    #[test]
    fn zero_pool_size_is_unbounded() {
        let config = PoolConfig {
            pool_size: 0,
            ..PoolConfig::default()
        };
        assert_eq!(config.capacity(), None);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"pool": {"pool_size": 2, "port": 7000, "reuse_actives": false}}"#,
        )
        .expect("parse config");
        assert_eq!(config.pool.pool_size, 2);
        assert_eq!(config.pool.endpoint, Endpoint::new("127.0.0.1", 7000));
        assert!(!config.pool.reuse_actives);
        assert_eq!(config.tcp, TcpOptions::default());
    }
}

//! # Synchronous Client API
//!
//! Purpose: Expose a compact, blocking API for issuing Redis-compatible
//! commands through a [`ConnectionPool`] of [`TcpConnection`]s.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `KvClient` hides checkout, framing and release.
//! 2. **Borrow-Friendly API**: Accept `&[u8]` to avoid unnecessary copies.
//! 3. **Fail Fast**: Protocol violations and server errors surface
//!    immediately; nothing is retried.

use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::pool::{ConnectionPool, PoolStats};
use crate::resp::Reply;
use crate::tcp::TcpConnection;

/// TTL state returned by the server, mirroring Redis semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTtl {
    /// Key is missing or already expired.
    Missing,
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

/// Synchronous client with connection pooling.
///
/// Each call checks a connection out, executes one command and releases it.
/// With `reuse_actives` enabled, concurrent callers beyond the pool size
/// share connections; their commands are serialized on the shared socket.
#[derive(Clone)]
pub struct KvClient {
    pool: ConnectionPool<TcpConnection>,
}

impl KvClient {
    /// Creates a client for `host:port` with default pool settings.
    pub fn connect(host: impl Into<String>, port: u16) -> Self {
        let mut config = ClientConfig::default();
        config.pool.endpoint.host = host.into();
        config.pool.endpoint.port = port;
        Self::new(config)
    }

    /// Creates a client with a custom configuration. No connection is made
    /// until the first command.
    pub fn new(config: ClientConfig) -> Self {
        KvClient {
            pool: ConnectionPool::new(config.pool, config.tcp),
        }
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: ConnectionPool<TcpConnection>) -> Self {
        KvClient { pool }
    }

    pub fn pool(&self) -> &ConnectionPool<TcpConnection> {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Closes every pooled connection. The client is unusable afterwards.
    pub fn close(&self) {
        self.pool.close();
    }

    /// Fetches a value by key.
    ///
    /// Returns `Ok(None)` when the key is missing.
    pub fn get(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        match self.execute(&[b"GET", key])? {
            Reply::Bulk(data) => Ok(data),
            other => Err(unexpected(other)),
        }
    }

    /// Sets a value for a key without expiration.
    pub fn set(&self, key: &[u8], value: &[u8]) -> ClientResult<()> {
        match self.execute(&[b"SET", key, value])? {
            Reply::Status(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Sets a value and attaches an expiration in whole seconds.
    pub fn set_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> ClientResult<()> {
        let seconds = ttl.as_secs().to_string();
        match self.execute(&[b"SET", key, value, b"EX", seconds.as_bytes()])? {
            Reply::Status(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Deletes a key. Returns true when a key was removed.
    pub fn delete(&self, key: &[u8]) -> ClientResult<bool> {
        match self.execute(&[b"DEL", key])? {
            Reply::Integer(count) => Ok(count > 0),
            other => Err(unexpected(other)),
        }
    }

    /// Sets a time-to-live on a key. Returns true when the TTL was set.
    pub fn expire(&self, key: &[u8], ttl: Duration) -> ClientResult<bool> {
        let seconds = ttl.as_secs().to_string();
        match self.execute(&[b"EXPIRE", key, seconds.as_bytes()])? {
            Reply::Integer(value) => Ok(value == 1),
            other => Err(unexpected(other)),
        }
    }

    /// Returns TTL status for a key.
    pub fn ttl(&self, key: &[u8]) -> ClientResult<ClientTtl> {
        match self.execute(&[b"TTL", key])? {
            Reply::Integer(-2) => Ok(ClientTtl::Missing),
            Reply::Integer(-1) => Ok(ClientTtl::NoExpiry),
            Reply::Integer(value) if value >= 0 => {
                Ok(ClientTtl::ExpiresIn(Duration::from_secs(value as u64)))
            }
            other => Err(unexpected(other)),
        }
    }

    /// Pings the server. Returns the raw response payload.
    pub fn ping(&self, payload: Option<&[u8]>) -> ClientResult<Vec<u8>> {
        let reply = match payload {
            Some(data) => self.execute(&[b"PING", data])?,
            None => self.execute(&[b"PING"])?,
        };
        match reply {
            Reply::Status(text) => Ok(text),
            Reply::Bulk(Some(data)) => Ok(data),
            other => Err(unexpected(other)),
        }
    }

    /// Runs an arbitrary command and returns the raw reply.
    pub fn execute(&self, args: &[&[u8]]) -> ClientResult<Reply> {
        let conn = self.pool.get()?;
        let reply = conn.lock().execute(args);
        reply
    }
}

fn unexpected(reply: Reply) -> ClientError {
    match reply {
        Reply::Error(message) => ClientError::Server { message },
        _ => ClientError::UnexpectedResponse,
    }
}

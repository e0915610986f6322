//! # Client Errors
//!
//! One error type covers the pool's admission failures and whatever the
//! connection collaborator reports. The pool never wraps or retries
//! collaborator errors; they reach the caller as-is.

use thiserror::Error;

/// Result type for the pool and client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the pool, its connections and the command facade.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while connecting, reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RESP2 framing or parse error.
    #[error("protocol error")]
    Protocol,
    /// Server returned an error reply.
    #[error("server error: {}", String::from_utf8_lossy(.message))]
    Server { message: Vec<u8> },
    /// Response type did not match the expected command response.
    #[error("unexpected response")]
    UnexpectedResponse,
    /// Endpoint could not be resolved into a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// A command was issued on a connection with no live transport.
    #[error("not connected")]
    NotConnected,
    /// Capacity is exhausted and the pool does not share active connections.
    #[error("too many clients: {active} active, capacity {capacity}")]
    TooManyClients { active: usize, capacity: usize },
    /// The pool has been closed and hands out no more connections.
    #[error("connection pool is closed")]
    PoolClosed,
}

impl ClientError {
    /// Returns true when the error came from the pool's capacity policy.
    pub fn is_too_many_clients(&self) -> bool {
        matches!(self, ClientError::TooManyClients { .. })
    }
}

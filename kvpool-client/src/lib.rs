//! # kvpool Client
//!
//! Purpose: Bound and reuse connections to a single Redis-compatible
//! key-value server, with a small synchronous command client on top.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: `ConnectionPool` keeps idle and active
//!    connections apart and hands out idle ones before creating more.
//! 2. **Pluggable Transport**: The pool drives any `Connection`;
//!    `TcpConnection` is the RESP2-over-TCP implementation.
//! 3. **Explicit Sharing**: Over capacity, the pool either shares its oldest
//!    active connection (`Lease::Shared`) or fails with `TooManyClients`.
//! 4. **Quiet Library**: Events are emitted through `tracing`; installing a
//!    subscriber is up to the application.

mod client;
mod config;
mod connection;
mod error;
mod pool;
mod resp;
mod tcp;

pub use client::{ClientTtl, KvClient};
pub use config::{ClientConfig, Endpoint, PoolConfig, TcpOptions};
pub use connection::{Connection, Handle, Lease};
pub use error::{ClientError, ClientResult};
pub use pool::{ConnectionPool, PoolStats, PooledConnection};
pub use resp::Reply;
pub use tcp::TcpConnection;

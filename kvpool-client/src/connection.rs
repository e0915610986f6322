//! # Pooled Connection Handles
//!
//! Purpose: Define what the pool needs from a connection and how it keeps
//! track of one.
//!
//! ## Design Principles
//! 1. **Strategy Pattern**: The pool drives any type implementing `Connection`;
//!    the wire protocol lives entirely behind that trait.
//! 2. **Identity by Slot**: A `Handle` is an `Arc` around one connection, so
//!    membership checks compare slots rather than connection contents.
//! 3. **Explicit Sharing**: `Lease::Shared` tells the caller the same
//!    connection may be on loan to someone else at the same time.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::Endpoint;
use crate::error::ClientResult;

/// A connection the pool can create, connect, probe and close.
///
/// The pool never issues commands itself; callers reach the connection
/// through [`Handle::lock`].
pub trait Connection: Send + 'static {
    /// Construction parameters forwarded by the pool. Each connection gets
    /// its own clone.
    type Options: Clone + Send + Sync + 'static;

    /// Builds an unconnected instance.
    fn new(options: Self::Options) -> Self;

    /// Establishes (or re-establishes) the transport to `endpoint`.
    fn connect(&mut self, endpoint: &Endpoint) -> ClientResult<()>;

    /// Cheap liveness check; must not block on the network.
    fn is_connected(&self) -> bool;

    /// Releases transport resources.
    fn close(&mut self) -> ClientResult<()>;
}

struct Slot<C> {
    id: u64,
    conn: Mutex<C>,
}

/// Reference-counted handle to a pooled connection.
///
/// Clones point at the same connection; equality is slot identity.
pub struct Handle<C> {
    slot: Arc<Slot<C>>,
}

impl<C> Handle<C> {
    pub(crate) fn new(id: u64, conn: C) -> Self {
        Handle {
            slot: Arc::new(Slot {
                id,
                conn: Mutex::new(conn),
            }),
        }
    }

    /// Pool-unique identifier of this connection.
    pub fn id(&self) -> u64 {
        self.slot.id
    }

    /// Locks the underlying connection for exclusive use.
    ///
    /// Shared leases serialize through this lock, one command at a time.
    pub fn lock(&self) -> MutexGuard<'_, C> {
        // A panic while holding the lock leaves the connection itself intact;
        // its own connected flag decides whether it is still usable.
        self.slot.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C> Clone for Handle<C> {
    fn clone(&self) -> Self {
        Handle {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<C> PartialEq for Handle<C> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<C> Eq for Handle<C> {}

impl<C> fmt::Debug for Handle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("id", &self.slot.id).finish()
    }
}

/// A connection checked out of the pool.
///
/// `Shared` is only produced when the pool is at capacity with
/// `reuse_actives` enabled: the handle is the oldest active connection and
/// its first borrower still holds it. Commands from both borrowers
/// interleave on one transport.
pub enum Lease<C> {
    Exclusive(Handle<C>),
    Shared(Handle<C>),
}

impl<C> Lease<C> {
    pub fn is_shared(&self) -> bool {
        matches!(self, Lease::Shared(_))
    }

    pub fn handle(&self) -> &Handle<C> {
        match self {
            Lease::Exclusive(handle) | Lease::Shared(handle) => handle,
        }
    }

    pub fn into_handle(self) -> Handle<C> {
        match self {
            Lease::Exclusive(handle) | Lease::Shared(handle) => handle,
        }
    }
}

impl<C> Clone for Lease<C> {
    fn clone(&self) -> Self {
        match self {
            Lease::Exclusive(handle) => Lease::Exclusive(handle.clone()),
            Lease::Shared(handle) => Lease::Shared(handle.clone()),
        }
    }
}

impl<C> PartialEq for Lease<C> {
    fn eq(&self, other: &Self) -> bool {
        self.is_shared() == other.is_shared() && self.handle() == other.handle()
    }
}

impl<C> fmt::Debug for Lease<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lease::Exclusive(handle) => f.debug_tuple("Exclusive").field(handle).finish(),
            Lease::Shared(handle) => f.debug_tuple("Shared").field(handle).finish(),
        }
    }
}

impl<C> Deref for Lease<C> {
    type Target = Handle<C>;

    fn deref(&self) -> &Handle<C> {
        self.handle()
    }
}

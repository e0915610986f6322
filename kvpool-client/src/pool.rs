//! # Connection Pool
//!
//! Purpose: Hand out ready-to-use connections to one endpoint, reuse idle
//! ones first, and keep the number of checked-out connections bounded.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Connections move between an idle queue and an
//!    active queue; neither queue ever holds the same handle twice, and no
//!    handle sits in both.
//! 2. **Minimal Locking**: The pool mutex covers queue bookkeeping only.
//!    Connect, reconnect and close run under the handle's own lock, with an
//!    admission slot reserved so the ceiling holds while they are in flight.
//! 3. **Explicit Sharing**: At capacity with `reuse_actives` on, the oldest
//!    active connection is lent out again as `Lease::Shared` instead of
//!    failing.
//! 4. **Fail Fast**: Without reuse, exceeding capacity returns
//!    `TooManyClients` immediately; connect errors are returned untouched.
//!
//! ## Notes
//! - Releasing a shared handle moves it to idle even if another borrower is
//!   still using it. The next checkout may therefore share it again.
//! - In reuse mode a checkout that finds every slot mid-connect, with nothing
//!   active to share yet, waits until one of those connects resolves.
//! - `close()` locks every tracked handle. Do not call it while holding a
//!   handle's lock on the same thread.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Endpoint, PoolConfig};
use crate::connection::{Connection, Handle, Lease};
use crate::error::{ClientError, ClientResult};

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Configured ceiling; `0` means unbounded.
    pub capacity: usize,
    /// Connections currently checked out.
    pub active: usize,
    /// Connections waiting for reuse.
    pub idle: usize,
    /// Checkouts currently connecting or reconnecting.
    pub connecting: usize,
}

struct PoolState<C> {
    idle: VecDeque<Handle<C>>,
    active: VecDeque<Handle<C>>,
    connecting: usize,
    closed: bool,
}

struct PoolInner<C: Connection> {
    config: PoolConfig,
    options: C::Options,
    next_id: AtomicU64,
    state: Mutex<PoolState<C>>,
    // Signalled whenever a reserved slot resolves or the queues change.
    settled: Condvar,
}

/// Outcome of the locked admission step.
enum Checkout<C> {
    /// Front of the idle queue; a slot is reserved.
    Idle(Handle<C>),
    /// Oldest active handle, lent out again.
    Shared(Handle<C>),
    /// A slot is reserved for a brand-new connection with this id.
    Create(u64),
}

/// Connection pool handle. Clones share the same pool.
pub struct ConnectionPool<C: Connection> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connection> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        ConnectionPool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connection> ConnectionPool<C> {
    /// Creates an empty pool. `options` is cloned for every new connection.
    pub fn new(config: PoolConfig, options: C::Options) -> Self {
        let state = PoolState {
            idle: VecDeque::with_capacity(config.pool_size),
            active: VecDeque::with_capacity(config.pool_size),
            connecting: 0,
            closed: false,
        };
        ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                options,
                next_id: AtomicU64::new(1),
                state: Mutex::new(state),
                settled: Condvar::new(),
            }),
        }
    }

    /// Returns the configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Returns the endpoint every pooled connection is bound to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.config.endpoint
    }

    /// Checks out a connection.
    ///
    /// Idle connections are reused first and reconnected in place when they
    /// report not-connected. With no idle connection, a new one is created
    /// unless capacity is exhausted, in which case the oldest active handle is
    /// shared (`reuse_actives`) or `TooManyClients` is returned. A sharing
    /// pool whose slots are all still connecting blocks until one settles.
    pub fn acquire(&self) -> ClientResult<Lease<C>> {
        match self.checkout()? {
            Checkout::Shared(handle) => {
                debug!(id = handle.id(), "pool at capacity, sharing oldest active connection");
                Ok(Lease::Shared(handle))
            }
            Checkout::Idle(handle) => {
                if let Err(err) = self.ensure_connected(&handle) {
                    self.release_slot();
                    warn!(
                        id = handle.id(),
                        endpoint = %self.inner.config.endpoint,
                        error = %err,
                        "reconnect failed, discarding connection"
                    );
                    return Err(err);
                }
                self.activate(handle)
            }
            Checkout::Create(id) => match self.open(id) {
                Ok(handle) => self.activate(handle),
                Err(err) => {
                    self.release_slot();
                    Err(err)
                }
            },
        }
    }

    /// Checks out a connection wrapped in a guard that releases it on drop.
    pub fn get(&self) -> ClientResult<PooledConnection<C>> {
        let lease = self.acquire()?;
        Ok(PooledConnection {
            pool: self.clone(),
            lease,
        })
    }

    /// Returns a connection to the idle queue.
    ///
    /// Releasing a handle the pool does not consider active is logged and
    /// otherwise tolerated; a handle is never queued as idle twice. After
    /// `close()` this does nothing.
    pub fn release(&self, handle: &Handle<C>) {
        let mut state = self.lock_state();
        if state.closed {
            debug!(id = handle.id(), "pool closed, dropping released connection");
            return;
        }

        match state.active.iter().position(|active| active == handle) {
            Some(idx) => {
                state.active.remove(idx);
            }
            None => warn!(id = handle.id(), "released connection is not active"),
        }

        if !state.idle.contains(handle) {
            state.idle.push_back(handle.clone());
        }
        self.inner.settled.notify_all();
    }

    /// Closes every tracked connection and retires the pool.
    ///
    /// Idle connections are closed before active ones. Individual close
    /// failures are logged and do not stop the drain. Later calls are no-ops
    /// and later `acquire()` calls fail with `PoolClosed`.
    pub fn close(&self) {
        let drained = {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            state.closed = true;
            let mut drained: Vec<Handle<C>> = state.idle.drain(..).collect();
            drained.extend(state.active.drain(..));
            self.inner.settled.notify_all();
            drained
        };

        let failures = drained.iter().filter(|handle| !close_handle(handle)).count();
        info!(
            endpoint = %self.inner.config.endpoint,
            closed = drained.len(),
            failures,
            "connection pool closed"
        );
    }

    /// Takes a snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.lock_state();
        PoolStats {
            capacity: self.inner.config.pool_size,
            active: state.active.len(),
            idle: state.idle.len(),
            connecting: state.connecting,
        }
    }

    /// Returns true once `close()` has run.
    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState<C>> {
        // Every critical section leaves the queues consistent before it can
        // panic, so a poisoned lock still guards valid state.
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn checkout(&self) -> ClientResult<Checkout<C>> {
        let mut state = self.lock_state();
        loop {
            if state.closed {
                return Err(ClientError::PoolClosed);
            }

            if let Some(handle) = state.idle.pop_front() {
                state.connecting += 1;
                return Ok(Checkout::Idle(handle));
            }

            let Some(capacity) = self.inner.config.capacity() else {
                break;
            };
            let in_use = state.active.len() + state.connecting;
            if in_use < capacity {
                break;
            }
            if !self.inner.config.reuse_actives {
                return Err(ClientError::TooManyClients {
                    active: in_use,
                    capacity,
                });
            }
            if let Some(handle) = state.active.front() {
                return Ok(Checkout::Shared(handle.clone()));
            }

            // Every slot is mid-connect; each of them either activates or
            // gives its slot back, and both paths signal `settled`.
            debug!(connecting = state.connecting, "pool at capacity with nothing to share, waiting");
            state = self
                .inner
                .settled
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        state.connecting += 1;
        Ok(Checkout::Create(self.inner.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn release_slot(&self) {
        let mut state = self.lock_state();
        state.connecting = state.connecting.saturating_sub(1);
        self.inner.settled.notify_all();
    }

    fn open(&self, id: u64) -> ClientResult<Handle<C>> {
        info!(id, endpoint = %self.inner.config.endpoint, "making new connection");
        let mut conn = C::new(self.inner.options.clone());
        conn.connect(&self.inner.config.endpoint)?;
        Ok(Handle::new(id, conn))
    }

    fn ensure_connected(&self, handle: &Handle<C>) -> ClientResult<()> {
        let mut conn = handle.lock();
        if conn.is_connected() {
            return Ok(());
        }
        debug!(id = handle.id(), endpoint = %self.inner.config.endpoint, "reconnecting idle connection");
        conn.connect(&self.inner.config.endpoint)
    }

    fn activate(&self, handle: Handle<C>) -> ClientResult<Lease<C>> {
        let mut state = self.lock_state();
        state.connecting = state.connecting.saturating_sub(1);
        self.inner.settled.notify_all();
        if state.closed {
            drop(state);
            debug!(id = handle.id(), "pool closed while connecting");
            close_handle(&handle);
            return Err(ClientError::PoolClosed);
        }

        if !state.active.contains(&handle) {
            state.active.push_back(handle.clone());
        }
        Ok(Lease::Exclusive(handle))
    }
}

fn close_handle<C: Connection>(handle: &Handle<C>) -> bool {
    match handle.lock().close() {
        Ok(()) => true,
        Err(err) => {
            warn!(id = handle.id(), error = %err, "failed to close connection");
            false
        }
    }
}

/// RAII guard returning a connection to the pool on drop.
pub struct PooledConnection<C: Connection> {
    pool: ConnectionPool<C>,
    lease: Lease<C>,
}

impl<C: Connection> PooledConnection<C> {
    pub fn lease(&self) -> &Lease<C> {
        &self.lease
    }

    pub fn is_shared(&self) -> bool {
        self.lease.is_shared()
    }
}

impl<C: Connection> Deref for PooledConnection<C> {
    type Target = Handle<C>;

    fn deref(&self) -> &Handle<C> {
        self.lease.handle()
    }
}

impl<C: Connection> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        self.pool.release(self.lease.handle());
    }
}

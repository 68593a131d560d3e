use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use super::error::PoolError;
use super::manager::Manager;
use super::PoolInner;

/// One minted handle, as the pool ledger sees it.
///
/// The raw connection lives in `cell` and is owned by exactly one entry at a
/// time: re-minting takes it out of the old cell, so a stale caller-held
/// handle finds its cell empty and fails.
pub(crate) struct PooledEntry<C> {
    pub(crate) handle_id: u64,
    pub(crate) conn_id: u64,
    pub(crate) created: Instant,
    pub(crate) last_used: Instant,
    pub(crate) checkout_start: Instant,
    pub(crate) type_code: u64,
    pub(crate) valid: Arc<AtomicBool>,
    pub(crate) cell: Arc<Mutex<Option<C>>>,
}

impl<C> PooledEntry<C> {
    pub(crate) fn new(handle_id: u64, conn_id: u64, raw: C) -> Self {
        let now = Instant::now();
        PooledEntry {
            handle_id,
            conn_id,
            created: now,
            last_used: now,
            checkout_start: now,
            type_code: 0,
            valid: Arc::new(AtomicBool::new(true)),
            cell: Arc::new(Mutex::new(Some(raw))),
        }
    }

    /// Mint a fresh entry around a raw connection taken out of `self`,
    /// carrying the creation time and raw-connection identity over.
    pub(crate) fn remint(&self, handle_id: u64, raw: Option<C>, last_used: Instant) -> PooledEntry<C> {
        PooledEntry {
            handle_id,
            conn_id: self.conn_id,
            created: self.created,
            last_used,
            checkout_start: Instant::now(),
            type_code: self.type_code,
            valid: Arc::new(AtomicBool::new(true)),
            cell: Arc::new(Mutex::new(raw)),
        }
    }

    pub(crate) fn is_marked_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Permanent; a dead entry never comes back.
    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    /// Transfer ownership of the raw connection out of this entry. Waits
    /// out any in-flight caller operation on the same cell.
    pub(crate) fn take_raw(&self) -> Option<C> {
        self.cell.lock().take()
    }

    pub(crate) fn checkout_duration(&self) -> Duration {
        self.checkout_start.elapsed()
    }

    pub(crate) fn idle_duration(&self) -> Duration {
        self.last_used.elapsed()
    }
}

/// A live connection checked out of a [`Pool`](super::Pool).
///
/// Dropping the handle is the only way to give the connection back; the pool
/// then decides whether the raw connection is parked for reuse or closed.
/// The raw connection itself is reached through [`raw`](Self::raw), which
/// fails once the handle has been invalidated.
pub struct PooledConnection<M: Manager> {
    handle_id: u64,
    conn_id: u64,
    valid: Arc<AtomicBool>,
    cell: Arc<Mutex<Option<M::Connection>>>,
    pool: Arc<PoolInner<M>>,
}

impl<M: Manager> PooledConnection<M> {
    pub(crate) fn new(entry: &PooledEntry<M::Connection>, pool: Arc<PoolInner<M>>) -> Self {
        PooledConnection {
            handle_id: entry.handle_id,
            conn_id: entry.conn_id,
            valid: entry.valid.clone(),
            cell: entry.cell.clone(),
            pool,
        }
    }

    /// Borrow the raw connection for direct use.
    ///
    /// Fails with [`PoolError::InvalidConnection`] once the handle has been
    /// reclaimed, drained or otherwise invalidated.
    pub fn raw(&self) -> Result<RawConnection<'_, M::Connection>, PoolError<M::Error>> {
        if !self.valid.load(Ordering::Acquire) {
            return Err(PoolError::InvalidConnection);
        }
        let guard = self.cell.lock();
        MutexGuard::try_map(guard, Option::as_mut)
            .map(RawConnection)
            .map_err(|_| PoolError::InvalidConnection)
    }

    /// Whether the handle is still usable: never invalidated, and the
    /// transport underneath still open.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
            && self
                .cell
                .lock()
                .as_ref()
                .map_or(false, |raw| self.pool.manager().is_open(raw))
    }

    /// Identity of the underlying raw connection; stable across the
    /// re-mints a release or reclaim performs.
    pub fn connection_id(&self) -> u64 {
        self.conn_id
    }
}

impl<M: Manager> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        self.pool.push_connection(self.handle_id, self.conn_id);
    }
}

impl<M: Manager> PartialEq for PooledConnection<M> {
    fn eq(&self, other: &Self) -> bool {
        self.conn_id == other.conn_id
    }
}

impl<M: Manager> Eq for PooledConnection<M> {}

impl<M: Manager> fmt::Debug for PooledConnection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("connection", &self.conn_id)
            .field("valid", &self.valid.load(Ordering::Acquire))
            .finish()
    }
}

/// Checked view of the raw connection behind a [`PooledConnection`].
pub struct RawConnection<'a, C>(MappedMutexGuard<'a, C>);

impl<'a, C> Deref for RawConnection<'a, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.0
    }
}

impl<'a, C> DerefMut for RawConnection<'a, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.0
    }
}

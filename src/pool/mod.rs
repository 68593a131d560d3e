pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod state;

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::options::{type_code_for, ConnectionOptions};

use self::config::PoolConfig;
use self::connection::{PooledConnection, PooledEntry};
use self::error::PoolError;
use self::manager::Manager;
use self::state::{PoolMetrics, PoolState};

/// A bounded pool of reusable raw connections.
///
/// Cloning is cheap; every clone drives the same pool.
pub struct Pool<M: Manager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: Manager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: Manager> Pool<M> {
    /// Create a pool over `manager` with default tunables.
    pub fn new(manager: M, options: ConnectionOptions) -> Self {
        Self::builder().options(options).build(manager)
    }

    pub fn builder() -> PoolBuilder<M> {
        PoolBuilder::new()
    }

    /// Check out a connection using the configured credentials.
    ///
    /// Blocks while the pool is saturated, reclaiming the oldest active
    /// connection once it exceeds its checkout budget.
    pub fn acquire(&self) -> Result<PooledConnection<M>, PoolError<M::Error>> {
        let (username, password) = {
            let options = self.inner.options.read();
            (
                options.credentials.username.clone(),
                options.credentials.password.clone(),
            )
        };
        self.inner.acquire(&username, &password)
    }

    /// Check out a connection authenticated as `username`/`password`.
    pub fn acquire_as(
        &self,
        username: &str,
        password: &str,
    ) -> Result<PooledConnection<M>, PoolError<M::Error>> {
        self.inner.acquire(username, password)
    }

    /// Invalidate and close every pooled connection, idle and active.
    pub fn force_close_all(&self) {
        self.inner.force_close_all();
    }

    /// Close the pool: drain everything and fail all pending and future
    /// acquires with [`PoolError::Cancelled`].
    pub fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.inner.force_close_all();
        self.inner.released.notify_all();
        info!("connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Snapshot of the usage counters.
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics::from_state(&self.inner.state.lock())
    }

    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    pub fn active_count(&self) -> usize {
        self.inner.state.lock().active.len()
    }

    pub fn options(&self) -> ConnectionOptions {
        self.inner.options.read().clone()
    }

    // Connection settings. Every setter here drains the pool so that
    // connections opened under different settings never mix.

    pub fn set_url<T: Into<String>>(&self, url: T) {
        self.inner.options.write().url = url.into();
        self.inner.force_close_all();
    }

    pub fn set_driver<T: Into<String>>(&self, driver: T) {
        self.inner.options.write().driver = Some(driver.into());
        self.inner.force_close_all();
    }

    pub fn set_username<T: Into<String>>(&self, username: T) {
        self.inner.options.write().credentials.username = username.into();
        self.inner.force_close_all();
    }

    pub fn set_password<T: Into<String>>(&self, password: T) {
        self.inner.options.write().credentials.password = password.into();
        self.inner.force_close_all();
    }

    pub fn set_auto_commit(&self, auto_commit: bool) {
        self.inner.options.write().auto_commit = auto_commit;
        self.inner.force_close_all();
    }

    // Pool tunables. These take effect on the next transition and leave
    // existing connections alone.

    pub fn config(&self) -> PoolConfig {
        self.inner.config.read().clone()
    }

    pub fn set_max_active(&self, max_active: usize) {
        self.inner.config.write().max_active = max_active;
    }

    pub fn set_max_idle(&self, max_idle: usize) {
        self.inner.config.write().max_idle = max_idle;
    }

    pub fn set_max_checkout_time(&self, max_checkout_time: Duration) {
        self.inner.config.write().max_checkout_time = max_checkout_time;
    }

    pub fn set_wait_timeout(&self, wait_timeout: Duration) {
        self.inner.config.write().wait_timeout = wait_timeout;
    }

    pub fn set_ping_enabled(&self, ping_enabled: bool) {
        self.inner.config.write().ping_enabled = ping_enabled;
    }

    pub fn set_ping_query<T: Into<String>>(&self, ping_query: Option<T>) {
        self.inner.config.write().ping_query = ping_query.map(Into::into);
    }

    pub fn set_ping_idle_threshold(&self, ping_idle_threshold: Duration) {
        self.inner.config.write().ping_idle_threshold = ping_idle_threshold;
    }
}

pub struct PoolBuilder<M: Manager> {
    options: ConnectionOptions,
    config: PoolConfig,
    _manager: PhantomData<M>,
}

impl<M: Manager> PoolBuilder<M> {
    pub fn new() -> Self {
        Self {
            options: ConnectionOptions::default(),
            config: PoolConfig::default(),
            _manager: PhantomData,
        }
    }

    pub fn options<T>(mut self, options: T) -> Self
    where
        T: Into<ConnectionOptions>,
    {
        self.options = options.into();
        self
    }

    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self, manager: M) -> Pool<M> {
        let expected_type_code = self.options.type_code();
        Pool {
            inner: Arc::new(PoolInner {
                manager,
                options: RwLock::new(self.options),
                config: RwLock::new(self.config),
                state: Mutex::new(PoolState::new(expected_type_code)),
                released: Condvar::new(),
                handle_seq: AtomicU64::new(1),
                conn_seq: AtomicU64::new(1),
            }),
        }
    }
}

impl<M: Manager> Default for PoolBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct PoolInner<M: Manager> {
    manager: M,
    options: RwLock<ConnectionOptions>,
    config: RwLock<PoolConfig>,
    state: Mutex<PoolState<M::Connection>>,
    released: Condvar,
    handle_seq: AtomicU64,
    conn_seq: AtomicU64,
}

impl<M: Manager> PoolInner<M> {
    pub(crate) fn manager(&self) -> &M {
        &self.manager
    }

    fn next_handle_id(&self) -> u64 {
        self.handle_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn acquire(
        self: &Arc<Self>,
        username: &str,
        password: &str,
    ) -> Result<PooledConnection<M>, PoolError<M::Error>> {
        let started = Instant::now();
        let mut counted_wait = false;
        let mut local_bad: u32 = 0;

        loop {
            let config = self.config.read().clone();
            let mut state = self.state.lock();
            if state.closed {
                return Err(PoolError::Cancelled);
            }

            let mut from_idle = false;
            let candidate = if let Some(entry) = state.idle.pop_front() {
                from_idle = true;
                debug!(connection = entry.conn_id, "checked out idle connection");
                Some(entry)
            } else if state.active.len() < config.max_active {
                let raw = {
                    let options = self.options.read();
                    self.manager
                        .connect(&options, username, password)
                        .map_err(PoolError::Connect)?
                };
                let entry = PooledEntry::new(
                    self.next_handle_id(),
                    self.conn_seq.fetch_add(1, Ordering::Relaxed),
                    raw,
                );
                debug!(connection = entry.conn_id, "opened new connection");
                Some(entry)
            } else if state
                .active
                .front()
                .map_or(false, |oldest| oldest.checkout_duration() > config.max_checkout_time)
            {
                let oldest = state.active.pop_front().ok_or(PoolError::Internal)?;
                let held = oldest.checkout_duration();
                state.stats.claimed_overdue_connection_count += 1;
                state.stats.accumulated_overdue_checkout_time += held;
                state.stats.accumulated_checkout_time += held;
                warn!(
                    connection = oldest.conn_id,
                    held_ms = held.as_millis() as u64,
                    "claimed overdue connection"
                );
                Some(self.reclaim(oldest))
            } else {
                if !counted_wait {
                    state.stats.had_to_wait_count += 1;
                    counted_wait = true;
                }
                debug!(
                    timeout_ms = config.wait_timeout.as_millis() as u64,
                    "waiting for a connection"
                );
                let wait_start = Instant::now();
                let _ = self.released.wait_for(&mut state, config.wait_timeout);
                state.stats.accumulated_wait_time += wait_start.elapsed();
                None
            };

            let mut entry = match candidate {
                Some(entry) => entry,
                None => continue,
            };

            if self.is_usable(&entry, from_idle, &config) && self.rollback_open_transaction(&entry) {
                let type_code = {
                    let options = self.options.read();
                    type_code_for(&options.url, username, password)
                };
                let now = Instant::now();
                entry.type_code = type_code;
                entry.checkout_start = now;
                entry.last_used = now;
                let handle = PooledConnection::new(&entry, self.clone());
                state.active.push_back(entry);
                state.stats.request_count += 1;
                state.stats.accumulated_request_time += started.elapsed();
                return Ok(handle);
            }

            info!(connection = entry.conn_id, "discarding bad connection");
            state.stats.bad_connection_count += 1;
            local_bad += 1;
            entry.invalidate();

            if local_bad > (config.max_idle as u32).saturating_add(3) {
                debug!("could not get a good connection to the backend");
                return Err(PoolError::TooManyBadConnections { attempts: local_bad });
            }
        }
    }

    /// Repossess `oldest`: the stale handle is invalidated, its raw
    /// connection rolled back and moved into a fresh entry that keeps the
    /// original creation time and identity.
    fn reclaim(&self, oldest: PooledEntry<M::Connection>) -> PooledEntry<M::Connection> {
        oldest.invalidate();
        let mut raw = oldest.take_raw();
        if let Some(conn) = raw.as_mut() {
            if !self.manager.is_auto_commit(conn) {
                if let Err(error) = self.manager.rollback(conn) {
                    warn!(
                        connection = oldest.conn_id,
                        %error,
                        "rollback on reclaimed connection failed"
                    );
                }
            }
        }
        oldest.remint(self.next_handle_id(), raw, oldest.last_used)
    }

    /// Candidate validation: the validity flag, the transport, and for
    /// idle-drawn candidates the liveness probe.
    fn is_usable(
        &self,
        entry: &PooledEntry<M::Connection>,
        from_idle: bool,
        config: &PoolConfig,
    ) -> bool {
        if !entry.is_marked_valid() {
            return false;
        }
        let mut cell = entry.cell.lock();
        let raw = match cell.as_mut() {
            Some(raw) => raw,
            None => return false,
        };
        if !self.manager.is_open(raw) {
            return false;
        }
        if from_idle && config.ping_enabled && entry.idle_duration() > config.ping_idle_threshold {
            if let Some(query) = config.ping_query.as_deref() {
                if let Err(error) = self.manager.ping(raw, query) {
                    info!(
                        connection = entry.conn_id,
                        %error,
                        "liveness probe failed, closing connection"
                    );
                    if let Some(dead) = cell.take() {
                        let _ = self.manager.close(dead);
                    }
                    return false;
                }
                debug!(connection = entry.conn_id, "liveness probe passed");
            }
        }
        true
    }

    /// Guarantee the next borrower starts from a clean transaction state.
    /// A connection that cannot be rolled back is treated as bad.
    fn rollback_open_transaction(&self, entry: &PooledEntry<M::Connection>) -> bool {
        let mut cell = entry.cell.lock();
        let raw = match cell.as_mut() {
            Some(raw) => raw,
            None => return false,
        };
        if self.manager.is_auto_commit(raw) {
            return true;
        }
        match self.manager.rollback(raw) {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    connection = entry.conn_id,
                    %error,
                    "rollback failed, discarding connection"
                );
                false
            }
        }
    }

    /// Release path, invoked by the handle's `Drop`; never by callers.
    pub(crate) fn push_connection(&self, handle_id: u64, conn_id: u64) {
        let config = self.config.read().clone();
        let mut state = self.state.lock();

        let position = state
            .active
            .iter()
            .position(|entry| entry.handle_id == handle_id);
        let entry = match position.and_then(|index| state.active.remove(index)) {
            Some(entry) => entry,
            None => {
                // already reclaimed or drained while the caller held it
                info!(
                    connection = conn_id,
                    "a bad connection attempted to return to the pool, discarding"
                );
                state.stats.bad_connection_count += 1;
                return;
            }
        };

        let usable = entry.is_marked_valid()
            && entry
                .cell
                .lock()
                .as_ref()
                .map_or(false, |raw| self.manager.is_open(raw));
        if !usable {
            info!(
                connection = conn_id,
                "a bad connection attempted to return to the pool, discarding"
            );
            state.stats.bad_connection_count += 1;
            entry.invalidate();
            return;
        }

        state.stats.accumulated_checkout_time += entry.checkout_duration();

        let clean = self.rollback_open_transaction(&entry);
        if clean
            && state.idle.len() < config.max_idle
            && entry.type_code == state.expected_type_code
        {
            entry.invalidate();
            let raw = entry.take_raw();
            let refreshed = entry.remint(self.next_handle_id(), raw, Instant::now());
            debug!(connection = refreshed.conn_id, "returned connection to pool");
            state.idle.push_back(refreshed);
            self.released.notify_all();
        } else {
            entry.invalidate();
            if let Some(raw) = entry.take_raw() {
                if let Err(error) = self.manager.close(raw) {
                    debug!(connection = conn_id, %error, "error closing released connection");
                }
            }
            debug!(connection = conn_id, "closed returned connection");
        }
    }

    /// Invalidate and close everything, idle and active, swallowing any
    /// close-time error; also re-anchors the expected fingerprint to the
    /// current connection settings.
    pub(crate) fn force_close_all(&self) {
        let mut state = self.state.lock();
        state.expected_type_code = self.options.read().type_code();

        let state = &mut *state;
        let drained: Vec<PooledEntry<M::Connection>> = state
            .active
            .drain(..)
            .chain(state.idle.drain(..))
            .collect();
        let drained_count = drained.len();
        for entry in drained {
            entry.invalidate();
            if let Some(mut raw) = entry.take_raw() {
                if !self.manager.is_auto_commit(&raw) {
                    let _ = self.manager.rollback(&mut raw);
                }
                let _ = self.manager.close(raw);
            }
        }
        if drained_count > 0 {
            info!(connections = drained_count, "forcefully closed all pooled connections");
        }
    }
}

impl<M: Manager> Drop for PoolInner<M> {
    fn drop(&mut self) {
        self.force_close_all();
    }
}

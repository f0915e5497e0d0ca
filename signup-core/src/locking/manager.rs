//! In-memory keyed lock manager.
//!
//! Each key owns a fair (FIFO) async mutex. Entries are created on the first
//! acquisition attempt for a key and removed as soon as the last holder or
//! waiter for that key is gone, so the table never grows beyond the set of
//! keys currently in use.
//!
//! Re-entrancy is not supported: a critical section that asks for the key it
//! already holds waits on itself until its own timeout fires.

use crate::config::{Environment, LockConfig};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A caller could not start its critical section before its deadline.
///
/// Transient; the caller may retry with backoff.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("timed out after {}ms waiting for lock {key}", timeout.as_millis())]
pub struct LockTimeout {
    pub key: String,
    pub timeout: Duration,
}

/// `clear_all_locks` was called in an environment that forbids it.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("clearing locks is disabled in the {0} environment")]
pub struct ClearLocksForbidden(pub Environment);

/// Keyed mutual exclusion.
///
/// For one key at most one `body` runs at a time and queued callers run in
/// arrival order. Different keys never block each other. Errors returned by
/// `body` are passed through untouched; the only error a lock introduces is
/// [`LockTimeout`], converted into the caller's error type.
///
/// [`LockManager`] is the single-process implementation. A distributed
/// implementation can be dropped in behind this trait without touching
/// call sites.
///
/// Bodies are boxed so the returned future stays `Send` when the body
/// borrows the caller's `&self`.
pub trait KeyedLock: Send + Sync {
    fn with_lock<'a, T, E, F>(
        &'a self,
        key: &'a str,
        timeout: Option<Duration>,
        body: F,
    ) -> BoxFuture<'a, Result<T, E>>
    where
        F: FnOnce() -> BoxFuture<'a, Result<T, E>> + Send + 'a,
        T: Send + 'a,
        E: From<LockTimeout> + Send + 'a;
}

/// Point-in-time lock counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockStats {
    /// Live entries in the lock table (held or waited on).
    pub active_locks: usize,
    pub total_locks_acquired: u64,
    pub total_timeouts: u64,
    pub average_wait_time_ms: f64,
}

struct LockEntry {
    mutex: Arc<AsyncMutex<()>>,
    /// Current holder plus queued waiters.
    refs: usize,
    /// Serial of the current holder's ticket and when it got the lock.
    holder: Option<(u64, Instant)>,
    next_serial: u64,
}

#[derive(Default)]
struct Counters {
    acquired: AtomicU64,
    timeouts: AtomicU64,
    wait_micros: AtomicU64,
}

pub struct LockManager {
    table: Mutex<HashMap<String, LockEntry>>,
    counters: Counters,
    config: LockConfig,
}

/// One caller's claim on a lock entry, from enqueue until it either times
/// out or finishes its critical section. Dropping it releases the claim,
/// which also covers callers whose future is cancelled mid-wait.
struct Ticket<'a> {
    manager: &'a LockManager,
    key: String,
    mutex: Arc<AsyncMutex<()>>,
    serial: u64,
    holding: bool,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        self.manager.release(self);
    }
}

impl LockManager {
    pub fn new(config: LockConfig) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            counters: Counters::default(),
            config,
        }
    }

    pub fn config(&self) -> LockConfig {
        self.config
    }

    /// Run `body` while holding `key`.
    ///
    /// `timeout` bounds only the time spent queued (the manager's default
    /// applies when `None`); a body that has started always runs to
    /// completion. The lock is released before the body's result, success or
    /// error, is returned.
    pub async fn with_lock<T, E, F, Fut>(
        &self,
        key: &str,
        timeout: Option<Duration>,
        body: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockTimeout>,
    {
        let timeout = timeout.unwrap_or(self.config.default_timeout);
        let mut ticket = self.enqueue(key);
        let enqueued_at = Instant::now();

        let acquire = Arc::clone(&ticket.mutex).lock_owned();
        let guard = match tokio::time::timeout(timeout, acquire).await {
            Ok(guard) => guard,
            Err(_) => {
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key,
                    timeout_ms = timeout.as_millis() as u64,
                    holder_ms = self.held_for(key).map(|d| d.as_millis() as u64),
                    "Timed out waiting for lock"
                );
                return Err(LockTimeout {
                    key: key.to_owned(),
                    timeout,
                }
                .into());
            }
        };

        let waited = enqueued_at.elapsed();
        ticket.holding = true;
        self.mark_acquired(&ticket, waited);
        debug!(key, wait_ms = waited.as_millis() as u64, "Lock acquired");

        let result = body().await;

        // Unlock before the claim is dropped so a queued waiter is already
        // holding its own reference when this one goes away.
        drop(guard);
        drop(ticket);
        debug!(key, ok = result.is_ok(), "Lock released");

        result
    }

    /// Snapshot of the lock counters.
    pub fn stats(&self) -> LockStats {
        let acquired = self.counters.acquired.load(Ordering::Relaxed);
        let wait_micros = self.counters.wait_micros.load(Ordering::Relaxed);
        let average_wait_time_ms = if acquired == 0 {
            0.0
        } else {
            wait_micros as f64 / acquired as f64 / 1000.0
        };

        LockStats {
            active_locks: self.table().len(),
            total_locks_acquired: acquired,
            total_timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            average_wait_time_ms,
        }
    }

    /// Holder plus waiters currently attached to `key`; `0` once the entry
    /// has been removed.
    pub fn pending(&self, key: &str) -> usize {
        self.table().get(key).map_or(0, |entry| entry.refs)
    }

    /// Whether some caller is currently inside the critical section for `key`.
    pub fn is_locked(&self, key: &str) -> bool {
        self.held_for(key).is_some()
    }

    /// Drop every entry and reset the counters. Test and development only.
    ///
    /// In-flight holders keep running; their release is ignored because the
    /// entry they belonged to is gone.
    pub fn clear_all_locks(&self) -> Result<usize, ClearLocksForbidden> {
        let environment = self.config.environment;
        if !environment.allows_admin_reset() {
            warn!(%environment, "Refusing to clear lock table");
            return Err(ClearLocksForbidden(environment));
        }

        let cleared = {
            let mut table = self.table();
            let cleared = table.len();
            table.clear();
            cleared
        };
        self.counters.acquired.store(0, Ordering::Relaxed);
        self.counters.timeouts.store(0, Ordering::Relaxed);
        self.counters.wait_micros.store(0, Ordering::Relaxed);

        warn!(cleared, "Lock table cleared");
        Ok(cleared)
    }

    // -- Private helpers ----------------------------------------------------

    fn table(&self) -> MutexGuard<'_, HashMap<String, LockEntry>> {
        // The table is only touched in short non-panicking sections, so a
        // poisoned guard still holds a consistent map.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, key: &str) -> Ticket<'_> {
        let mut table = self.table();
        let entry = table.entry(key.to_owned()).or_insert_with(|| LockEntry {
            mutex: Arc::new(AsyncMutex::new(())),
            refs: 0,
            holder: None,
            next_serial: 0,
        });
        entry.refs += 1;
        let serial = entry.next_serial;
        entry.next_serial = entry.next_serial.wrapping_add(1);

        Ticket {
            manager: self,
            key: key.to_owned(),
            mutex: Arc::clone(&entry.mutex),
            serial,
            holding: false,
        }
    }

    fn mark_acquired(&self, ticket: &Ticket<'_>, waited: Duration) {
        if let Some(entry) = self.table().get_mut(&ticket.key) {
            if Arc::ptr_eq(&entry.mutex, &ticket.mutex) {
                entry.holder = Some((ticket.serial, Instant::now()));
            }
        }
        self.counters.acquired.fetch_add(1, Ordering::Relaxed);
        self.counters
            .wait_micros
            .fetch_add(waited.as_micros() as u64, Ordering::Relaxed);
    }

    fn held_for(&self, key: &str) -> Option<Duration> {
        self.table()
            .get(key)
            .and_then(|entry| entry.holder)
            .map(|(_, at)| at.elapsed())
    }

    fn release(&self, ticket: &Ticket<'_>) {
        let key = ticket.key.as_str();
        let mut table = self.table();
        let Some(entry) = table.get_mut(key) else {
            return;
        };
        // The entry was cleared and recreated while this claim was alive.
        if !Arc::ptr_eq(&entry.mutex, &ticket.mutex) {
            return;
        }

        // The next holder may already have marked itself.
        if ticket.holding && entry.holder.is_some_and(|(serial, _)| serial == ticket.serial) {
            entry.holder = None;
        }
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            table.remove(key);
            debug!(key, "Lock entry removed");
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(LockConfig::default())
    }
}

impl KeyedLock for LockManager {
    fn with_lock<'a, T, E, F>(
        &'a self,
        key: &'a str,
        timeout: Option<Duration>,
        body: F,
    ) -> BoxFuture<'a, Result<T, E>>
    where
        F: FnOnce() -> BoxFuture<'a, Result<T, E>> + Send + 'a,
        T: Send + 'a,
        E: From<LockTimeout> + Send + 'a,
    {
        LockManager::with_lock(self, key, timeout, body).boxed()
    }
}

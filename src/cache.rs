/// Time-bounded cache holding at most one recommendation snapshot.
///
/// A snapshot is valid for any instant within `ttl` of its build time, on
/// either side. With auto-purge on, every put sets an expiry deadline for
/// its generation and wakes the expiry worker, which waits on a condition
/// variable until the latest deadline. A put replaces the pending deadline
/// and a purge clears it, so an older, longer wait never holds up a newer
/// one. The entry, the generation, the deadline and the configuration share
/// one mutex, so get/put/purge and expiry never interleave.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use threadpool::ThreadPool;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::model::Snapshot;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CachedSnapshot {
    built_at: DateTime<Utc>,
    snapshot: Arc<Snapshot>,
}

#[derive(Debug, Clone, Copy)]
struct PendingExpiry {
    generation: u64,
    deadline: Instant,
}

#[derive(Debug)]
struct CacheState {
    entry: Option<CachedSnapshot>,
    generation: u64,
    expiry: Option<PendingExpiry>,
    ttl: Duration,
    auto_purge: bool,
    purge_on_complete: bool,
    shutdown: bool,
}

impl CacheState {
    fn clear(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);
        self.expiry = None;
        self.entry.take().is_some()
    }

    fn is_valid(&self, t: DateTime<Utc>) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|e| t >= e.built_at - self.ttl && t <= e.built_at + self.ttl)
    }
}

struct Shared {
    state: Mutex<CacheState>,
    wake: Condvar,
}

impl Shared {
    /// A poisoned lock only means another thread panicked mid-operation;
    /// every operation leaves the state consistent, so keep using it.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

pub struct SnapshotCache {
    shared: Arc<Shared>,
    _expiry: ThreadPool,
}

impl SnapshotCache {
    pub fn new(config: CacheConfig) -> Self {
        let config = config.validated();
        let shared = Arc::new(Shared {
            state: Mutex::new(CacheState {
                entry: None,
                generation: 0,
                expiry: None,
                ttl: Duration::minutes(config.ttl_minutes),
                auto_purge: config.auto_purge,
                purge_on_complete: config.purge_on_complete,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });
        let expiry = ThreadPool::with_name("snapshot-expiry".to_string(), 1);
        let worker = Arc::clone(&shared);
        expiry.execute(move || run_expiry(&worker));
        Self {
            shared,
            _expiry: expiry,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.shared.lock()
    }

    /// True when a snapshot is held and `t` lies within `[built - ttl, built + ttl]`.
    pub fn is_valid(&self, t: DateTime<Utc>) -> bool {
        self.lock().is_valid(t)
    }

    /// The cached snapshot if it is valid at `t`, or whenever `force` is set.
    pub fn get(&self, t: DateTime<Utc>, force: bool) -> Option<Arc<Snapshot>> {
        let state = self.lock();
        if !force && !state.is_valid(t) {
            return None;
        }
        state.entry.as_ref().map(|e| Arc::clone(&e.snapshot))
    }

    /// Replaces the cached snapshot and reschedules expiry.
    pub fn put(&self, t: DateTime<Utc>, snapshot: Arc<Snapshot>) {
        let mut state = self.lock();
        state.generation = state.generation.wrapping_add(1);
        state.entry = Some(CachedSnapshot {
            built_at: t,
            snapshot,
        });
        debug!(built_at = %t, generation = state.generation, "snapshot cached");

        state.expiry = if state.auto_purge {
            match state.ttl.to_std() {
                Ok(delay) => Some(PendingExpiry {
                    generation: state.generation,
                    deadline: Instant::now() + delay,
                }),
                Err(_) => {
                    warn!(ttl_ms = state.ttl.num_milliseconds(), "negative cache ttl, expiry not scheduled");
                    None
                }
            }
        } else {
            None
        };
        self.shared.wake.notify_all();
    }

    /// Drops the cached snapshot and cancels any pending expiry.
    pub fn purge(&self) {
        if self.lock().clear() {
            info!("cached snapshot purged");
        }
        self.shared.wake.notify_all();
    }

    /// Purge hook for a consumer that has finished with the snapshot.
    /// Does nothing unless purge-on-complete is enabled.
    pub fn purge_on_complete(&self) {
        let mut state = self.lock();
        if !state.purge_on_complete {
            debug!("purge on complete disabled, snapshot kept");
            return;
        }
        if state.clear() {
            info!("cached snapshot purged on completion");
        }
        self.shared.wake.notify_all();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entry.is_none()
    }

    pub fn ttl(&self) -> Duration {
        self.lock().ttl
    }

    /// Takes effect for validity checks immediately and for expiry from the next put.
    pub fn set_ttl(&self, ttl: Duration) {
        self.lock().ttl = ttl;
    }

    /// Disabling also cancels a pending expiry.
    pub fn set_auto_purge(&self, enabled: bool) {
        let mut state = self.lock();
        state.auto_purge = enabled;
        if !enabled {
            state.expiry = None;
            self.shared.wake.notify_all();
        }
    }

    pub fn set_purge_on_complete(&self, enabled: bool) {
        self.lock().purge_on_complete = enabled;
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl Drop for SnapshotCache {
    fn drop(&mut self) {
        self.lock().shutdown = true;
        self.shared.wake.notify_all();
    }
}

/// Expiry worker: sleeps until the pending deadline, or until woken by a
/// put, purge or shutdown, then re-reads the state.
fn run_expiry(shared: &Shared) {
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            return;
        }
        let Some(pending) = state.expiry else {
            state = shared.wake.wait(state).unwrap_or_else(|poisoned| poisoned.into_inner());
            continue;
        };
        let now = Instant::now();
        if now < pending.deadline {
            state = match shared.wake.wait_timeout(state, pending.deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
            continue;
        }
        state.expiry = None;
        if state.generation == pending.generation && state.clear() {
            info!(generation = pending.generation, "cached snapshot expired");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

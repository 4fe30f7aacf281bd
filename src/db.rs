use crate::config::{sweep_batch_size_or_default, sweep_interval_or_default, LOGGER};
use crate::glob;
use crate::metrics::REMOVED_EXPIRED_KEY_COUNTER;

use bytes::Bytes;
use slog::{debug, info};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{self, Instant, MissedTickBehavior};

/// A wrapper around a `Db` instance. This exists to allow orderly cleanup
/// of the `Db` by signalling the background sweeper task to shut down when
/// this struct is dropped.
#[derive(Debug)]
pub struct DbDropGuard {
    /// The `Db` instance that will be shut down when this `DbDropGuard`
    /// struct is dropped.
    db: Db,
}

/// Server state shared across all connections.
///
/// `Db` contains a `HashMap` storing the key/value data and a `BTreeSet` of
/// the pending expiry deadlines. A `Db` instance is a handle to shared
/// state. Cloning `Db` is shallow and only incurs an atomic ref count
/// increment.
///
/// When a `Db` value is created, a background task is spawned. This task is
/// the eventual half of the expiry discipline: it reclaims entries whose
/// deadline has passed even if no client ever touches them again. The lazy
/// half lives in the operations themselves, which evict a dead entry before
/// answering.
#[derive(Debug, Clone)]
pub struct Db {
    /// Handle to shared state. The background task also has a handle.
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    /// The shared state is guarded by a mutex. This is a `std::sync::Mutex`
    /// and not a Tokio mutex. This is because there are no asynchronous
    /// operations being performed while holding the mutex. Additionally, the
    /// critical sections are very small.
    state: Mutex<State>,

    /// Notifies the background task. Used to wake it for shutdown without
    /// waiting out a full sweep interval.
    background_task: Notify,
}

#[derive(Debug)]
struct State {
    /// The key/value data.
    entries: HashMap<Bytes, Entry>,

    /// Tracks key expirations, ordered by deadline.
    ///
    /// Invariant: this set holds exactly one pair per entry that carries a
    /// deadline, so the sweeper only ever pops keys that are genuinely
    /// expired.
    expirations: BTreeSet<(Instant, Bytes)>,

    /// True when the `Db` instance is shutting down. This happens when all
    /// `DbDropGuard` values drop. Setting this to `true` signals to the
    /// background task to exit.
    shutdown: bool,
}

/// Entry in the key/value store.
#[derive(Debug)]
struct Entry {
    /// Stored data
    data: Bytes,

    /// Instant at which the entry expires and should be removed from the
    /// store. `None` means the entry never expires.
    expires_at: Option<Instant>,
}

/// TTL state reported for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key does not exist or has already expired.
    Missing,
    /// Key exists but carries no deadline.
    NoExpiry,
    /// Key expires after the given duration.
    ExpiresIn(Duration),
}

impl DbDropGuard {
    /// Create a new `DbDropGuard`, wrapping a `Db` instance. When this is
    /// dropped the `Db`'s sweeper task will be shut down.
    pub fn new() -> DbDropGuard {
        DbDropGuard { db: Db::new() }
    }

    /// Get the shared database. Internally, this is an
    /// `Arc`, so a clone only increments the ref count.
    pub fn db(&self) -> Db {
        self.db.clone()
    }
}

impl Default for DbDropGuard {
    fn default() -> DbDropGuard {
        DbDropGuard::new()
    }
}

impl Drop for DbDropGuard {
    fn drop(&mut self) {
        // Signal the 'Db' instance to shut down the task that sweeps expired
        // keys.
        self.db.shutdown_sweeper();
    }
}

impl Db {
    /// Create a new, empty, `Db` instance. Shared state is allocated and a
    /// background task is spawned to reclaim expired entries.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Db {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                entries: HashMap::new(),
                expirations: BTreeSet::new(),
                shutdown: false,
            }),
            background_task: Notify::new(),
        });

        // Start the background task.
        tokio::spawn(sweep_expired_entries(shared.clone()));

        Db { shared }
    }

    /// Get the value associated with a key.
    ///
    /// Returns `None` if there is no value associated with the key or the
    /// key's deadline has passed. A dead entry is evicted on the way out.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        let mut state = self.shared.state.lock().unwrap();
        let now = Instant::now();
        if state.evict_if_expired(key, now) {
            return None;
        }
        state.entries.get(key).map(|entry| entry.data.clone())
    }

    /// Set the value associated with a key together with an optional
    /// time-to-live.
    ///
    /// The entry is replaced whole: any previous value and any previous
    /// deadline are discarded. No TTL means the new entry never expires.
    pub fn set(&self, key: Bytes, value: Bytes, expire: Option<Duration>) {
        let mut state = self.shared.state.lock().unwrap();
        let expires_at = expire.map(|ttl| Instant::now() + ttl);
        state.store(key, value, expires_at);
    }

    /// Get the values for a list of keys.
    ///
    /// The result has the same length and order as `keys`; misses and
    /// expired keys yield `None`. The whole read happens under one lock
    /// acquisition, so it observes a single point-in-time snapshot.
    pub fn mget(&self, keys: &[Bytes]) -> Vec<Option<Bytes>> {
        let mut state = self.shared.state.lock().unwrap();
        let now = Instant::now();
        keys.iter()
            .map(|key| {
                if state.evict_if_expired(key, now) {
                    return None;
                }
                state.entries.get(&key[..]).map(|entry| entry.data.clone())
            })
            .collect()
    }

    /// Store several key/value pairs as one atomic step.
    ///
    /// No reader observes some of the pairs without the others. Previous
    /// deadlines on the touched keys are cleared.
    pub fn mset(&self, pairs: Vec<(Bytes, Bytes)>) {
        let mut state = self.shared.state.lock().unwrap();
        for (key, value) in pairs {
            state.store(key, value, None);
        }
    }

    /// Remove keys, returning how many of them held a live entry.
    ///
    /// Expired entries are evicted but do not count.
    pub fn del(&self, keys: &[Bytes]) -> i64 {
        let mut state = self.shared.state.lock().unwrap();
        let now = Instant::now();
        let mut removed = 0;
        for key in keys {
            if state.evict_if_expired(key, now) {
                continue;
            }
            if let Some((key, entry)) = state.entries.remove_entry(&key[..]) {
                if let Some(when) = entry.expires_at {
                    state.expirations.remove(&(when, key));
                }
                removed += 1;
            }
        }
        removed
    }

    /// Count how many of the given keys hold a live entry, with
    /// multiplicity: a key named twice counts twice.
    pub fn exists(&self, keys: &[Bytes]) -> i64 {
        let mut state = self.shared.state.lock().unwrap();
        let now = Instant::now();
        let mut present = 0;
        for key in keys {
            if state.evict_if_expired(key, now) {
                continue;
            }
            if state.entries.contains_key(&key[..]) {
                present += 1;
            }
        }
        present
    }

    /// Set or overwrite the expiry deadline on a live key.
    ///
    /// Returns `false` when the key is absent or already expired; an
    /// expired key is never resurrected.
    pub fn expire(&self, key: &[u8], ttl: Duration) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        let now = Instant::now();
        if state.evict_if_expired(key, now) {
            return false;
        }
        let (owned, prev) = match state.entries.get_key_value(key) {
            Some((key, entry)) => (key.clone(), entry.expires_at),
            None => return false,
        };
        if let Some(prev) = prev {
            state.expirations.remove(&(prev, owned.clone()));
        }
        let when = now + ttl;
        state.expirations.insert((when, owned));
        state.entries.get_mut(key).unwrap().expires_at = Some(when);
        true
    }

    /// Report the TTL state of a key.
    ///
    /// The remaining duration is measured against the same clock reading
    /// that decides liveness, so it is never negative for a live entry.
    pub fn ttl(&self, key: &[u8]) -> Ttl {
        let mut state = self.shared.state.lock().unwrap();
        let now = Instant::now();
        if state.evict_if_expired(key, now) {
            return Ttl::Missing;
        }
        match state.entries.get(key) {
            None => Ttl::Missing,
            Some(entry) => match entry.expires_at {
                None => Ttl::NoExpiry,
                Some(when) => Ttl::ExpiresIn(when.saturating_duration_since(now)),
            },
        }
    }

    /// Enumerate live keys matching a glob pattern.
    ///
    /// This scans the whole keyspace under the mutex; the cost is O(n) in
    /// the number of entries. Expired keys encountered during the scan are
    /// evicted rather than reported.
    pub fn keys(&self, pattern: &[u8]) -> Vec<Bytes> {
        let mut state = self.shared.state.lock().unwrap();
        let now = Instant::now();
        let mut matched = Vec::new();
        let mut dead = Vec::new();
        for (key, entry) in &state.entries {
            if let Some(when) = entry.expires_at {
                if when <= now {
                    dead.push(key.clone());
                    continue;
                }
            }
            if glob::glob_match(pattern, key) {
                matched.push(key.clone());
            }
        }
        for key in dead {
            state.evict_if_expired(&key, now);
        }
        matched
    }

    /// Drop every entry and all expiry bookkeeping.
    pub fn flush(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.entries.clear();
        state.expirations.clear();
    }

    fn shutdown_sweeper(&self) {
        // The background task must be signaled to shut down. This is done by
        // setting `State::shutdown` to `true` and signalling the task.
        let mut state = self.shared.state.lock().unwrap();
        state.shutdown = true;

        // Drop the lock before signalling the background task. This helps
        // reduce lock contention by ensuring the background task doesn't
        // wake up only to be unable to acquire the mutex.
        drop(state);
        self.shared.background_task.notify_one();
    }
}

impl Default for Db {
    fn default() -> Db {
        Db::new()
    }
}

impl State {
    /// Insert or replace an entry, keeping the deadline set in step.
    fn store(&mut self, key: Bytes, value: Bytes, expires_at: Option<Instant>) {
        if let Some(prev) = self.entries.remove(&key) {
            if let Some(when) = prev.expires_at {
                self.expirations.remove(&(when, key.clone()));
            }
        }
        if let Some(when) = expires_at {
            self.expirations.insert((when, key.clone()));
        }
        self.entries.insert(
            key,
            Entry {
                data: value,
                expires_at,
            },
        );
    }

    /// Evict `key` when its deadline has passed. Returns `true` when an
    /// eviction took place.
    fn evict_if_expired(&mut self, key: &[u8], now: Instant) -> bool {
        if let Some(entry) = self.entries.get(key) {
            if let Some(when) = entry.expires_at {
                if when <= now {
                    let (key, _) = self.entries.remove_entry(key).unwrap();
                    self.expirations.remove(&(when, key));
                    REMOVED_EXPIRED_KEY_COUNTER
                        .with_label_values(&["lazy"])
                        .inc();
                    return true;
                }
            }
        }
        false
    }
}

impl Shared {
    fn is_shutdown(&self) -> bool {
        self.state.lock().unwrap().shutdown
    }

    /// Drain expired deadlines in bounded batches, releasing the lock
    /// between batches so request handlers are never starved behind a large
    /// backlog.
    fn sweep_batches(&self) {
        let batch = sweep_batch_size_or_default();
        loop {
            let mut state = self.state.lock().unwrap();
            if state.shutdown {
                return;
            }
            let now = Instant::now();
            let mut evicted = 0;
            while evicted < batch {
                // Deadlines are ordered, so the first pair decides whether
                // anything at all is expired.
                let expired = match state.expirations.iter().next() {
                    Some(&(when, ref key)) if when <= now => (when, key.clone()),
                    _ => break,
                };
                state.entries.remove(&expired.1[..]);
                state.expirations.remove(&expired);
                REMOVED_EXPIRED_KEY_COUNTER
                    .with_label_values(&["sweeper"])
                    .inc();
                evicted += 1;
            }
            if evicted < batch {
                return;
            }
            drop(state);
        }
    }
}

/// Routine executed by the background task.
///
/// Ticks at the configured sweep cadence and reclaims expired entries, so
/// workloads that never revisit their keys still release memory. Exits when
/// the owning `DbDropGuard` drops.
async fn sweep_expired_entries(shared: Arc<Shared>) {
    info!(LOGGER, "expiry sweeper started");
    let mut interval = time::interval(Duration::from_millis(sweep_interval_or_default()));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shared.background_task.notified() => {}
        }
        if shared.is_shutdown() {
            break;
        }
        shared.sweep_batches();
    }
    debug!(LOGGER, "expiry sweeper exit");
}

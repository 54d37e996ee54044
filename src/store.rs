//! Sharded W-TinyLFU store.
//!
//! # How It Works
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                                  Store                                   │
//! │                                                                          │
//! │  spread(hash) & (N-1) ──▶ shard                                          │
//! │                                                                          │
//! │  ┌─────────────┐ ┌─────────────┐     ┌─────────────┐                     │
//! │  │  Shard 0    │ │  Shard 1    │ ... │  Shard N-1  │   RwLock each       │
//! │  │ map, window │ │ map, window │     │ map, window │                     │
//! │  │ doorkeeper  │ │ doorkeeper  │     │ doorkeeper  │                     │
//! │  └──────┬──────┘ └──────┬──────┘     └──────┬──────┘                     │
//! │         │ get: read events (MPSC, drained every 64 reads)                │
//! │         │ set/delete: write events (bounded channel)                     │
//! │         ▼                                                                │
//! │  ┌────────────────────────────────────────────────────────────────────┐  │
//! │  │  Policy mutex: TinyLFU (sketch + segmented LRU), timer wheel        │  │
//! │  │  mutated only by the maintenance thread and read-buffer drains      │  │
//! │  └────────────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookups only take their shard's read lock and never change residency; an
//! entry past its deadline simply reads as a miss until the timer wheel sweeps
//! it. Writes change the shard map and window under the shard's write lock and
//! forward everything else to the single maintenance thread, which owns the
//! main cache and the timer wheel. Events are sent after the shard lock is
//! released; the maintenance thread re-checks each event against the map
//! (by item id) before acting on it.
//!
//! Removal notifications are delivered on the maintenance thread (or on the
//! writer's thread for entries that had already expired in the window), never
//! while a store lock is held.
//!
//! # Example
//!
//! ```
//! use core::num::NonZeroUsize;
//! use std::time::Duration;
//! use wtlfu_cache::config::StoreConfig;
//! use wtlfu_cache::Store;
//!
//! let config = StoreConfig::new(NonZeroUsize::new(1000).unwrap());
//! let store: Store<String, u32> = Store::init(config, None, None);
//!
//! // The doorkeeper turns a key away the first time it is offered.
//! assert!(!store.set("a".to_string(), 1, Duration::ZERO));
//! assert_eq!(store.get("a"), None);
//!
//! assert!(store.set("a".to_string(), 1, Duration::ZERO));
//! assert_eq!(store.get("a"), Some(1));
//!
//! store.delete("a");
//! assert_eq!(store.get("a"), None);
//! ```

use crate::arena::{Arena, Handle};
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::item::{Item, ItemId};
use crate::metrics::{CacheMetrics, Recorder, StoreMetrics};
use crate::mpsc::MpscQueue;
use crate::shard::{Overflow, Shard};
use crate::timerwheel::{Clock, TimerWheel};
use crate::tinylfu::TinyLfu;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[cfg(feature = "hashbrown")]
use hashbrown::{DefaultHashBuilder, HashMap};

#[cfg(not(feature = "hashbrown"))]
use std::collections::{hash_map::RandomState as DefaultHashBuilder, HashMap};

/// Buffered reads that trigger a synchronous drain into the policy.
const READ_BUFFER_SIZE: usize = 64;
/// Write events applied per policy-lock acquisition.
const MAX_WRITE_BATCH: usize = 256;

/// Why an entry left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    /// Deleted through [`Store::delete`].
    Removed,
    /// Dropped by the replacement policy to stay within capacity.
    Evicted,
    /// Its TTL ran out.
    Expired,
}

/// Callback invoked once for every entry that leaves the store.
///
/// Runs on the maintenance thread (or a writer thread), with no store lock
/// held. It must not block on writes to the same store: the maintenance thread
/// is the one draining them.
pub type RemovalListener<K, V> = Box<dyn Fn(K, V, RemovalReason) + Send + Sync + 'static>;

struct ReadEvent {
    hash: u64,
    id: Option<ItemId>,
}

enum WriteEvent<K, V> {
    /// An item pushed out of a window, offered to the main cache.
    New(Item<K>),
    /// The deadline of a resident entry was set or changed.
    Reschedule {
        key: K,
        hash: u64,
        id: ItemId,
        shard: usize,
    },
    /// An entry already taken out of its shard by `delete`.
    Remove { key: K, value: V, id: ItemId },
    /// Acknowledged once every earlier event has been applied.
    Sync(Sender<()>),
}

struct Notice<K, V> {
    key: K,
    value: V,
    reason: RemovalReason,
}

/// Everything the maintenance side owns, behind the policy mutex.
struct PolicyState<K> {
    items: Arena<Item<K>>,
    index: HashMap<ItemId, Handle>,
    policy: TinyLfu,
    wheel: TimerWheel,
    closed: bool,
}

impl<K> PolicyState<K> {
    /// Takes `h` out of the main cache, the wheel and the arena.
    fn unlink(&mut self, h: Handle) -> Option<Item<K>> {
        if !self.items.contains(h) {
            return None;
        }
        self.policy.remove(&mut self.items, h);
        self.wheel.deschedule(&mut self.items, h);
        let item = self.items.remove(h)?;
        self.index.remove(&item.id);
        Some(item)
    }

    fn forget(&mut self, id: ItemId) {
        if let Some(h) = self.index.get(&id).copied() {
            self.unlink(h);
        }
    }

    /// Files `h` under `expire`, or drops it from the wheel when there is no
    /// deadline. Wheel-only records are discarded once unscheduled.
    fn retime(&mut self, h: Handle, expire: i64) {
        self.items[h].expire = expire;
        if expire != 0 {
            self.wheel.schedule(&mut self.items, h);
        } else {
            self.wheel.deschedule(&mut self.items, h);
            if self.items[h].is_new() {
                self.unlink(h);
            }
        }
    }

    fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
        self.policy.clear();
        self.wheel.clear();
    }
}

struct Inner<K, V, S> {
    shards: Box<[RwLock<Shard<K, V, S>>]>,
    hash_builder: S,
    clock: Clock,
    policy: Mutex<PolicyState<K>>,
    reads: MpscQueue<ReadEvent>,
    read_count: AtomicUsize,
    writes: Sender<WriteEvent<K, V>>,
    listener: Option<RemovalListener<K, V>>,
    recorder: Recorder,
    capacity: usize,
    closed: AtomicBool,
}

/// Spreads the key hash before picking a shard, so the shard index does not
/// reuse the bits the doorkeeper and sketch see directly.
#[inline]
fn spread(hash: u64) -> u64 {
    let h = ((hash >> 16) ^ hash).wrapping_mul(0x45d9f3b);
    let h = ((h >> 16) ^ h).wrapping_mul(0x45d9f3b);
    (h >> 16) ^ h
}

impl<K, V, S> Inner<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    #[inline]
    fn locate<Q>(&self, key: &Q) -> (u64, usize)
    where
        Q: ?Sized + Hash,
    {
        let hash = self.hash_builder.hash_one(key);
        let index = (spread(hash) as usize) & (self.shards.len() - 1);
        (hash, index)
    }

    fn send(&self, event: WriteEvent<K, V>) {
        if self.writes.send(event).is_err() {
            tracing::warn!("maintenance thread is gone; write event dropped");
        }
    }

    fn record_read(&self, hash: u64, id: Option<ItemId>) {
        self.reads.push(ReadEvent { hash, id });
        if self.read_count.fetch_add(1, Ordering::Relaxed) + 1 >= READ_BUFFER_SIZE {
            self.drain_reads();
        }
    }

    /// Replays every buffered read into the policy.
    fn drain_reads(&self) {
        let mut state = self.policy.lock();
        self.read_count.store(0, Ordering::Relaxed);
        let PolicyState {
            items,
            index,
            policy,
            closed,
            ..
        } = &mut *state;
        let mut replayed = 0usize;
        while let Some(event) = self.reads.pop() {
            if *closed {
                continue;
            }
            let resident = event.id.and_then(|id| index.get(&id).copied());
            if policy.access(items, event.hash, resident) {
                tracing::trace!("frequency sketch halved");
            }
            replayed += 1;
        }
        drop(state);
        self.recorder.record_read_drain();
        tracing::trace!(events = replayed, "read buffer drained");
    }

    /// Applies `first` and whatever else is already queued, then delivers the
    /// resulting notifications outside the lock.
    fn apply(&self, first: WriteEvent<K, V>, writes: &Receiver<WriteEvent<K, V>>) {
        let mut notices = Vec::new();
        let mut synced = Vec::new();
        {
            let mut state = self.policy.lock();
            let mut next = Some(first);
            let mut applied = 0;
            while let Some(event) = next.take() {
                match event {
                    WriteEvent::New(item) => self.admit(&mut state, item, &mut notices),
                    WriteEvent::Reschedule {
                        key,
                        hash,
                        id,
                        shard,
                    } => self.reschedule(&mut state, key, hash, id, shard),
                    WriteEvent::Remove { key, value, id } => {
                        state.forget(id);
                        notices.push(Notice {
                            key,
                            value,
                            reason: RemovalReason::Removed,
                        });
                    }
                    WriteEvent::Sync(done) => synced.push(done),
                }
                applied += 1;
                if applied < MAX_WRITE_BATCH {
                    next = writes.try_recv().ok();
                }
            }
        }
        self.notify(notices);
        for done in synced {
            let _ = done.send(());
        }
    }

    /// Offers a window-evicted item to the main cache and evicts whatever has
    /// to make room.
    fn admit(&self, state: &mut PolicyState<K>, item: Item<K>, notices: &mut Vec<Notice<K, V>>) {
        let Some(expire) = self.shards[item.shard]
            .read()
            .current_expire(&item.key, item.id)
        else {
            state.forget(item.id);
            return;
        };

        // A deadline may already have registered a wheel-only record.
        let h = match state.index.get(&item.id) {
            Some(&h) => h,
            None => {
                let id = item.id;
                let h = state.items.insert(item);
                state.index.insert(id, h);
                h
            }
        };
        state.items[h].expire = expire;
        if expire != 0 {
            state.wheel.schedule(&mut state.items, h);
        }

        let PolicyState { items, policy, .. } = &mut *state;
        let mut victims: Vec<Handle> = policy.set(items, h).into_iter().collect();
        victims.extend(policy.evict_entries(items));
        if victims.len() > 1 {
            tracing::trace!(victims = victims.len(), "main cache eviction sweep");
        }
        for victim in victims {
            self.evict(state, victim, notices);
        }
    }

    fn evict(&self, state: &mut PolicyState<K>, h: Handle, notices: &mut Vec<Notice<K, V>>) {
        let Some(item) = state.unlink(h) else {
            return;
        };
        let removed = self.shards[item.shard]
            .write()
            .remove_current(&item.key, item.id);
        if let Some((key, value)) = removed {
            self.recorder.record_eviction();
            notices.push(Notice {
                key,
                value,
                reason: RemovalReason::Evicted,
            });
        }
    }

    fn reschedule(&self, state: &mut PolicyState<K>, key: K, hash: u64, id: ItemId, shard: usize) {
        let Some(expire) = self.shards[shard].read().current_expire(&key, id) else {
            return;
        };
        match state.index.get(&id).copied() {
            Some(h) => state.retime(h, expire),
            None if expire != 0 => {
                let h = state.items.insert(Item::new(key, hash, id, expire, shard));
                state.index.insert(id, h);
                state.wheel.schedule(&mut state.items, h);
            }
            None => {}
        }
    }

    /// Advances the timer wheel and drops every entry whose deadline passed.
    fn advance(&self) {
        let mut notices = Vec::new();
        {
            let mut state = self.policy.lock();
            if state.closed {
                return;
            }
            let PolicyState { items, wheel, .. } = &mut *state;
            let due = wheel.advance(items, 0);
            let now = wheel.nanos();
            for h in due {
                self.expire(&mut state, h, now, &mut notices);
            }
        }
        if !notices.is_empty() {
            tracing::trace!(expired = notices.len(), "timer wheel advanced");
        }
        self.notify(notices);
    }

    fn expire(&self, state: &mut PolicyState<K>, h: Handle, now: i64, notices: &mut Vec<Notice<K, V>>) {
        let item = &state.items[h];
        let outcome = self.shards[item.shard]
            .write()
            .take_expired(&item.key, item.id, now);
        match outcome {
            Ok((key, value)) => {
                state.unlink(h);
                self.recorder.record_expiration();
                notices.push(Notice {
                    key,
                    value,
                    reason: RemovalReason::Expired,
                });
            }
            // The deadline moved after this wheel slot was filled.
            Err(Some(expire)) => state.retime(h, expire),
            Err(None) => {
                state.unlink(h);
            }
        }
    }

    fn notify(&self, notices: Vec<Notice<K, V>>) {
        let Some(listener) = &self.listener else {
            return;
        };
        for notice in notices {
            listener(notice.key, notice.value, notice.reason);
        }
    }
}

fn maintenance<K, V, S>(
    inner: Arc<Inner<K, V, S>>,
    writes: Receiver<WriteEvent<K, V>>,
    shutdown: Receiver<()>,
    interval: Duration,
) where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    let ticker = tick(interval);
    loop {
        select! {
            recv(writes) -> event => match event {
                Ok(event) => inner.apply(event, &writes),
                Err(_) => break,
            },
            recv(ticker) -> _ => inner.advance(),
            recv(shutdown) -> _ => break,
        }
    }
    while let Ok(event) = writes.try_recv() {
        inner.apply(event, &writes);
    }
    tracing::debug!("maintenance thread exiting");
}

struct Worker {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

/// A concurrent, bounded W-TinyLFU cache with optional per-entry TTL.
///
/// New keys must be offered twice before they are cached (the first [`set`]
/// only records them in the shard's doorkeeper). Admitted keys start in a
/// small per-shard window; when the window overflows, the oldest entry competes
/// with the main cache's victim on estimated access frequency.
///
/// # Type Parameters
///
/// - `K`: Key type. Must implement `Hash + Eq + Clone + Send + Sync`.
/// - `V`: Value type. Must implement `Send + Sync`; [`get`] also needs `Clone`.
/// - `S`: Hash builder type. Defaults to `DefaultHashBuilder`.
///
/// # Thread Safety
///
/// `Store` is `Send + Sync` and can be shared via `Arc`.
///
/// [`set`]: Store::set
/// [`get`]: Store::get
pub struct Store<K, V, S = DefaultHashBuilder> {
    inner: Arc<Inner<K, V, S>>,
    worker: Mutex<Option<Worker>>,
}

impl<K, V, S> Store<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: BuildHasher + Clone + Default + Send + Sync + 'static,
{
    /// Creates a store and starts its maintenance thread.
    ///
    /// # Arguments
    ///
    /// * `config` - Capacity and sizing
    /// * `hasher` - Optional hash builder. If `None`, uses `S::default()`
    /// * `listener` - Optional callback for every entry that leaves the store
    ///
    /// # Panics
    ///
    /// Panics if the maintenance thread cannot be spawned. Use
    /// [`try_init`](Self::try_init) to handle that case.
    pub fn init(
        config: StoreConfig,
        hasher: Option<S>,
        listener: Option<RemovalListener<K, V>>,
    ) -> Self {
        match Self::try_init(config, hasher, listener) {
            Ok(store) => store,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible variant of [`init`](Self::init).
    pub fn try_init(
        config: StoreConfig,
        hasher: Option<S>,
        listener: Option<RemovalListener<K, V>>,
    ) -> StoreResult<Self> {
        let hash_builder = hasher.unwrap_or_default();
        let shard_count = config.shards();
        let shard_cap = config.shard_capacity();
        let window = config.window_per_shard();
        let main = config.main_capacity();

        let shards: Vec<_> = (0..shard_count)
            .map(|index| RwLock::new(Shard::new(index, shard_cap, window, hash_builder.clone())))
            .collect();

        let clock = Clock::new();
        let state = PolicyState {
            items: Arena::with_capacity(main),
            index: HashMap::default(),
            policy: TinyLfu::new(main),
            wheel: TimerWheel::new(clock),
            closed: false,
        };

        let (writes, write_rx) = bounded(config.write_buffer());
        let (shutdown, shutdown_rx) = bounded(0);
        let inner = Arc::new(Inner {
            shards: shards.into_boxed_slice(),
            hash_builder,
            clock,
            policy: Mutex::new(state),
            reads: MpscQueue::new(),
            read_count: AtomicUsize::new(0),
            writes,
            listener,
            recorder: Recorder::default(),
            capacity: config.capacity().get(),
            closed: AtomicBool::new(false),
        });

        let interval = config.maintenance_interval();
        let worker_inner = Arc::clone(&inner);
        let handle = thread::Builder::new()
            .name("wtlfu-maintenance".into())
            .spawn(move || maintenance(worker_inner, write_rx, shutdown_rx, interval))?;

        tracing::debug!(
            shards = shard_count,
            window_per_shard = window,
            main_capacity = main,
            write_buffer = config.write_buffer(),
            "store started"
        );

        Ok(Store {
            inner,
            worker: Mutex::new(Some(Worker { shutdown, handle })),
        })
    }
}

impl<K, V, S> Store<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    /// Total capacity the store was configured with.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.inner.shards.len()
    }

    /// Number of resident entries, including any that have expired but not
    /// been swept yet.
    ///
    /// Locks each shard in turn, so the value may be stale under concurrency.
    pub fn len(&self) -> usize {
        self.inner.shards.iter().map(|s| s.read().len()).sum()
    }

    /// Returns `true` if no entry is resident.
    pub fn is_empty(&self) -> bool {
        self.inner.shards.iter().all(|s| s.read().len() == 0)
    }

    /// Looks up `key` and applies `f` to its value under the shard's read lock.
    ///
    /// Counts as an access for the replacement policy, hit or miss.
    pub fn get_with<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&V) -> R,
    {
        let inner = &*self.inner;
        let (hash, index) = inner.locate(key);
        let now = inner.clock.now_nanos();
        let found = {
            let shard = inner.shards[index].read();
            shard
                .get(key)
                .filter(|resident| !resident.expired_at(now))
                .map(|resident| (f(&resident.value), resident.id))
        };
        let (result, id) = match found {
            Some((result, id)) => {
                inner.recorder.record_hit();
                (Some(result), Some(id))
            }
            None => {
                inner.recorder.record_miss();
                (None, None)
            }
        };
        inner.record_read(hash, id);
        result
    }

    /// Returns a clone of the value for `key`, or `None` if it is absent or
    /// past its deadline.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.get_with(key, V::clone)
    }

    /// Returns `true` if `key` is resident and live. Not counted as an access.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_, index) = self.inner.locate(key);
        let now = self.inner.clock.now_nanos();
        self.inner.shards[index]
            .read()
            .get(key)
            .is_some_and(|resident| !resident.expired_at(now))
    }

    /// Inserts or updates `key`. A zero `ttl` means the entry never expires.
    ///
    /// Updating a resident key always applies the new `ttl`: a zero `ttl`
    /// clears an existing deadline instead of keeping it.
    ///
    /// Returns `false` when the key was not cached: on its first sighting the
    /// doorkeeper only records it, and a closed store accepts nothing. Updates
    /// to resident keys always succeed.
    ///
    /// May block while the write-event buffer is full.
    pub fn set(&self, key: K, value: V, ttl: Duration) -> bool {
        let inner = &*self.inner;
        if inner.closed.load(Ordering::Acquire) {
            return false;
        }
        inner.recorder.record_set();
        let (hash, index) = inner.locate(&key);
        let expire = inner.clock.expire_nanos(ttl);

        let mut shard = inner.shards[index].write();
        // `close` may have cleared this shard since the check above.
        if inner.closed.load(Ordering::Acquire) {
            return false;
        }
        let replaced = shard.replace(&key, value, expire);
        let value = match replaced {
            Ok(replaced) => {
                drop(shard);
                inner.recorder.record_update();
                if replaced.expire_changed {
                    inner.send(WriteEvent::Reschedule {
                        key,
                        hash,
                        id: replaced.id,
                        shard: index,
                    });
                }
                return true;
            }
            Err(value) => value,
        };
        if !shard.doorkeeper_admits(hash) {
            inner.recorder.record_rejection();
            return false;
        }
        let now = inner.clock.now_nanos();
        let (id, overflow) = shard.insert(key.clone(), hash, value, expire, now);
        drop(shard);
        inner.recorder.record_admission();

        if expire != 0 {
            inner.send(WriteEvent::Reschedule {
                key,
                hash,
                id,
                shard: index,
            });
        }
        match overflow {
            Some(Overflow::Promote(item)) => inner.send(WriteEvent::New(item)),
            Some(Overflow::Expired(key, value)) => {
                inner.recorder.record_expiration();
                inner.notify(vec![Notice {
                    key,
                    value,
                    reason: RemovalReason::Expired,
                }]);
            }
            None => {}
        }
        true
    }

    /// Removes `key` if present. The listener hears about it with
    /// [`RemovalReason::Removed`].
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_, index) = self.inner.locate(key);
        let removed = self.inner.shards[index].write().remove(key);
        if let Some((key, resident)) = removed {
            self.inner.recorder.record_removal();
            self.inner.send(WriteEvent::Remove {
                key,
                value: resident.value,
                id: resident.id,
            });
        }
    }

    /// Blocks until every write issued before the call has been applied and
    /// its notifications delivered, then replays buffered reads.
    pub fn flush(&self) {
        let (done, wait) = bounded(1);
        if self.inner.writes.send(WriteEvent::Sync(done)).is_ok() {
            let _ = wait.recv();
        }
        self.inner.drain_reads();
    }

    /// Snapshot of the store's counters.
    pub fn metrics(&self) -> StoreMetrics {
        self.inner.recorder.snapshot(self.len(), self.inner.capacity)
    }

    /// Stops the maintenance thread and drops every entry.
    ///
    /// Writes still queued are applied first, so their notifications are
    /// delivered. Later `set` calls return `false`; cleared entries are not
    /// reported to the listener. Calling `close` again is a no-op.
    pub fn close(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        self.inner.closed.store(true, Ordering::Release);
        drop(worker.shutdown);
        if worker.handle.join().is_err() {
            tracing::warn!("maintenance thread panicked");
        }

        for shard in self.inner.shards.iter() {
            shard.write().clear();
        }
        let mut state = self.inner.policy.lock();
        state.clear();
        state.closed = true;
        while self.inner.reads.pop().is_some() {}
        drop(state);
        tracing::debug!("store closed");
    }
}

impl<K, V, S> CacheMetrics for Store<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    fn metrics(&self) -> BTreeMap<String, f64> {
        Store::metrics(self).metrics()
    }

    fn algorithm_name(&self) -> &'static str {
        "W-TinyLFU"
    }
}

impl<K, V, S> Drop for Store<K, V, S> {
    fn drop(&mut self) {
        let Some(worker) = self.worker.get_mut().take() else {
            return;
        };
        self.inner.closed.store(true, Ordering::Release);
        drop(worker.shutdown);
        let _ = worker.handle.join();
    }
}

impl<K, V, S> fmt::Debug for Store<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("capacity", &self.inner.capacity)
            .field("shards", &self.inner.shards.len())
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::num::NonZeroUsize;

    fn store(capacity: usize, shards: usize) -> Store<u64, u64> {
        let config = StoreConfig::new(NonZeroUsize::new(capacity).unwrap()).with_shards(shards);
        Store::init(config, None, None)
    }

    /// Offers `key` twice so it gets past the doorkeeper.
    fn admit(store: &Store<u64, u64>, key: u64, value: u64) {
        store.set(key, value, Duration::ZERO);
        store.set(key, value, Duration::ZERO);
    }

    #[test]
    fn test_spread_uses_every_shard() {
        let mut counts = [0usize; 8];
        for hash in 0..1024u64 {
            counts[(spread(hash) as usize) & 7] += 1;
        }
        assert!(counts.iter().all(|&c| c > 0), "{counts:?}");
    }

    #[test]
    fn test_update_keeps_entry_resident() {
        let store = store(1000, 2);
        admit(&store, 1, 10);
        assert!(store.set(1, 11, Duration::ZERO));
        assert_eq!(store.get(&1), Some(11));
        assert_eq!(store.len(), 1);
        assert_eq!(store.metrics().updates, 1);
    }

    #[test]
    fn test_window_overflow_reaches_main_cache() {
        let store = store(1000, 1);
        for key in 0..50 {
            admit(&store, key, key);
        }
        store.flush();
        // 10 window slots, 990 main slots: nothing had to go.
        assert_eq!(store.len(), 50);
        let state = store.inner.policy.lock();
        assert_eq!(state.policy.len() + store.inner.shards[0].read().window_len(), 50);
    }

    #[test]
    fn test_get_with_counts_hits_and_misses() {
        let store = store(1000, 2);
        admit(&store, 7, 70);
        assert_eq!(store.get_with(&7, |v| v * 2), Some(140));
        assert_eq!(store.get_with(&8, |v| v * 2), None);
        let metrics = store.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses(), 1);
    }

    #[test]
    fn test_read_buffer_drains_at_threshold() {
        let store = store(1000, 1);
        for _ in 0..READ_BUFFER_SIZE {
            store.get(&1);
        }
        assert_eq!(store.metrics().read_drains, 1);
        assert_eq!(store.inner.read_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_expired_window_entry_is_reported_once() {
        let expired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&expired);
        // Window of 1; the ticker never fires, so the wheel only moves below.
        let config = StoreConfig::new(NonZeroUsize::new(100).unwrap())
            .with_shards(1)
            .with_maintenance_interval(Duration::from_secs(3600));
        let store: Store<u64, u64> = Store::init(
            config,
            None,
            Some(Box::new(move |key, _value, reason| {
                assert_eq!((key, reason), (1, RemovalReason::Expired));
                counter.fetch_add(1, Ordering::Relaxed);
            })),
        );

        store.set(1, 1, Duration::from_millis(20));
        assert!(store.set(1, 1, Duration::from_millis(20)));
        store.flush();
        assert_eq!(store.inner.policy.lock().index.len(), 1);

        std::thread::sleep(Duration::from_millis(50));
        admit(&store, 2, 2);
        assert_eq!(expired.load(Ordering::Relaxed), 1);
        assert!(!store.contains(&1));

        // Past the first level-0 tick, so the sweep visits the record's bucket.
        std::thread::sleep(Duration::from_millis(1200));
        store.inner.advance();
        store.flush();
        assert_eq!(expired.load(Ordering::Relaxed), 1);
        assert!(store.inner.policy.lock().index.is_empty());
        assert_eq!(store.metrics().expirations, 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let store = store(1000, 2);
        admit(&store, 1, 1);
        store.close();
        store.close();
        assert!(store.is_empty());
        assert!(!store.set(2, 2, Duration::ZERO));
    }
}

//! Store Metrics System
//!
//! Counters are recorded with relaxed atomics from every thread that touches
//! the store and read back as a [`StoreMetrics`] snapshot. The snapshot reports
//! through the [`CacheMetrics`] trait as a `BTreeMap`, so keys always come out
//! in the same order.

use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;

/// Uniform metrics reporting interface.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs, sorted by key.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Short name of the replacement algorithm (e.g. `"W-TinyLFU"`).
    fn algorithm_name(&self) -> &'static str;
}

/// Point-in-time copy of a store's counters.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StoreMetrics {
    /// Lookups through `get` / `get_with`.
    pub requests: u64,
    /// Lookups that found a live entry.
    pub hits: u64,
    /// Calls to `set`.
    pub sets: u64,
    /// New keys that passed the doorkeeper and became resident.
    pub admissions: u64,
    /// New keys turned away on first sight by the doorkeeper.
    pub rejections: u64,
    /// `set` calls that replaced the value of a resident key.
    pub updates: u64,
    /// Entries dropped by the replacement policy.
    pub evictions: u64,
    /// Entries dropped because their TTL ran out.
    pub expirations: u64,
    /// Entries dropped through `delete`.
    pub removals: u64,
    /// Read-buffer drains replayed into the policy.
    pub read_drains: u64,
    /// Resident entries when the snapshot was taken.
    pub len: u64,
    /// Configured capacity.
    pub capacity: u64,
}

impl StoreMetrics {
    /// Lookups that found nothing (or only an expired entry).
    pub fn misses(&self) -> u64 {
        self.requests.saturating_sub(self.hits)
    }

    /// Fraction of lookups that hit, or 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        if self.requests > 0 {
            self.hits as f64 / self.requests as f64
        } else {
            0.0
        }
    }

    /// Resident entries relative to capacity.
    pub fn utilization(&self) -> f64 {
        if self.capacity > 0 {
            self.len as f64 / self.capacity as f64
        } else {
            0.0
        }
    }
}

impl CacheMetrics for StoreMetrics {
    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("admissions".to_string(), self.admissions as f64);
        metrics.insert("cache_hits".to_string(), self.hits as f64);
        metrics.insert("cache_misses".to_string(), self.misses() as f64);
        metrics.insert("capacity".to_string(), self.capacity as f64);
        metrics.insert("doorkeeper_rejections".to_string(), self.rejections as f64);
        metrics.insert("evictions".to_string(), self.evictions as f64);
        metrics.insert("expirations".to_string(), self.expirations as f64);
        metrics.insert("hit_rate".to_string(), self.hit_rate());
        metrics.insert("len".to_string(), self.len as f64);
        metrics.insert("read_drains".to_string(), self.read_drains as f64);
        metrics.insert("removals".to_string(), self.removals as f64);
        metrics.insert("requests".to_string(), self.requests as f64);
        metrics.insert("sets".to_string(), self.sets as f64);
        metrics.insert("updates".to_string(), self.updates as f64);
        metrics.insert("utilization".to_string(), self.utilization());
        metrics
    }

    fn algorithm_name(&self) -> &'static str {
        "W-TinyLFU"
    }
}

/// Shared atomic counters behind [`StoreMetrics`].
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    admissions: AtomicU64,
    rejections: AtomicU64,
    updates: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    removals: AtomicU64,
    read_drains: AtomicU64,
}

#[inline]
fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Recorder {
    pub(crate) fn record_hit(&self) {
        bump(&self.hits);
    }

    pub(crate) fn record_miss(&self) {
        bump(&self.misses);
    }

    pub(crate) fn record_set(&self) {
        bump(&self.sets);
    }

    pub(crate) fn record_admission(&self) {
        bump(&self.admissions);
    }

    pub(crate) fn record_rejection(&self) {
        bump(&self.rejections);
    }

    pub(crate) fn record_update(&self) {
        bump(&self.updates);
    }

    pub(crate) fn record_eviction(&self) {
        bump(&self.evictions);
    }

    pub(crate) fn record_expiration(&self) {
        bump(&self.expirations);
    }

    pub(crate) fn record_removal(&self) {
        bump(&self.removals);
    }

    pub(crate) fn record_read_drain(&self) {
        bump(&self.read_drains);
    }

    pub(crate) fn snapshot(&self, len: usize, capacity: usize) -> StoreMetrics {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        // Requests are derived so a snapshot never shows more hits than lookups.
        let hits = load(&self.hits);
        StoreMetrics {
            requests: hits + load(&self.misses),
            hits,
            sets: load(&self.sets),
            admissions: load(&self.admissions),
            rejections: load(&self.rejections),
            updates: load(&self.updates),
            evictions: load(&self.evictions),
            expirations: load(&self.expirations),
            removals: load(&self.removals),
            read_drains: load(&self.read_drains),
            len: len as u64,
            capacity: capacity as u64,
        }
    }
}

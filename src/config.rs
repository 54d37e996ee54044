//! Store Configuration Module
//!
//! [`StoreConfig`] is the single entry point for sizing a [`Store`](crate::Store).
//! The only required parameter is the total capacity; everything else has a
//! default derived from it or from the host.
//!
//! # Sizing
//!
//! ```text
//! capacity ─┬─▶ shards       next power of two ≥ available parallelism,
//!           │                 at most the largest power of two ≤ capacity / 2
//!           ├─▶ window       max(1, capacity / 100 / shards)   per shard
//!           ├─▶ main         max(1, capacity − window × shards) TinyLFU
//!           ├─▶ doorkeeper   20 × (capacity / shards) keys at 1% FPR
//!           └─▶ write buffer clamp(capacity / 100, 4, 1024) events
//! ```
//!
//! # Examples
//!
//! ```
//! use core::num::NonZeroUsize;
//! use std::time::Duration;
//! use wtlfu_cache::config::StoreConfig;
//!
//! let config = StoreConfig::new(NonZeroUsize::new(10_000).unwrap())
//!     .with_shards(8)
//!     .with_maintenance_interval(Duration::from_millis(100));
//! assert_eq!(config.shards(), 8);
//! assert_eq!(config.window_per_shard(), 12);
//! assert_eq!(config.main_capacity(), 10_000 - 12 * 8);
//! assert_eq!(config.write_buffer(), 100);
//! ```

use core::fmt;
use core::num::NonZeroUsize;
use std::time::Duration;

/// Smallest write-event channel capacity.
pub const MIN_WRITE_BUFFER: usize = 4;
/// Largest write-event channel capacity.
pub const MAX_WRITE_BUFFER: usize = 1024;
/// Smallest capacity a store is sized for: one window slot plus one main slot.
pub const MIN_CAPACITY: usize = 2;
/// Default period between two timer-wheel advances.
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_millis(500);

/// Returns the default number of shards based on available parallelism.
fn default_shard_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .next_power_of_two()
}

/// Configuration for a [`Store`](crate::Store).
///
/// # Required Parameters
///
/// - `capacity`: total number of resident entries across all shards, raised
///   to [`MIN_CAPACITY`]
///
/// # Optional Parameters (Builder Methods)
///
/// - `shards`: number of independently locked shards (default: next power of
///   two ≥ CPU count)
/// - `write_buffer`: capacity of the write-event channel (default:
///   `capacity / 100`, always clamped into `[4, 1024]`)
/// - `maintenance_interval`: how often the timer wheel advances (default: 500ms)
#[derive(Clone, Copy)]
pub struct StoreConfig {
    capacity: NonZeroUsize,
    shards: usize,
    write_buffer: usize,
    maintenance_interval: Duration,
}

impl StoreConfig {
    /// Creates a configuration for `capacity` entries with default settings.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.max(NonZeroUsize::MIN.saturating_add(MIN_CAPACITY - 1));
        Self {
            capacity,
            shards: default_shard_count(),
            write_buffer: capacity.get() / 100,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
        }
    }

    /// Sets the shard count, rounded up to a power of two.
    ///
    /// # Panics
    ///
    /// Panics if `shards` is 0.
    #[must_use]
    pub fn with_shards(mut self, shards: usize) -> Self {
        assert!(shards > 0, "shards must be > 0");
        self.shards = shards.next_power_of_two();
        self
    }

    /// Sets the write-event channel capacity. Values outside `[4, 1024]` are
    /// clamped.
    #[must_use]
    pub fn with_write_buffer(mut self, events: usize) -> Self {
        self.write_buffer = events;
        self
    }

    /// Sets the period between two timer-wheel advances.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    #[must_use]
    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "maintenance interval must be > 0");
        self.maintenance_interval = interval;
        self
    }

    /// Total number of resident entries.
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Number of shards (always a power of two).
    ///
    /// Never more than half the capacity, so every shard's window slot leaves
    /// room for the main cache within the total.
    pub fn shards(&self) -> usize {
        let limit = 1usize << (self.capacity.get() / 2).max(1).ilog2();
        self.shards.min(limit)
    }

    /// Write-event channel capacity after clamping.
    pub fn write_buffer(&self) -> usize {
        self.write_buffer.clamp(MIN_WRITE_BUFFER, MAX_WRITE_BUFFER)
    }

    /// Period between two timer-wheel advances.
    pub fn maintenance_interval(&self) -> Duration {
        self.maintenance_interval
    }

    /// Per-shard capacity used to size each doorkeeper; tiny shards are
    /// raised to 100.
    pub fn shard_capacity(&self) -> usize {
        let per_shard = self.capacity.get() / self.shards();
        if per_shard < 50 {
            100
        } else {
            per_shard
        }
    }

    /// Admission window capacity of each shard.
    pub fn window_per_shard(&self) -> usize {
        (self.capacity.get() / 100 / self.shards()).max(1)
    }

    /// Capacity of the shared TinyLFU main cache.
    pub fn main_capacity(&self) -> usize {
        self.capacity
            .get()
            .saturating_sub(self.window_per_shard() * self.shards())
            .max(1)
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("capacity", &self.capacity)
            .field("shards", &self.shards())
            .field("write_buffer", &self.write_buffer())
            .field("maintenance_interval", &self.maintenance_interval)
            .finish()
    }
}

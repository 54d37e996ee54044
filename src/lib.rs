#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Entry Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                         Life of a key in the Store                           │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                                                                              │
//! │  set #1 ──▶ doorkeeper records hash ──▶ rejected (set returns false)         │
//! │                                                                              │
//! │  set #2 ──▶ doorkeeper has seen it ──▶ shard map + window (front)            │
//! │                                              │                               │
//! │                                  window full │ oldest leaves                 │
//! │                                              ▼                               │
//! │                    ┌─────────────────────────────────────────┐               │
//! │                    │ TinyLFU: estimate(candidate) >          │               │
//! │                    │          estimate(probation victim) ?   │               │
//! │                    └───────────────┬──────────────┬──────────┘               │
//! │                                 yes│              │no                        │
//! │                                    ▼              ▼                          │
//! │                             probation ──▶    candidate evicted               │
//! │                             (read) ──▶ protection                            │
//! │                                                                              │
//! │  ttl > 0 ──▶ timer wheel bucket ──▶ expired on the next sweep past deadline  │
//! │                                                                              │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Reference
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Store`] | Concurrent sharded W-TinyLFU cache with TTL |
//! | [`StoreConfig`] | Capacity, shard count, write buffer, maintenance period |
//! | [`StoreMetrics`] | Counter snapshot (hits, admissions, evictions, ...) |
//! | [`BloomDoorkeeper`] | Bloom filter used as the first-sighting admission gate |
//! | [`CountMinSketch`] | 4-bit count-min frequency estimator with periodic halving |
//! | [`MpscQueue`] | Lock-free multi-producer queue behind the read buffer |
//!
//! ## Code Examples
//!
//! ### Basic usage
//!
//! ```rust
//! use wtlfu_cache::{Store, StoreConfig};
//! use core::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! let store: Store<&str, u64> = Store::init(
//!     StoreConfig::new(NonZeroUsize::new(10_000).unwrap()),
//!     None,
//!     None,
//! );
//!
//! store.set("answer", 42, Duration::ZERO); // first sighting: recorded only
//! store.set("answer", 42, Duration::ZERO); // admitted
//! assert_eq!(store.get("answer"), Some(42));
//! ```
//!
//! ### Removal listener
//!
//! ```rust
//! use wtlfu_cache::{RemovalReason, Store, StoreConfig};
//! use core::num::NonZeroUsize;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let removed = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&removed);
//! let store: Store<u32, u32> = Store::init(
//!     StoreConfig::new(NonZeroUsize::new(1000).unwrap()),
//!     None,
//!     Some(Box::new(move |_key, _value, reason: RemovalReason| {
//!         if reason == RemovalReason::Removed {
//!             counter.fetch_add(1, Ordering::Relaxed);
//!         }
//!     })),
//! );
//!
//! store.set(1, 1, Duration::ZERO);
//! store.set(1, 1, Duration::ZERO);
//! store.delete(&1);
//! store.flush();
//! assert_eq!(removed.load(Ordering::Relaxed), 1);
//! ```
//!
//! ### Metrics
//!
//! ```rust
//! use wtlfu_cache::{CacheMetrics, Store, StoreConfig};
//! use core::num::NonZeroUsize;
//!
//! let store: Store<u32, u32> =
//!     Store::init(StoreConfig::new(NonZeroUsize::new(100).unwrap()), None, None);
//! store.get(&7);
//!
//! let metrics = store.metrics();
//! assert_eq!(metrics.requests, 1);
//! assert_eq!(metrics.misses(), 1);
//! assert_eq!(CacheMetrics::algorithm_name(&store), "W-TinyLFU");
//! ```
//!
//! ## Modules
//!
//! - [`bloom`]: doorkeeper Bloom filter
//! - [`sketch`]: count-min frequency sketch
//! - [`mpsc`]: intrusive MPSC queue
//! - [`config`]: store configuration
//! - [`metrics`]: metrics snapshot and reporting trait
//! - [`error`]: error type for store construction

/// Generation-checked slot arena addressing every list member.
pub(crate) mod arena;

/// Per-key metadata shared by the recency lists and the timer wheel.
pub(crate) mod item;

/// Intrusive doubly linked list over arena handles.
///
/// **Note**: This module is internal infrastructure. Lists never own their
/// members; the arena does, and every operation takes it explicitly.
pub(crate) mod list;

/// Admission window LRU.
pub(crate) mod lru;

/// Segmented LRU (probation + protection) main cache.
pub(crate) mod slru;

/// TinyLFU admission policy over the segmented LRU.
pub(crate) mod tinylfu;

/// Hierarchical timer wheel driving TTL expiration.
pub(crate) mod timerwheel;

/// Keyspace slice: resident map, window and doorkeeper.
pub(crate) mod shard;

mod store;

/// Bloom filter doorkeeper.
///
/// Gates admission to the window: a key must be seen once before it is cached.
pub mod bloom;

/// Count-min sketch with 4-bit counters.
///
/// Estimates access frequency for the admission comparison and halves every
/// counter periodically so old popularity fades.
pub mod sketch;

/// Intrusive multi-producer single-consumer queue.
///
/// Backs the read buffer: lookups push without taking any lock.
pub mod mpsc;

/// Store configuration.
pub mod config;

/// Store metrics system.
///
/// Provides the [`CacheMetrics`] reporting interface and the [`StoreMetrics`]
/// snapshot.
pub mod metrics;

/// Store error types.
pub mod error;

pub use bloom::BloomDoorkeeper;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use metrics::{CacheMetrics, StoreMetrics};
pub use mpsc::MpscQueue;
pub use sketch::CountMinSketch;
pub use store::{RemovalListener, RemovalReason, Store};

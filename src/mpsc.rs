//! Unbounded lock-free multi-producer, single-consumer queue.
//!
//! A thin wrapper over [`crossbeam_queue::SegQueue`]. Pushing never blocks and
//! never fails, and values pushed by one producer come out in the order they
//! went in.
//!
//! The store records buffered read events here from every reader thread and
//! drains them while holding its policy mutex, which makes it the sole consumer.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use wtlfu_cache::mpsc::MpscQueue;
//!
//! let queue = Arc::new(MpscQueue::new());
//! let producers: Vec<_> = (0..4)
//!     .map(|t| {
//!         let queue = Arc::clone(&queue);
//!         thread::spawn(move || {
//!             for i in 0..100 {
//!                 queue.push(t * 100 + i);
//!             }
//!         })
//!     })
//!     .collect();
//! for p in producers {
//!     p.join().unwrap();
//! }
//!
//! let mut seen = 0;
//! while queue.pop().is_some() {
//!     seen += 1;
//! }
//! assert_eq!(seen, 400);
//! ```

use core::fmt;
use crossbeam_queue::SegQueue;

/// Multi-producer, single-consumer FIFO queue.
pub struct MpscQueue<T> {
    items: SegQueue<T>,
}

impl<T> MpscQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        MpscQueue {
            items: SegQueue::new(),
        }
    }

    /// Appends `value`. Callable from any number of threads at once.
    pub fn push(&self, value: T) {
        self.items.push(value);
    }

    /// Removes the oldest value, if any.
    ///
    /// Drains are expected to be serialized by the caller; the store only pops
    /// while it holds its policy mutex.
    pub fn pop(&self) -> Option<T> {
        self.items.pop()
    }

    /// Number of values currently queued.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for MpscQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MpscQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpscQueue")
            .field("len", &self.items.len())
            .finish()
    }
}

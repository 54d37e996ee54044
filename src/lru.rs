//! Window LRU
//!
//! The admission window is a small, fixed-capacity recency list. Every newly
//! admitted key lands here first; when the window overflows, its least recently
//! used item is handed to the main-cache policy, which decides whether it has
//! earned a place there.
//!
//! # Algorithm
//!
//! ```text
//!   add(x)      MRU ◀──▶ [x] ◀──▶ [a] ◀──▶ [b] ◀──▶ [c] LRU ──▶ evicted
//!   access(b)   MRU ◀──▶ [b] ◀──▶ [x] ◀──▶ [a] LRU
//! ```
//!
//! # Thread Safety
//!
//! Not thread-safe. Each shard owns one window and only mutates it while
//! holding the shard's write lock.

use crate::arena::{Arena, Handle};
use crate::item::{Item, LinkKind, ListId, Role};
use crate::list::List;
use core::fmt;

/// Fixed-capacity recency list used as the admission window.
pub(crate) struct WindowLru {
    list: List,
}

impl WindowLru {
    /// Creates a window holding at most `cap` items (at least one).
    pub(crate) fn new(cap: usize) -> Self {
        WindowLru {
            list: List::new(ListId::WINDOW, LinkKind::Cache, cap.max(1)),
        }
    }

    /// Pushes `h` to the front.
    ///
    /// When the window was already full, its least recently used item is
    /// unlinked and returned.
    pub(crate) fn add<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) -> Option<Handle> {
        items[h].role = Role::Window;
        let evicted = self.list.push_front(items, h)?;
        items[evicted].role = Role::None;
        Some(evicted)
    }

    /// Marks `h` as most recently used.
    pub(crate) fn access<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) {
        self.list.move_to_front(items, h);
    }

    /// Unlinks `h` if the window holds it.
    pub(crate) fn remove<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) -> bool {
        if self.list.remove(items, h) {
            items[h].role = Role::None;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.list.len()
    }

    #[cfg(test)]
    pub(crate) fn cap(&self) -> usize {
        self.list.cap()
    }

    /// Forgets every member; the caller clears the arena alongside.
    pub(crate) fn reset(&mut self) {
        self.list.reset();
    }
}

impl fmt::Debug for WindowLru {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowLru")
            .field("capacity", &self.list.cap())
            .field("length", &self.list.len())
            .finish()
    }
}

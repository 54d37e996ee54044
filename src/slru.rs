//! Segmented LRU main cache.
//!
//! The main cache is split into a **probation** segment for items that just
//! survived the admission window and a **protection** segment for items that
//! were accessed again while on probation.
//!
//! ## Segment Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Segmented LRU (main cache)                      │
//! │                                                                         │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │                  PROTECTION SEGMENT (≈80%)                        │  │
//! │  │   MRU ◀──▶ [hot_1] ◀──▶ [hot_2] ◀──▶ ... ◀──▶ [demote] LRU         │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │                    │ demote                  ▲ promote                  │
//! │                    ▼                         │                          │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │                  PROBATION SEGMENT (≈20%)                         │  │
//! │  │   MRU ◀──▶ [new_1] ◀──▶ [new_2] ◀──▶ ... ◀──▶ [victim] LRU         │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │                    ▲                                                    │
//! │                    │ add (from window, after TinyLFU admission)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Entry Lifecycle
//!
//! 1. **Add**: the item is tagged probation and pushed to probation's front.
//!    A full probation segment gives up its tail.
//! 2. **Access on probation**: the item moves to protection's front. If that
//!    overflows protection, protection's tail is demoted to probation's front.
//!    The demotion does not evict anything itself; the owner's sweep
//!    (`TinyLfu::evict_entries`) settles any overflow.
//! 3. **Access on protection**: move to front.
//! 4. **Victim**: probation's tail, but only once the main cache is full.
//!
//! # Thread Safety
//!
//! Not thread-safe. Owned by the maintenance state and only mutated under the
//! store-wide mutex.

use crate::arena::{Arena, Handle};
use crate::item::{Item, LinkKind, ListId, Role};
use crate::list::List;
use core::fmt;

/// Probation + protection lists sharing one total capacity.
pub(crate) struct SegmentedLru {
    probation: List,
    protection: List,
    cap: usize,
}

impl SegmentedLru {
    /// Splits `cap` into a 20% probation and 80% protection segment, each at
    /// least one item.
    pub(crate) fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        let probation_cap = (cap / 5).max(1);
        let protection_cap = cap.saturating_sub(probation_cap).max(1);
        SegmentedLru {
            probation: List::new(ListId::PROBATION, LinkKind::Cache, probation_cap),
            protection: List::new(ListId::PROTECTION, LinkKind::Cache, protection_cap),
            cap,
        }
    }

    /// Total capacity of both segments.
    #[cfg(test)]
    pub(crate) fn cap(&self) -> usize {
        self.cap
    }

    /// Number of items across both segments.
    pub(crate) fn len(&self) -> usize {
        self.probation.len() + self.protection.len()
    }

    #[cfg(test)]
    pub(crate) fn probation_len(&self) -> usize {
        self.probation.len()
    }

    #[cfg(test)]
    pub(crate) fn protection_len(&self) -> usize {
        self.protection.len()
    }

    /// Admits `h` into probation. Returns probation's evicted tail, if any.
    pub(crate) fn add<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) -> Option<Handle> {
        items[h].role = Role::Probation;
        let evicted = self.probation.push_front(items, h)?;
        items[evicted].role = Role::None;
        Some(evicted)
    }

    /// Records a hit on a resident item.
    ///
    /// # Panics
    ///
    /// Panics if `h` is neither on probation nor protected; the caller has lost
    /// track of which list owns the item.
    pub(crate) fn access<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) {
        match items[h].role {
            Role::Probation => {
                self.probation.remove(items, h);
                items[h].role = Role::Protection;
                if let Some(demoted) = self.protection.push_front(items, h) {
                    items[demoted].role = Role::Probation;
                    self.probation.attach_front(items, demoted);
                }
            }
            Role::Protection => self.protection.move_to_front(items, h),
            role => panic!("segmented LRU access on item with role {role:?}"),
        }
    }

    /// Probation's tail, once the main cache is at capacity.
    pub(crate) fn maybe_victim(&self) -> Option<Handle> {
        if self.len() < self.cap {
            return None;
        }
        self.probation.back()
    }

    /// Detaches `h` from whichever segment holds it.
    pub(crate) fn remove<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) {
        let removed = match items[h].role {
            Role::Probation => self.probation.remove(items, h),
            Role::Protection => self.protection.remove(items, h),
            Role::None | Role::Window => false,
        };
        if removed {
            items[h].role = Role::None;
        }
    }

    /// Pops probation's tail, then protection's, until the total length fits
    /// the capacity again.
    pub(crate) fn evict_overflow<K>(&mut self, items: &mut Arena<Item<K>>) -> Vec<Handle> {
        let mut removed = Vec::new();
        while self.len() > self.cap {
            let Some(h) = self.probation.pop_back(items) else {
                break;
            };
            items[h].role = Role::None;
            removed.push(h);
        }
        while self.len() > self.cap {
            let Some(h) = self.protection.pop_back(items) else {
                break;
            };
            items[h].role = Role::None;
            removed.push(h);
        }
        removed
    }

    /// Forgets every member; the caller clears the arena alongside.
    pub(crate) fn reset(&mut self) {
        self.probation.reset();
        self.protection.reset();
    }
}

impl fmt::Debug for SegmentedLru {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedLru")
            .field("capacity", &self.cap)
            .field("probation", &self.probation)
            .field("protection", &self.protection)
            .finish()
    }
}

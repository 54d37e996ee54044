//! Generation-guarded slot arena.
//!
//! Items are addressed by a [`Handle`] (slot index plus generation) instead of
//! raw pointers. Freed slots go onto a free list and are handed out again by the
//! next insertion; the generation bump on release makes any handle still
//! pointing at the old occupant stale, so it can never alias the new one.

use core::fmt;
use core::ops::{Index, IndexMut};

/// Stable address of an item inside an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    #[cfg(test)]
    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A free-list backed pool of `T` with O(1) insert, remove and lookup.
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Arena {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Places `value` in a free slot (reusing a released one when possible).
    pub(crate) fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).expect("arena exhausted u32 index space");
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle {
            index,
            generation: 0,
        }
    }

    /// Releases the slot behind `handle`, returning its occupant.
    ///
    /// Returns `None` for a stale handle.
    pub(crate) fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub(crate) fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub(crate) fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Drops every occupant. Outstanding handles all become stale.
    pub(crate) fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(index as u32);
        }
        self.len = 0;
    }
}

impl<T> Index<Handle> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle) -> &T {
        self.get(handle).expect("stale arena handle")
    }
}

impl<T> IndexMut<Handle> for Arena<T> {
    fn index_mut(&mut self, handle: Handle) -> &mut T {
        self.get_mut(handle).expect("stale arena handle")
    }
}

impl<T> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("len", &self.len)
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut arena = Arena::with_capacity(4);
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena[a], "a");
        assert_eq!(arena.get(b), Some(&"b"));
    }

    #[test]
    fn test_reused_slot_invalidates_old_handle() {
        let mut arena = Arena::with_capacity(1);
        let first = arena.insert(1);
        assert_eq!(arena.remove(first), Some(1));
        let second = arena.insert(2);

        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert!(!arena.contains(first));
        assert_eq!(arena.get(second), Some(&2));
        assert_eq!(arena.remove(first), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_clear_makes_every_handle_stale() {
        let mut arena = Arena::with_capacity(2);
        let a = arena.insert(10);
        let b = arena.insert(20);
        arena.clear();
        assert_eq!(arena.len(), 0);
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_none());

        let c = arena.insert(30);
        assert_eq!(arena[c], 30);
    }

    #[test]
    #[should_panic(expected = "stale arena handle")]
    fn test_index_with_stale_handle_panics() {
        let mut arena = Arena::with_capacity(1);
        let h = arena.insert(());
        arena.remove(h);
        let _ = &arena[h];
    }
}

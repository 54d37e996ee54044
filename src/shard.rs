//! One keyspace slice of the store.
//!
//! A shard owns the resident map for its keys, its own admission window and
//! the doorkeeper that guards the window. Everything in here is mutated only
//! while the store holds the shard's write lock; lookups take the read lock.
//!
//! ```text
//!              set(k)                        window overflow
//!   ──────▶ doorkeeper ──seen──▶ map + window ──────────────▶ main cache
//!               │                                 (write event)
//!          first sight
//!               ▼
//!           rejected
//! ```

use crate::arena::{Arena, Handle};
use crate::bloom::BloomDoorkeeper;
use crate::item::{Item, ItemId};
use crate::lru::WindowLru;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};

#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

/// Doorkeeper keys per shard slot.
const DOORKEEPER_FACTOR: usize = 20;
const DOORKEEPER_FPR: f64 = 0.01;

/// A resident value and the metadata the read path needs.
pub(crate) struct Resident<V> {
    pub(crate) value: V,
    /// Absolute deadline in store-clock nanoseconds; 0 means never.
    pub(crate) expire: i64,
    pub(crate) id: ItemId,
    /// Window slot while the entry is still in this shard's window.
    slot: Option<Handle>,
}

impl<V> Resident<V> {
    /// True once `now` has reached the deadline.
    #[inline]
    pub(crate) fn expired_at(&self, now: i64) -> bool {
        self.expire != 0 && self.expire <= now
    }
}

/// What became of the item a full window pushed out.
pub(crate) enum Overflow<K, V> {
    /// Still live; offer it to the main cache.
    Promote(Item<K>),
    /// Already past its deadline; dropped from the map on the spot.
    Expired(K, V),
}

/// Result of overwriting a resident entry.
pub(crate) struct Replaced {
    pub(crate) id: ItemId,
    pub(crate) expire_changed: bool,
}

pub(crate) struct Shard<K, V, S> {
    index: usize,
    map: HashMap<K, Resident<V>, S>,
    items: Arena<Item<K>>,
    window: WindowLru,
    doorkeeper: BloomDoorkeeper,
    /// First-sight recordings since the last doorkeeper reset.
    doorkeeper_count: usize,
    cap: usize,
}

impl<K, V, S> Shard<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    pub(crate) fn new(index: usize, cap: usize, window_cap: usize, hash_builder: S) -> Self {
        Shard {
            index,
            map: HashMap::with_capacity_and_hasher(cap, hash_builder),
            items: Arena::with_capacity(window_cap),
            window: WindowLru::new(window_cap),
            doorkeeper: BloomDoorkeeper::new(DOORKEEPER_FACTOR * cap, DOORKEEPER_FPR),
            doorkeeper_count: 0,
            cap,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[cfg(test)]
    pub(crate) fn window_len(&self) -> usize {
        self.window.len()
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&Resident<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.get(key)
    }

    /// Deadline of `key` if it is still the entry identified by `id`.
    pub(crate) fn current_expire(&self, key: &K, id: ItemId) -> Option<i64> {
        self.map
            .get(key)
            .filter(|resident| resident.id == id)
            .map(|resident| resident.expire)
    }

    /// Records `hash` in the doorkeeper and reports whether it had been seen
    /// before. The filter starts over once it has recorded a shard's worth of
    /// first sightings.
    pub(crate) fn doorkeeper_admits(&mut self, hash: u64) -> bool {
        if self.doorkeeper_count >= self.cap {
            self.doorkeeper.reset();
            self.doorkeeper_count = 0;
            tracing::trace!(shard = self.index, "doorkeeper reset");
        }
        if self.doorkeeper.insert(hash) {
            return true;
        }
        self.doorkeeper_count += 1;
        false
    }

    /// Overwrites the value (and deadline) of a resident key, refreshing its
    /// window position. Hands `value` back if the key is not resident.
    pub(crate) fn replace(&mut self, key: &K, value: V, expire: i64) -> Result<Replaced, V> {
        let Some(resident) = self.map.get_mut(key) else {
            return Err(value);
        };
        resident.value = value;
        let expire_changed = resident.expire != expire;
        resident.expire = expire;
        if let Some(slot) = resident.slot {
            self.items[slot].expire = expire;
            self.window.access(&mut self.items, slot);
        }
        Ok(Replaced {
            id: resident.id,
            expire_changed,
        })
    }

    /// Makes `key` resident and pushes it into the window.
    ///
    /// The caller has checked that `key` is absent. Returns the new entry's id
    /// and what happened to the item the window pushed out, if any.
    pub(crate) fn insert(
        &mut self,
        key: K,
        hash: u64,
        value: V,
        expire: i64,
        now: i64,
    ) -> (ItemId, Option<Overflow<K, V>>) {
        let id = ItemId::next();
        let slot = self
            .items
            .insert(Item::new(key.clone(), hash, id, expire, self.index));
        self.map.insert(
            key,
            Resident {
                value,
                expire,
                id,
                slot: Some(slot),
            },
        );
        let overflow = self
            .window
            .add(&mut self.items, slot)
            .and_then(|evicted| self.leave_window(evicted, now));
        (id, overflow)
    }

    fn leave_window(&mut self, h: Handle, now: i64) -> Option<Overflow<K, V>> {
        let mut item = self.items.remove(h)?;
        let resident = self.map.get_mut(&item.key)?;
        if resident.expired_at(now) {
            let (key, resident) = self.map.remove_entry(&item.key)?;
            return Some(Overflow::Expired(key, resident.value));
        }
        resident.slot = None;
        item.expire = resident.expire;
        Some(Overflow::Promote(item))
    }

    /// Removes `key` whatever entry it holds.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<(K, Resident<V>)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (key, resident) = self.map.remove_entry(key)?;
        self.release_slot(resident.slot);
        Some((key, resident))
    }

    /// Removes `key` only if it still holds the entry identified by `id`.
    pub(crate) fn remove_current(&mut self, key: &K, id: ItemId) -> Option<(K, V)> {
        if self.map.get(key)?.id != id {
            return None;
        }
        let (key, resident) = self.map.remove_entry(key)?;
        self.release_slot(resident.slot);
        Some((key, resident.value))
    }

    /// Removes `key` if it still holds entry `id` and its deadline has passed
    /// by `now`.
    ///
    /// Otherwise reports the entry's current deadline, or `None` once the entry
    /// is gone.
    pub(crate) fn take_expired(
        &mut self,
        key: &K,
        id: ItemId,
        now: i64,
    ) -> Result<(K, V), Option<i64>> {
        let resident = self.map.get(key).filter(|r| r.id == id).ok_or(None)?;
        if resident.expire == 0 || resident.expire > now {
            return Err(Some(resident.expire));
        }
        self.remove_current(key, id).ok_or(None)
    }

    fn release_slot(&mut self, slot: Option<Handle>) {
        if let Some(slot) = slot {
            self.window.remove(&mut self.items, slot);
            self.items.remove(slot);
        }
    }

    /// Drops every entry, the window and the doorkeeper state.
    pub(crate) fn clear(&mut self) {
        self.map.clear();
        self.window.reset();
        self.items.clear();
        self.doorkeeper.reset();
        self.doorkeeper_count = 0;
    }
}

impl<K, V, S> fmt::Debug for Shard<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("index", &self.index)
            .field("len", &self.map.len())
            .field("window", &self.window)
            .field("doorkeeper", &self.doorkeeper)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "hashbrown")]
    use hashbrown::DefaultHashBuilder;

    #[cfg(not(feature = "hashbrown"))]
    use std::collections::hash_map::RandomState as DefaultHashBuilder;

    fn shard(cap: usize, window: usize) -> Shard<String, i32, DefaultHashBuilder> {
        Shard::new(0, cap, window, DefaultHashBuilder::default())
    }

    fn admit(
        shard: &mut Shard<String, i32, DefaultHashBuilder>,
        key: &str,
        hash: u64,
        value: i32,
    ) -> Option<Overflow<String, i32>> {
        assert!(!shard.doorkeeper_admits(hash));
        assert!(shard.doorkeeper_admits(hash));
        shard.insert(key.to_string(), hash, value, 0, 0).1
    }

    #[test]
    fn test_doorkeeper_needs_second_sighting() {
        let mut shard = shard(100, 2);
        assert!(!shard.doorkeeper_admits(0xabcdef_0123_4567));
        assert!(shard.doorkeeper_admits(0xabcdef_0123_4567));
    }

    #[test]
    fn test_doorkeeper_resets_after_shard_capacity() {
        let mut shard = shard(4, 2);
        let hashes: Vec<u64> = (1..=4u64).map(|h| h.wrapping_mul(0x9e37_79b9_7f4a_7c15)).collect();
        for &h in &hashes {
            assert!(!shard.doorkeeper_admits(h));
        }
        // Four first sightings fill the counter; the next call starts over.
        assert!(!shard.doorkeeper_admits(hashes[0]));
    }

    #[test]
    fn test_window_overflow_promotes_oldest() {
        let mut shard = shard(100, 2);
        assert!(admit(&mut shard, "a", 11, 1).is_none());
        assert!(admit(&mut shard, "b", 22, 2).is_none());
        match admit(&mut shard, "c", 33, 3) {
            Some(Overflow::Promote(item)) => assert_eq!(item.key, "a"),
            _ => panic!("expected the oldest window item to be promoted"),
        }
        // Promoted entries stay resident, only the window lets go.
        assert_eq!(shard.len(), 3);
        assert_eq!(shard.window_len(), 2);
    }

    #[test]
    fn test_expired_window_overflow_is_dropped() {
        let mut shard = shard(100, 1);
        shard.insert("old".to_string(), 1, 7, 10, 0);
        match shard.insert("new".to_string(), 2, 8, 0, 20).1 {
            Some(Overflow::Expired(key, value)) => {
                assert_eq!(key, "old");
                assert_eq!(value, 7);
            }
            _ => panic!("expected the expired window item to be dropped"),
        }
        assert!(shard.get("old").is_none());
        assert_eq!(shard.len(), 1);
    }

    #[test]
    fn test_replace_reports_deadline_change() {
        let mut shard = shard(100, 4);
        let (id, _) = shard.insert("k".to_string(), 1, 1, 0, 0);

        let replaced = shard.replace(&"k".to_string(), 2, 0).ok().unwrap();
        assert_eq!(replaced.id, id);
        assert!(!replaced.expire_changed);

        let replaced = shard.replace(&"k".to_string(), 3, 500).ok().unwrap();
        assert!(replaced.expire_changed);
        assert_eq!(shard.get("k").map(|r| (r.value, r.expire)), Some((3, 500)));

        assert_eq!(shard.replace(&"missing".to_string(), 9, 0).err(), Some(9));
    }

    #[test]
    fn test_remove_current_checks_identity() {
        let mut shard = shard(100, 4);
        let (old, _) = shard.insert("k".to_string(), 1, 1, 0, 0);
        shard.remove("k");
        assert_eq!(shard.window_len(), 0);
        let (new, _) = shard.insert("k".to_string(), 1, 2, 0, 0);

        assert!(shard.remove_current(&"k".to_string(), old).is_none());
        assert_eq!(shard.current_expire(&"k".to_string(), new), Some(0));
        assert_eq!(shard.remove_current(&"k".to_string(), new), Some(("k".to_string(), 2)));
        assert_eq!(shard.len(), 0);
    }

    #[test]
    fn test_take_expired() {
        let mut shard = shard(100, 4);
        let (id, _) = shard.insert("k".to_string(), 1, 5, 100, 0);
        let key = "k".to_string();

        assert_eq!(shard.take_expired(&key, id, 50), Err(Some(100)));
        shard.replace(&key, 6, 200).ok().unwrap();
        assert_eq!(shard.take_expired(&key, id, 150), Err(Some(200)));
        assert_eq!(shard.take_expired(&key, id, 200), Ok((key.clone(), 6)));
        assert_eq!(shard.take_expired(&key, id, 300), Err(None));
    }

    #[test]
    fn test_clear() {
        let mut shard = shard(100, 4);
        admit(&mut shard, "a", 11, 1);
        shard.clear();
        assert_eq!(shard.len(), 0);
        assert_eq!(shard.window_len(), 0);
        assert!(!shard.doorkeeper_admits(11));
    }
}

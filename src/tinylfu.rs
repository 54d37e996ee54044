//! TinyLFU admission and eviction policy.
//!
//! Owns the main cache and the shared frequency sketch. Items leaving an
//! admission window are offered through [`TinyLfu::set`]; when the main cache is
//! full the candidate only gets in if the sketch says it is requested strictly
//! more often than probation's tail.

use crate::arena::{Arena, Handle};
use crate::item::Item;
use crate::sketch::CountMinSketch;
use crate::slru::SegmentedLru;
use core::fmt;

/// Recorded accesses between two sketch halvings, per main-cache slot.
const SAMPLE_FACTOR: usize = 10;

pub(crate) struct TinyLfu {
    main: SegmentedLru,
    sketch: CountMinSketch,
    samples: usize,
    sample_limit: usize,
}

impl TinyLfu {
    pub(crate) fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        TinyLfu {
            main: SegmentedLru::new(cap),
            sketch: CountMinSketch::new(cap as u64),
            samples: 0,
            sample_limit: cap.saturating_mul(SAMPLE_FACTOR),
        }
    }

    #[cfg(test)]
    pub(crate) fn cap(&self) -> usize {
        self.main.cap()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.main.len()
    }

    /// Offers a window-evicted item to the main cache.
    ///
    /// Returns the item that has to leave: the candidate itself when it loses
    /// the frequency comparison (ties keep the incumbent), otherwise whatever
    /// probation pushed out to make room. Items already in the main cache are
    /// ignored.
    pub(crate) fn set<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) -> Option<Handle> {
        if !items[h].is_new() {
            return None;
        }
        if let Some(victim) = self.main.maybe_victim() {
            let freq = self.sketch.estimate(items[h].hash);
            let victim_freq = self.sketch.estimate(items[victim].hash);
            if freq <= victim_freq {
                return Some(h);
            }
        }
        self.main.add(items, h)
    }

    /// Replays one buffered read: counts the request and, for a main-cache
    /// resident, promotes it.
    ///
    /// Returns true when the count triggered a sketch halving.
    pub(crate) fn access<K>(
        &mut self,
        items: &mut Arena<Item<K>>,
        hash: u64,
        resident: Option<Handle>,
    ) -> bool {
        let aged = self.record(hash);
        if let Some(h) = resident {
            if !items[h].is_new() {
                self.main.access(items, h);
            }
        }
        aged
    }

    pub(crate) fn remove<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) {
        self.main.remove(items, h);
    }

    /// Pops probation, then protection, until the main cache fits its capacity
    /// again. Demotions during [`access`](Self::access) may leave it over.
    pub(crate) fn evict_entries<K>(&mut self, items: &mut Arena<Item<K>>) -> Vec<Handle> {
        self.main.evict_overflow(items)
    }

    #[cfg(test)]
    pub(crate) fn estimate(&self, hash: u64) -> u8 {
        self.sketch.estimate(hash)
    }

    /// Drops every main-cache member and zeroes the sketch.
    pub(crate) fn clear(&mut self) {
        self.main.reset();
        self.sketch.clear();
        self.samples = 0;
    }

    fn record(&mut self, hash: u64) -> bool {
        self.sketch.increment(hash);
        self.samples += 1;
        if self.samples >= self.sample_limit {
            self.sketch.reset();
            self.samples = 0;
            return true;
        }
        false
    }
}

impl fmt::Debug for TinyLfu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TinyLfu")
            .field("main", &self.main)
            .field("sketch", &self.sketch)
            .field("samples", &self.samples)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemId, Role};

    fn item(items: &mut Arena<Item<u64>>, key: u64) -> Handle {
        items.insert(Item::new(key, key.wrapping_mul(0x9e37_79b9_7f4a_7c15), ItemId::next(), 0, 0))
    }

    /// Fills a five-slot main cache: four protected items and `hs[0]` demoted
    /// back to probation, where it is the victim.
    fn full_policy(items: &mut Arena<Item<u64>>) -> (TinyLfu, Vec<Handle>) {
        let mut policy = TinyLfu::new(5);
        let hs: Vec<Handle> = (0..5).map(|key| item(items, key)).collect();
        for &h in &hs {
            policy.set(items, h);
            let hash = items[h].hash;
            policy.access(items, hash, Some(h));
        }
        assert_eq!(policy.len(), 5);
        (policy, hs)
    }

    #[test]
    fn test_below_capacity_only_probation_overflows() {
        let mut items = Arena::with_capacity(8);
        let mut policy = TinyLfu::new(10); // probation holds 2
        let hs: Vec<Handle> = (0..3).map(|key| item(&mut items, key)).collect();
        assert_eq!(policy.set(&mut items, hs[0]), None);
        assert_eq!(policy.set(&mut items, hs[1]), None);
        assert_eq!(policy.set(&mut items, hs[2]), Some(hs[0]));
        assert_eq!(policy.len(), 2);
    }

    #[test]
    fn test_tie_favors_incumbent() {
        let mut items = Arena::with_capacity(8);
        let (mut policy, _) = full_policy(&mut items);
        let candidate = item(&mut items, 100);
        assert_eq!(policy.set(&mut items, candidate), Some(candidate));
        assert!(items[candidate].is_new());
        assert_eq!(policy.len(), 5);
    }

    #[test]
    fn test_frequent_candidate_displaces_victim() {
        let mut items = Arena::with_capacity(8);
        let (mut policy, hs) = full_policy(&mut items);
        let candidate = item(&mut items, 100);
        let hash = items[candidate].hash;
        for _ in 0..10 {
            policy.access(&mut items, hash, None);
        }

        assert_eq!(policy.set(&mut items, candidate), Some(hs[0]));
        assert_eq!(items[candidate].role, Role::Probation);
        assert!(items[hs[0]].is_new());
        assert_eq!(policy.len(), 5);
    }

    #[test]
    fn test_access_promotes_residents_only() {
        let mut items = Arena::with_capacity(4);
        let mut policy = TinyLfu::new(10);
        let resident = item(&mut items, 1);
        let outsider = item(&mut items, 2);
        policy.set(&mut items, resident);

        let hash = items[resident].hash;
        policy.access(&mut items, hash, Some(resident));
        assert_eq!(items[resident].role, Role::Protection);

        let hash = items[outsider].hash;
        policy.access(&mut items, hash, Some(outsider));
        assert!(items[outsider].is_new());
    }

    #[test]
    fn test_sketch_ages_after_sample_limit() {
        let mut items: Arena<Item<u64>> = Arena::with_capacity(1);
        let mut policy = TinyLfu::new(2);
        let mut aged = 0;
        for i in 0..20u64 {
            if policy.access(&mut items, i, None) {
                aged += 1;
            }
        }
        assert_eq!(aged, 1);
    }

    #[test]
    fn test_clear_zeroes_frequencies() {
        let mut items: Arena<Item<u64>> = Arena::with_capacity(1);
        let mut policy = TinyLfu::new(100);
        for _ in 0..4 {
            policy.access(&mut items, 7, None);
        }
        assert!(policy.estimate(7) > 0);
        policy.clear();
        assert_eq!(policy.estimate(7), 0);
        assert_eq!(policy.len(), 0);
    }
}

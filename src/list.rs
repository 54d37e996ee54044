use crate::arena::{Arena, Handle};
use crate::item::{Item, Link, LinkKind, ListId, Ptr};
use core::fmt;

/// A sentinel-rooted doubly linked ring over items stored in an [`Arena`].
///
/// The list never owns its items; it only threads them together through one of
/// their link pairs (selected by [`LinkKind`]) and records itself as the owner
/// of that pair. Every operation that touches links takes the arena explicitly,
/// so the same item can be a member of a cache-role list and a timer-wheel list
/// at the same time.
///
/// There is no internal locking. All mutation of a given arena and its lists
/// must be serialized by the caller.
pub(crate) struct List {
    /// Identity written into each member's back-reference.
    id: ListId,
    /// Which of the item's link pairs this list uses.
    kind: LinkKind,
    /// Sentinel `next`: the front of the list, or `Root` when empty.
    head: Ptr,
    /// Sentinel `prev`: the back of the list, or `Root` when empty.
    tail: Ptr,
    len: usize,
    /// Maximum length before `push_*` evicts; 0 means unbounded.
    cap: usize,
}

impl List {
    /// Creates an empty list. A `cap` of 0 makes the list unbounded.
    pub(crate) fn new(id: ListId, kind: LinkKind, cap: usize) -> List {
        List {
            id,
            kind,
            head: Ptr::Root,
            tail: Ptr::Root,
            len: 0,
            cap,
        }
    }

    /// Returns the maximum number of items the list holds (0 = unbounded).
    pub(crate) fn cap(&self) -> usize {
        self.cap
    }

    /// Returns the current number of items in the list.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the list contains no items.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the most recently pushed-to-front item.
    #[cfg(test)]
    pub(crate) fn front(&self) -> Option<Handle> {
        match self.head {
            Ptr::Item(h) => Some(h),
            Ptr::Root => None,
        }
    }

    /// Returns the item at the back (the eviction end).
    pub(crate) fn back(&self) -> Option<Handle> {
        match self.tail {
            Ptr::Item(h) => Some(h),
            Ptr::Root => None,
        }
    }

    /// Returns true if `h` is currently linked into this list.
    pub(crate) fn contains<K>(&self, items: &Arena<Item<K>>, h: Handle) -> bool {
        items
            .get(h)
            .is_some_and(|item| item.link(self.kind).owner == Some(self.id))
    }

    fn next_of<K>(&self, items: &Arena<Item<K>>, p: Ptr) -> Ptr {
        match p {
            Ptr::Root => self.head,
            Ptr::Item(h) => items[h]
                .link(self.kind)
                .next
                .expect("linked item without next pointer"),
        }
    }

    fn set_next<K>(&mut self, items: &mut Arena<Item<K>>, p: Ptr, to: Ptr) {
        match p {
            Ptr::Root => self.head = to,
            Ptr::Item(h) => items[h].link_mut(self.kind).next = Some(to),
        }
    }

    fn set_prev<K>(&mut self, items: &mut Arena<Item<K>>, p: Ptr, to: Ptr) {
        match p {
            Ptr::Root => self.tail = to,
            Ptr::Item(h) => items[h].link_mut(self.kind).prev = Some(to),
        }
    }

    /// Links `h` directly after `at`.
    ///
    /// `h` must not be linked through this list's link pair.
    fn insert_after<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle, at: Ptr) {
        debug_assert!(
            !items[h].link(self.kind).is_linked(),
            "item already linked through this link pair"
        );
        let next = self.next_of(items, at);
        *items[h].link_mut(self.kind) = Link {
            prev: Some(at),
            next: Some(next),
            owner: Some(self.id),
        };
        self.set_next(items, at, Ptr::Item(h));
        self.set_prev(items, next, Ptr::Item(h));
        self.len += 1;
    }

    /// Unlinks `h`, which must be a member of this list, and clears its links.
    fn detach<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) {
        let link = *items[h].link(self.kind);
        let prev = link.prev.expect("linked item without prev pointer");
        let next = link.next.expect("linked item without next pointer");
        self.set_next(items, prev, next);
        self.set_prev(items, next, prev);
        *items[h].link_mut(self.kind) = Link::default();
        self.len -= 1;
    }

    /// Inserts `h` at the front.
    ///
    /// When the list is bounded and already full, the back item is unlinked
    /// first and returned as the evicted item.
    pub(crate) fn push_front<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) -> Option<Handle> {
        let evicted = self.make_room(items);
        self.insert_after(items, h, Ptr::Root);
        evicted
    }

    /// Inserts `h` at the back, evicting the current back item when full.
    #[cfg(test)]
    pub(crate) fn push_back<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) -> Option<Handle> {
        let evicted = self.make_room(items);
        let at = self.tail;
        self.insert_after(items, h, at);
        evicted
    }

    /// Inserts `h` at the front without enforcing the capacity bound.
    ///
    /// Used when an item migrates from another list and any overflow is settled
    /// later by the owner.
    pub(crate) fn attach_front<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) {
        self.insert_after(items, h, Ptr::Root);
    }

    fn make_room<K>(&mut self, items: &mut Arena<Item<K>>) -> Option<Handle> {
        if self.cap > 0 && self.len >= self.cap {
            self.pop_back(items)
        } else {
            None
        }
    }

    /// Unlinks `h` if it belongs to this list. Returns whether it did.
    pub(crate) fn remove<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) -> bool {
        if !self.contains(items, h) {
            return false;
        }
        self.detach(items, h);
        true
    }

    /// Moves a member to the front. No-op for non-members or the current front.
    pub(crate) fn move_to_front<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) {
        if !self.contains(items, h) || self.head == Ptr::Item(h) {
            return;
        }
        self.detach(items, h);
        self.insert_after(items, h, Ptr::Root);
    }

    /// Moves a member to the back. No-op for non-members or the current back.
    #[cfg(test)]
    pub(crate) fn move_to_back<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) {
        if !self.contains(items, h) || self.tail == Ptr::Item(h) {
            return;
        }
        self.detach(items, h);
        let at = self.tail;
        self.insert_after(items, h, at);
    }

    /// Unlinks and returns the back item.
    pub(crate) fn pop_back<K>(&mut self, items: &mut Arena<Item<K>>) -> Option<Handle> {
        let h = self.back()?;
        self.detach(items, h);
        Some(h)
    }

    /// Unlinks and returns the front item.
    #[cfg(test)]
    pub(crate) fn pop_front<K>(&mut self, items: &mut Arena<Item<K>>) -> Option<Handle> {
        let h = self.front()?;
        self.detach(items, h);
        Some(h)
    }

    /// Returns the members from front to back.
    pub(crate) fn handles<K>(&self, items: &Arena<Item<K>>) -> Vec<Handle> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Ptr::Item(h) = cursor {
            out.push(h);
            cursor = self.next_of(items, cursor);
        }
        out
    }

    /// Unlinks every member and returns them from front to back, leaving the
    /// list empty.
    pub(crate) fn drain<K>(&mut self, items: &mut Arena<Item<K>>) -> Vec<Handle> {
        let members = self.handles(items);
        for &h in &members {
            *items[h].link_mut(self.kind) = Link::default();
        }
        self.head = Ptr::Root;
        self.tail = Ptr::Root;
        self.len = 0;
        members
    }

    /// Forgets every member without touching the arena.
    ///
    /// Only valid when the arena is being cleared alongside.
    pub(crate) fn reset(&mut self) {
        self.head = Ptr::Root;
        self.tail = Ptr::Root;
        self.len = 0;
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("id", &self.id)
            .field("capacity", &self.cap)
            .field("length", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemId;

    fn arena_with(n: u32) -> (Arena<Item<u32>>, Vec<Handle>) {
        let mut arena = Arena::with_capacity(n as usize);
        let handles = (0..n)
            .map(|k| arena.insert(Item::new(k, u64::from(k), ItemId::next(), 0, 0)))
            .collect();
        (arena, handles)
    }

    fn keys(list: &List, items: &Arena<Item<u32>>) -> Vec<u32> {
        list.handles(items).into_iter().map(|h| items[h].key).collect()
    }

    #[test]
    fn test_push_front_and_back_order() {
        let (mut items, hs) = arena_with(3);
        let mut list = List::new(ListId::WINDOW, LinkKind::Cache, 0);
        assert!(list.is_empty());
        list.push_front(&mut items, hs[0]);
        list.push_front(&mut items, hs[1]);
        list.push_back(&mut items, hs[2]);

        assert_eq!(list.len(), 3);
        assert_eq!(keys(&list, &items), vec![1, 0, 2]);
        assert_eq!(list.front(), Some(hs[1]));
        assert_eq!(list.back(), Some(hs[2]));
    }

    #[test]
    fn test_bounded_push_evicts_tail() {
        let (mut items, hs) = arena_with(3);
        let mut list = List::new(ListId::WINDOW, LinkKind::Cache, 2);
        assert_eq!(list.push_front(&mut items, hs[0]), None);
        assert_eq!(list.push_front(&mut items, hs[1]), None);
        assert_eq!(list.push_front(&mut items, hs[2]), Some(hs[0]));

        assert_eq!(list.len(), 2);
        assert_eq!(keys(&list, &items), vec![2, 1]);
        assert!(!items[hs[0]].links.is_linked());
        assert_eq!(items[hs[0]].links, Link::default());
    }

    #[test]
    fn test_attach_front_ignores_capacity() {
        let (mut items, hs) = arena_with(3);
        let mut list = List::new(ListId::PROBATION, LinkKind::Cache, 1);
        list.push_front(&mut items, hs[0]);
        list.attach_front(&mut items, hs[1]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.cap(), 1);
    }

    #[test]
    fn test_remove_is_noop_for_foreign_items() {
        let (mut items, hs) = arena_with(2);
        let mut a = List::new(ListId::PROBATION, LinkKind::Cache, 0);
        let mut b = List::new(ListId::PROTECTION, LinkKind::Cache, 0);
        a.push_front(&mut items, hs[0]);
        b.push_front(&mut items, hs[1]);

        assert!(!a.remove(&mut items, hs[1]));
        assert_eq!(b.len(), 1);
        assert!(a.remove(&mut items, hs[0]));
        assert!(a.is_empty());
        assert!(!a.remove(&mut items, hs[0]));
    }

    #[test]
    fn test_move_to_front_and_back() {
        let (mut items, hs) = arena_with(4);
        let mut list = List::new(ListId::WINDOW, LinkKind::Cache, 0);
        for &h in &hs {
            list.push_back(&mut items, h);
        }
        list.move_to_front(&mut items, hs[2]);
        assert_eq!(keys(&list, &items), vec![2, 0, 1, 3]);
        list.move_to_back(&mut items, hs[0]);
        assert_eq!(keys(&list, &items), vec![2, 1, 3, 0]);
        list.move_to_front(&mut items, hs[2]);
        assert_eq!(keys(&list, &items), vec![2, 1, 3, 0]);
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_pop_front_and_back() {
        let (mut items, hs) = arena_with(3);
        let mut list = List::new(ListId::WINDOW, LinkKind::Cache, 0);
        assert_eq!(list.pop_back(&mut items), None);
        for &h in &hs {
            list.push_back(&mut items, h);
        }
        assert_eq!(list.pop_front(&mut items), Some(hs[0]));
        assert_eq!(list.pop_back(&mut items), Some(hs[2]));
        assert_eq!(list.pop_back(&mut items), Some(hs[1]));
        assert_eq!(list.pop_front(&mut items), None);
        assert!(list.is_empty());
    }

    #[test]
    fn test_cache_and_wheel_links_are_independent() {
        let (mut items, hs) = arena_with(2);
        let mut cache = List::new(ListId::PROBATION, LinkKind::Cache, 0);
        let mut bucket = List::new(ListId::bucket(0), LinkKind::Wheel, 0);
        cache.push_front(&mut items, hs[0]);
        cache.push_front(&mut items, hs[1]);
        bucket.push_front(&mut items, hs[0]);

        assert!(items[hs[0]].links.is_linked());
        assert!(items[hs[0]].wheel.is_linked());
        assert!(bucket.remove(&mut items, hs[0]));
        assert!(!items[hs[0]].wheel.is_linked());
        assert!(items[hs[0]].links.is_linked());
        assert_eq!(keys(&cache, &items), vec![1, 0]);
    }

    #[test]
    fn test_drain_unlinks_everything() {
        let (mut items, hs) = arena_with(3);
        let mut bucket = List::new(ListId::bucket(3), LinkKind::Wheel, 0);
        for &h in &hs {
            bucket.push_front(&mut items, h);
        }
        let drained = bucket.drain(&mut items);
        assert_eq!(drained, vec![hs[2], hs[1], hs[0]]);
        assert!(bucket.is_empty());
        assert!(hs.iter().all(|&h| !items[h].wheel.is_linked()));

        bucket.push_front(&mut items, hs[1]);
        assert_eq!(bucket.len(), 1);
    }
}

//! Cache item metadata.
//!
//! An [`Item`] carries everything the replacement machinery needs to know about
//! one resident key: its hash, expiration, owning shard, the role it currently
//! plays, and two independent link pairs. The `links` pair threads the item
//! through whichever cache-role list holds it (window, probation or protection);
//! the `wheel` pair threads it through a timer-wheel bucket. The two never
//! overlap, so an item can sit in a recency list and a wheel bucket at once.
//!
//! Values are not stored here. They stay in the shard map next to the key,
//! where the read path can reach them under the shard lock alone.

use crate::arena::Handle;
use core::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of an admitted item.
///
/// Handles are recycled by the arenas; ids are never reused, which lets the
/// maintenance side recognise events that refer to an entry that has since been
/// replaced under the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ItemId(u64);

impl ItemId {
    pub(crate) fn next() -> ItemId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ItemId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Which cache-role list (if any) currently holds the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Role {
    #[default]
    None,
    Window,
    Probation,
    Protection,
}

/// Identifies a list instance so an item can tell which list it is linked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListId(pub(crate) u16);

impl ListId {
    pub(crate) const WINDOW: ListId = ListId(0);
    pub(crate) const PROBATION: ListId = ListId(1);
    pub(crate) const PROTECTION: ListId = ListId(2);
    const FIRST_BUCKET: u16 = 16;

    pub(crate) fn bucket(flat_index: usize) -> ListId {
        let offset = u16::try_from(flat_index).expect("timer wheel bucket index out of range");
        ListId(Self::FIRST_BUCKET + offset)
    }

    pub(crate) fn bucket_index(self) -> Option<usize> {
        self.0
            .checked_sub(Self::FIRST_BUCKET)
            .map(|offset| offset as usize)
    }
}

/// A neighbour in a sentinel-rooted ring: either the list root or another item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ptr {
    Root,
    Item(Handle),
}

/// One link pair plus the back-reference to the list owning it.
///
/// `prev`, `next` and `owner` are either all set (linked) or all `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Link {
    pub(crate) prev: Option<Ptr>,
    pub(crate) next: Option<Ptr>,
    pub(crate) owner: Option<ListId>,
}

impl Link {
    #[inline]
    pub(crate) fn is_linked(&self) -> bool {
        self.owner.is_some()
    }
}

/// Selects which link pair of an [`Item`] a list threads through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkKind {
    Cache,
    Wheel,
}

/// Replacement metadata for one admitted key.
#[derive(Debug)]
pub(crate) struct Item<K> {
    pub(crate) key: K,
    pub(crate) hash: u64,
    pub(crate) id: ItemId,
    /// Absolute expiration in store-clock nanoseconds; 0 means never.
    pub(crate) expire: i64,
    pub(crate) shard: usize,
    pub(crate) role: Role,
    pub(crate) links: Link,
    pub(crate) wheel: Link,
}

impl<K> Item<K> {
    pub(crate) fn new(key: K, hash: u64, id: ItemId, expire: i64, shard: usize) -> Self {
        Item {
            key,
            hash,
            id,
            expire,
            shard,
            role: Role::None,
            links: Link::default(),
            wheel: Link::default(),
        }
    }

    /// True while the item has never been placed in a cache-role list.
    #[inline]
    pub(crate) fn is_new(&self) -> bool {
        self.role == Role::None && !self.links.is_linked()
    }

    /// True while the item is not scheduled on the timer wheel.
    #[inline]
    #[cfg(test)]
    pub(crate) fn is_new_wheel(&self) -> bool {
        !self.wheel.is_linked()
    }

    #[inline]
    pub(crate) fn link(&self, kind: LinkKind) -> &Link {
        match kind {
            LinkKind::Cache => &self.links,
            LinkKind::Wheel => &self.wheel,
        }
    }

    #[inline]
    pub(crate) fn link_mut(&mut self, kind: LinkKind) -> &mut Link {
        match kind {
            LinkKind::Cache => &mut self.links,
            LinkKind::Wheel => &mut self.wheel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_item_is_unlinked_everywhere() {
        let item = Item::new("k", 7, ItemId::next(), 0, 0);
        assert!(item.is_new());
        assert!(item.is_new_wheel());
        assert_eq!(item.role, Role::None);
    }

    #[test]
    fn test_item_ids_are_unique() {
        let a = ItemId::next();
        let b = ItemId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_bucket_list_ids_round_trip() {
        assert_eq!(ListId::bucket(0).bucket_index(), Some(0));
        assert_eq!(ListId::bucket(164).bucket_index(), Some(164));
        assert_eq!(ListId::WINDOW.bucket_index(), None);
        assert_eq!(ListId::PROTECTION.bucket_index(), None);
    }
}

//! Hierarchical timer wheel for per-entry expiration.
//!
//! Five levels of buckets with spans rounded up to powers of two (≈1s, ≈1m,
//! ≈1h, ≈1d, ≈4d). An item is filed under the finest level whose span covers
//! the time left until its deadline, in the bucket selected by the deadline's
//! tick at that level. Advancing the wheel visits every bucket whose tick has
//! elapsed since the previous advance, plus the bucket of the current tick;
//! items that are due are handed back to the caller, the rest cascade down to a
//! finer level.
//!
//! ```text
//!  level  buckets  tick        covers
//!    0       64    2^30 ns     ~1.1 s   x 64 ≈ 68 s
//!    1       64    2^36 ns     ~68 s    x 64 ≈ 73 min
//!    2       32    2^42 ns     ~73 min  x 32 ≈ 39 h
//!    3        4    2^47 ns     ~39 h    x 4  ≈ 6.5 d
//!    4        1    2^49 ns     overflow
//! ```
//!
//! Granularity is one level-0 tick: nothing expires through the wheel sooner
//! than the advance that crosses the tick after its deadline.

use crate::arena::{Arena, Handle};
use crate::item::{Item, LinkKind, ListId};
use crate::list::List;
use core::fmt;
use std::time::{Duration, Instant};

const LEVELS: usize = 5;
const BUCKETS: [usize; LEVELS] = [64, 64, 32, 4, 1];
/// First flat bucket index of each level.
const OFFSETS: [usize; LEVELS] = [0, 64, 128, 160, 164];
const TOTAL_BUCKETS: usize = 165;
const SHIFTS: [u32; LEVELS] = [30, 36, 42, 47, 49];
const SPANS: [i64; LEVELS + 1] = [1 << 30, 1 << 36, 1 << 42, 1 << 47, 1 << 49, 1 << 49];

/// Monotonic nanosecond clock anchored at store creation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Clock {
    start: Instant,
}

impl Clock {
    pub(crate) fn new() -> Self {
        Clock {
            start: Instant::now(),
        }
    }

    pub(crate) fn now_nanos(&self) -> i64 {
        i64::try_from(self.start.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }

    /// Absolute deadline `ttl` from now; a zero `ttl` means no deadline.
    pub(crate) fn expire_nanos(&self, ttl: Duration) -> i64 {
        if ttl.is_zero() {
            return 0;
        }
        let ttl = i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX);
        self.now_nanos().saturating_add(ttl).max(1)
    }
}

pub(crate) struct TimerWheel {
    buckets: Vec<List>,
    clock: Clock,
    nanos: i64,
}

impl TimerWheel {
    pub(crate) fn new(clock: Clock) -> Self {
        let buckets = (0..TOTAL_BUCKETS)
            .map(|flat| List::new(ListId::bucket(flat), LinkKind::Wheel, 0))
            .collect();
        TimerWheel {
            buckets,
            nanos: clock.now_nanos(),
            clock,
        }
    }

    /// Wheel time of the last advance.
    pub(crate) fn nanos(&self) -> i64 {
        self.nanos
    }

    /// Number of scheduled items.
    pub(crate) fn len(&self) -> usize {
        self.buckets.iter().map(List::len).sum()
    }

    fn find_index(&self, expire: i64) -> (usize, usize) {
        // Overdue deadlines go to the current tick so the next advance sees them.
        let expire = expire.max(self.nanos);
        let duration = expire - self.nanos;
        for level in 0..LEVELS {
            if duration < SPANS[level + 1] {
                let ticks = expire >> SHIFTS[level];
                let slot = (ticks as usize) & (BUCKETS[level] - 1);
                return (level, slot);
            }
        }
        (LEVELS - 1, 0)
    }

    /// Files `h` under its deadline, moving it out of any bucket it was in.
    pub(crate) fn schedule<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) {
        self.deschedule(items, h);
        let (level, slot) = self.find_index(items[h].expire);
        self.buckets[OFFSETS[level] + slot].push_front(items, h);
    }

    /// Unlinks `h` from its bucket. No-op if it is not scheduled.
    pub(crate) fn deschedule<K>(&mut self, items: &mut Arena<Item<K>>, h: Handle) {
        let Some(flat) = items[h].wheel.owner.and_then(ListId::bucket_index) else {
            return;
        };
        self.buckets[flat].remove(items, h);
    }

    /// Moves wheel time to `now` (0 reads the clock) and returns every item
    /// whose deadline has passed, already unlinked from the wheel.
    pub(crate) fn advance<K>(&mut self, items: &mut Arena<Item<K>>, now: i64) -> Vec<Handle> {
        let now = if now == 0 { self.clock.now_nanos() } else { now };
        let previous = self.nanos;
        let mut expired = Vec::new();
        if now <= previous {
            return expired;
        }
        self.nanos = now;

        for level in 0..LEVELS {
            let prev_ticks = previous >> SHIFTS[level];
            let current_ticks = now >> SHIFTS[level];
            if current_ticks <= prev_ticks {
                break;
            }
            self.expire_level(items, level, prev_ticks, current_ticks - prev_ticks, &mut expired);
        }
        expired
    }

    fn expire_level<K>(
        &mut self,
        items: &mut Arena<Item<K>>,
        level: usize,
        prev_ticks: i64,
        delta: i64,
        expired: &mut Vec<Handle>,
    ) {
        let mask = BUCKETS[level] - 1;
        let steps = usize::try_from(delta)
            .map_or(BUCKETS[level], |d| d.saturating_add(1).min(BUCKETS[level]));
        let start = (prev_ticks as usize) & mask;
        for i in start..start + steps {
            // Detach the whole bucket first: a rescheduled item may hash back
            // into the bucket being visited.
            let due = self.buckets[OFFSETS[level] + (i & mask)].drain(items);
            for h in due {
                if items[h].expire <= self.nanos {
                    expired.push(h);
                } else {
                    self.schedule(items, h);
                }
            }
        }
    }

    /// Forgets every scheduled item; the caller clears the arena alongside.
    pub(crate) fn clear(&mut self) {
        self.buckets.iter_mut().for_each(List::reset);
    }
}

impl fmt::Debug for TimerWheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerWheel")
            .field("nanos", &self.nanos)
            .field("scheduled", &self.len())
            .finish()
    }
}

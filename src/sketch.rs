//! Count-min frequency sketch with 4-bit counters.
//!
//! Four rows of saturating nibble counters, two counters per byte. Instead of a
//! separate hash function per row, each row XORs its own random seed into the
//! key hash before masking. Counters saturate at 15 and are periodically halved
//! so that the sketch tracks recent popularity rather than all-time totals.

use core::fmt;

const DEPTH: usize = 4;
const MAX_COUNT: u8 = 15;
const MIN_COUNTERS: u64 = 16;

/// Approximate per-key frequency estimator.
pub struct CountMinSketch {
    rows: [Vec<u8>; DEPTH],
    seeds: [u64; DEPTH],
    mask: u64,
}

impl CountMinSketch {
    /// Creates a sketch with at least `counters` counters per row (rounded up to
    /// a power of two), seeded from the thread-local RNG.
    ///
    /// # Panics
    ///
    /// Panics if `counters` is zero.
    pub fn new(counters: u64) -> Self {
        Self::with_seeds(counters, [(); DEPTH].map(|_| rand::random::<u64>()))
    }

    /// Creates a sketch with explicit row seeds.
    ///
    /// # Panics
    ///
    /// Panics if `counters` is zero.
    pub fn with_seeds(counters: u64, seeds: [u64; DEPTH]) -> Self {
        assert!(counters > 0, "count-min sketch needs at least one counter");
        let counters = counters.next_power_of_two().max(MIN_COUNTERS);
        let bytes = usize::try_from(counters / 2).expect("sketch too large for address space");
        CountMinSketch {
            rows: [(); DEPTH].map(|_| vec![0u8; bytes]),
            seeds,
            mask: counters - 1,
        }
    }

    /// Number of counters in each row.
    pub fn width(&self) -> u64 {
        self.mask + 1
    }

    /// Bumps the counter for `hash` in every row, saturating at 15.
    pub fn increment(&mut self, hash: u64) {
        for (row, seed) in self.rows.iter_mut().zip(self.seeds) {
            let n = (hash ^ seed) & self.mask;
            let byte = &mut row[(n / 2) as usize];
            let shift = (n & 1) * 4;
            if (*byte >> shift) & 0x0f < MAX_COUNT {
                *byte += 1 << shift;
            }
        }
    }

    /// Returns the minimum counter for `hash` across rows.
    pub fn estimate(&self, hash: u64) -> u8 {
        self.rows
            .iter()
            .zip(self.seeds)
            .map(|(row, seed)| {
                let n = (hash ^ seed) & self.mask;
                (row[(n / 2) as usize] >> ((n & 1) * 4)) & 0x0f
            })
            .min()
            .unwrap_or(0)
    }

    /// Halves every counter (aging).
    pub fn reset(&mut self) {
        for row in &mut self.rows {
            for byte in row.iter_mut() {
                *byte = (*byte >> 1) & 0x77;
            }
        }
    }

    /// Zeroes every counter.
    pub fn clear(&mut self) {
        for row in &mut self.rows {
            row.iter_mut().for_each(|byte| *byte = 0);
        }
    }
}

impl fmt::Debug for CountMinSketch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountMinSketch")
            .field("depth", &DEPTH)
            .field("width", &self.width())
            .finish()
    }
}

//! Bloom-filter doorkeeper.
//!
//! The doorkeeper sits in front of admission: a key is only cached once it has
//! been offered at least twice. The first offer sets the key's bits and is
//! turned away; any later offer finds all bits set and is let through. The
//! filter is periodically reset by its owner so stale one-hit keys age out.

use core::fmt;

/// Fixed-size bit vector probed `k` times per 64-bit hash (double hashing).
pub struct BloomDoorkeeper {
    /// Number of bits, always a power of two.
    m: u32,
    /// Number of probes per insertion.
    k: u32,
    bits: Vec<u64>,
}

impl BloomDoorkeeper {
    /// Sizes a filter for `capacity` distinct keys at `false_positive_rate`.
    ///
    /// The bit count is `-C·ln(p)/ln(2)²` rounded up to a power of two and
    /// floored at 1024; the probe count is `max(2, ⌊0.7·m/C⌋)`.
    pub fn new(capacity: usize, false_positive_rate: f64) -> Self {
        let capacity = capacity.max(1) as f64;
        let ln2 = core::f64::consts::LN_2;
        let wanted = capacity * -false_positive_rate.ln() / (ln2 * ln2);
        let wanted = wanted.clamp(1.0, f64::from(1u32 << 31)) as u32;
        let m = wanted.next_power_of_two().max(1024);
        let k = ((0.7 * f64::from(m) / capacity) as u32).max(2);

        BloomDoorkeeper {
            m,
            k,
            bits: vec![0; (m as usize).div_ceil(64)],
        }
    }

    /// Number of bits in the filter.
    pub fn bits(&self) -> u32 {
        self.m
    }

    /// Number of probes per key.
    pub fn probes(&self) -> u32 {
        self.k
    }

    /// Records `hash`. Returns true only if every probed bit was already set,
    /// i.e. the key had (probably) been seen before.
    pub fn insert(&mut self, hash: u64) -> bool {
        let h1 = hash as u32;
        let h2 = (hash >> 32) as u32;
        let mask = self.m - 1;
        let mut seen = true;
        for i in 0..self.k {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) & mask;
            seen &= self.get_and_set(bit);
        }
        seen
    }

    /// Clears every bit.
    pub fn reset(&mut self) {
        self.bits.iter_mut().for_each(|word| *word = 0);
    }

    fn get_and_set(&mut self, bit: u32) -> bool {
        let word = &mut self.bits[(bit / 64) as usize];
        let mask = 1u64 << (bit % 64);
        let was_set = *word & mask != 0;
        *word |= mask;
        was_set
    }
}

impl fmt::Debug for BloomDoorkeeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomDoorkeeper")
            .field("bits", &self.m)
            .field("probes", &self.k)
            .finish()
    }
}

//! Counter-based pseudo-random generator.
//!
//! Value `n` of a stream is a pure function of `(seed, n)`:
//!
//! ```text
//! z = seed + (n + 1) * 0x9E3779B97F4A7C15          (wrapping u64)
//! z = (z ^ (z >> 30)) * 0xBF58476D1CE4E5B9
//! z = (z ^ (z >> 27)) * 0x94D049BB133111EB
//! z =  z ^ (z >> 31)
//! unit = (z >> 40) as f32 / 2^24                    in [0, 1)
//! ```
//!
//! This is the SplitMix64 finalizer, so a port only needs 64-bit wrapping
//! arithmetic to reproduce every sample bit for bit. Nothing reads the clock.

use serde::{Deserialize, Serialize};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Mix a stream position into 64 random bits.
pub fn mix(seed: u64, counter: u64) -> u64 {
    let mut z = seed.wrapping_add(counter.wrapping_add(1).wrapping_mul(GOLDEN_GAMMA));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Map 64 random bits onto [0, 1) with 24 bits of precision.
pub fn unit_from_bits(bits: u64) -> f32 {
    (bits >> 40) as f32 * (1.0 / (1u32 << 24) as f32)
}

/// A seeded stream whose only state is a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRng {
    seed: u64,
    counter: u64,
}

impl CounterRng {
    pub fn new(seed: u64) -> Self {
        Self { seed, counter: 0 }
    }

    /// Resume a stream at a saved position.
    pub fn at(seed: u64, counter: u64) -> Self {
        Self { seed, counter }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of values drawn so far.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn next_u64(&mut self) -> u64 {
        let bits = mix(self.seed, self.counter);
        self.counter = self.counter.wrapping_add(1);
        bits
    }

    /// Next value in [0, 1).
    pub fn next_unit(&mut self) -> f32 {
        unit_from_bits(self.next_u64())
    }

    /// Next value in [-scale, scale).
    pub fn next_symmetric(&mut self, scale: f32) -> f32 {
        (self.next_unit() * 2.0 - 1.0) * scale
    }

    pub fn rewind(&mut self) {
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        // SplitMix64 reference output for seed 0.
        assert_eq!(mix(0, 0), 0xE220_A839_7B1D_CDAF);
        assert_eq!(mix(0, 1), 0x6E78_9E6A_A1B9_65F4);
    }

    #[test]
    fn test_stream_is_pure_function_of_position() {
        let mut a = CounterRng::new(42);
        let first: Vec<u64> = (0..5).map(|_| a.next_u64()).collect();
        let mut b = CounterRng::at(42, 3);
        assert_eq!(b.next_u64(), first[3]);
        a.rewind();
        assert_eq!(a.next_u64(), first[0]);
    }

    #[test]
    fn test_unit_range() {
        let mut rng = CounterRng::new(7);
        for _ in 0..10_000 {
            let u = rng.next_unit();
            assert!((0.0..1.0).contains(&u));
        }
        assert_eq!(unit_from_bits(u64::MAX), 16_777_215.0 / 16_777_216.0);
        assert_eq!(unit_from_bits(0), 0.0);
    }

    #[test]
    fn test_symmetric_range() {
        let mut rng = CounterRng::new(9);
        for _ in 0..1000 {
            let v = rng.next_symmetric(0.5);
            assert!((-0.5..0.5).contains(&v));
        }
    }
}

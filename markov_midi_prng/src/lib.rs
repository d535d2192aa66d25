// Deterministic, portable pseudo-random number generator.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// Every random decision made while generating a note stream (seed-context
// choice, weighted next-symbol draws) goes through `SampleRng`, so a run is
// fully reproducible from its `u64` seed on any platform.
//
// **Critical constraint: determinism.** Every method must produce identical
// output given the same prior state, regardless of platform, compiler version,
// or optimization level. Integer sampling paths never touch floating point.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG used by the Markov generator.
///
/// Cloning a `SampleRng` forks the stream: both copies continue with the same
/// values, which tests use to replay a generation step by step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SampleRng {
    s: [u64; 4],
}

impl SampleRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a uniform random integer in `[low, high)`.
    ///
    /// Uses rejection sampling to avoid modulo bias.
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range; // = (2^64 - range) % range
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Generate a uniform random integer in `[low, high]` (inclusive on both
    /// ends). This is the draw the weighted picker makes over `[1, total]`.
    ///
    /// Panics if `low > high`.
    pub fn range_u64_inclusive(&mut self, low: u64, high: u64) -> u64 {
        assert!(low <= high, "range_u64_inclusive: low must be <= high");
        match high.checked_add(1) {
            Some(end) => self.range_u64(low, end),
            // [low, u64::MAX]: only the full range needs the raw output.
            None if low == 0 => self.next_u64(),
            None => self.range_u64(low - 1, high) + 1,
        }
    }

    /// Generate a uniform random `usize` in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }
}

/// SplitMix64, used only for seeding xoshiro256++ from a single `u64`.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determinism_same_seed_same_output() {
        let mut a = SampleRng::new(42);
        let mut b = SampleRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_different_output() {
        let mut a = SampleRng::new(42);
        let mut b = SampleRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn range_u64_within_bounds() {
        let mut rng = SampleRng::new(999);
        for _ in 0..10_000 {
            let v = rng.range_u64(10, 20);
            assert!((10..20).contains(&v), "range_u64 out of range: {v}");
        }
    }

    #[test]
    fn range_u64_inclusive_reaches_both_ends() {
        let mut rng = SampleRng::new(666);
        let mut seen = [false; 3];
        for _ in 0..10_000 {
            let v = rng.range_u64_inclusive(1, 3);
            assert!((1..=3).contains(&v), "inclusive draw out of range: {v}");
            seen[(v - 1) as usize] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn range_u64_inclusive_single_value() {
        let mut rng = SampleRng::new(7);
        for _ in 0..100 {
            assert_eq!(rng.range_u64_inclusive(5, 5), 5);
        }
    }

    #[test]
    fn range_u64_inclusive_top_of_domain() {
        let mut rng = SampleRng::new(8);
        for _ in 0..100 {
            assert!(rng.range_u64_inclusive(u64::MAX - 1, u64::MAX) >= u64::MAX - 1);
        }
        // Full domain must not panic.
        rng.range_u64_inclusive(0, u64::MAX);
    }

    #[test]
    fn range_usize_roughly_uniform() {
        let mut rng = SampleRng::new(555);
        let mut counts = [0u32; 4];
        let n = 40_000;
        for _ in 0..n {
            counts[rng.range_usize(0, 4)] += 1;
        }
        for (i, &c) in counts.iter().enumerate() {
            let pct = c as f64 / n as f64;
            assert!(
                (0.23..0.27).contains(&pct),
                "bucket {i} should be ~25%, got {:.1}%",
                pct * 100.0
            );
        }
    }

    #[test]
    fn serialization_roundtrip() {
        let mut rng = SampleRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: SampleRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }

    #[test]
    fn clone_forks_stream() {
        let mut a = SampleRng::new(3);
        a.next_u64();
        let mut b = a.clone();
        for _ in 0..50 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }
}

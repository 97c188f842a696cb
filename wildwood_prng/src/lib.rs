// Deterministic PRNG for the Wildwood simulation.
//
// xoshiro256++ (Blackman & Vigna, 2019), seeded through SplitMix64. The
// generator is hand-rolled so that creature IDs, spawn scatter, and the
// randomized index churn used in tests replay bit-for-bit on every platform.
//
// Only integer arithmetic is used inside the generator. Helpers that map the
// raw stream onto ranges use rejection sampling, never modulo folding, so a
// given seed always yields the same accepted values.
//
// See also: `wildwood_sim::types` which builds `SimUuid` from
// `next_128_bits()`, `wildwood_sim::sim` which owns the sim's `GameRng`.

use serde::{Deserialize, Serialize};

/// xoshiro256++ state. Cloning forks the stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRng {
    s: [u64; 4],
}

impl GameRng {
    /// Seed a generator. Equal seeds give equal streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        let mut s = [0u64; 4];
        for word in &mut s {
            *word = splitmix64(&mut sm);
        }
        Self { s }
    }

    pub fn next_u64(&mut self) -> u64 {
        let [s0, s1, s2, s3] = self.s;
        let result = s0.wrapping_add(s3).rotate_left(23).wrapping_add(s0);

        let t = s1 << 17;
        let s2 = s2 ^ s0;
        let s3 = s3 ^ s1;
        let s1 = s1 ^ s2;
        let s0 = s0 ^ s3;
        self.s = [s0, s1, s2 ^ t, s3.rotate_left(45)];

        result
    }

    /// Upper half of `next_u64()`; the high bits are the strongest.
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Sixteen bytes of output, little-endian, for UUID construction.
    pub fn next_128_bits(&mut self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.next_u64().to_le_bytes());
        out[8..].copy_from_slice(&self.next_u64().to_le_bytes());
        out
    }

    /// Uniform value in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: empty range {low}..{high}");
        let span = high - low;
        if span.is_power_of_two() {
            return low + (self.next_u64() & (span - 1));
        }
        // Values below `zone` would bias the low residues.
        let zone = span.wrapping_neg() % span;
        loop {
            let r = self.next_u64();
            if r >= zone {
                return low + r % span;
            }
        }
    }

    /// Uniform index in `[0, len)`. Panics on `len == 0`.
    pub fn index(&mut self, len: usize) -> usize {
        self.range_u64(0, len as u64) as usize
    }

    /// Uniform signed value in `[low, high]`, both ends inclusive.
    ///
    /// Grid coordinates are inclusive on both sides, so this is the form the
    /// spawn code and the index tests want.
    pub fn range_i32_inclusive(&mut self, low: i32, high: i32) -> i32 {
        assert!(low <= high, "range_i32_inclusive: {low} > {high}");
        let span = (high as i64 - low as i64 + 1) as u64;
        (low as i64 + self.range_u64(0, span) as i64) as i32
    }

    /// `true` with probability `numerator / denominator`.
    pub fn chance(&mut self, numerator: u32, denominator: u32) -> bool {
        assert!(denominator > 0, "chance: zero denominator");
        self.range_u64(0, denominator as u64) < numerator as u64
    }
}

/// SplitMix64 step, used only to expand the seed.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

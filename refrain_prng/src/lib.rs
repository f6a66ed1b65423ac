// Deterministic, portable pseudo-random number generator for Refrain.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// Hand-rolled with zero external dependencies (serde aside) so a given seed
// reproduces the same generated piece on every platform.
//
// Every stochastic step of generation (matrix fallback entries, the Markov
// walk, transition blending, chord growth, pause shaping) draws from one
// logical stream. Those call sites are written against the `RandomSource`
// trait rather than `RefrainRng` directly so tests can substitute a scripted
// sequence of draws and pin down exact branch decisions.
//
// **Critical constraint: determinism.** `RefrainRng` must produce identical
// output given the same prior state, regardless of platform, compiler version,
// or optimization level. No floating-point arithmetic in the core generator.

use serde::{Deserialize, Serialize};

/// The draws the generator needs from a random stream.
///
/// `next_f64` is the primitive; everything else is expressed in terms of
/// either it or `range_usize`.
pub trait RandomSource {
    /// A uniform `f64` in [0, 1).
    fn next_f64(&mut self) -> f64;

    /// A uniform `usize` in `[low, high)`. Panics if `low >= high`.
    fn range_usize(&mut self, low: usize, high: usize) -> usize;

    /// Return `true` with probability `p`. `p <= 0.0` is always false,
    /// `p >= 1.0` always true.
    fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick one element uniformly. `None` for an empty slice (no draw is
    /// consumed in that case).
    fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        Some(&items[self.range_usize(0, items.len())])
    }
}

/// Xoshiro256++ PRNG, the project's sole source of randomness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefrainRng {
    s: [u64; 4],
}

impl RefrainRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// SplitMix64 expands the seed into the 256-bit internal state, so
    /// nearby seeds still give unrelated streams.
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

    /// Seed from the system clock. Used by the CLI when no `--seed` is given;
    /// the chosen seed is reported so the run can be reproduced.
    pub fn from_entropy() -> (Self, u64) {
        let mut state = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let seed = splitmix64(&mut state);
        (Self::new(seed), seed)
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

    /// Uniform integer in `[low, high)` with rejection sampling, so there is
    /// no modulo bias. Panics if `low >= high`.
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
}

impl RandomSource for RefrainRng {
    /// Upper 53 bits of a `u64` fill the f64 mantissa (52 bits + implicit 1).
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range_usize(&mut self, low: usize, high: usize) -> usize {
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

//! Seeded deterministic random source.
//!
//! SplitMix64: small, fast, and fully reproducible from a `u64` seed. The
//! state sits in a `Cell` so conditions holding only a shared
//! `&SchedulerContext` can still roll dice.

use serde::{Deserialize, Serialize};
use std::cell::Cell;

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// Serializable state of a [`SeededRandom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomState {
    pub seed: u64,
    pub state: u64,
}

#[derive(Debug, Clone)]
pub struct SeededRandom {
    seed: u64,
    state: Cell<u64>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            state: Cell::new(seed),
        }
    }

    /// The seed this source was created (or last reseeded) with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the sequence from a new seed.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.state.set(seed);
    }

    pub fn next_u64(&self) -> u64 {
        let s = self.state.get().wrapping_add(GOLDEN_GAMMA);
        self.state.set(s);
        let mut z = s;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform float in `[0, 1)`.
    pub fn next(&self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// True with probability `p` (clamped to `[0, 1]`).
    pub fn chance(&self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.next() < p
    }

    /// Uniform integer in `[min, max]` (inclusive). Bounds may be given in
    /// either order.
    pub fn int(&self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let span = (hi as i128 - lo as i128 + 1) as u128;
        let offset = (self.next_u64() as u128 % span) as i128;
        (lo as i128 + offset) as i64
    }

    /// Pick one element uniformly, `None` for an empty slice.
    pub fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = (self.next_u64() % items.len() as u64) as usize;
        items.get(index)
    }

    pub fn snapshot(&self) -> RandomState {
        RandomState {
            seed: self.seed,
            state: self.state.get(),
        }
    }

    pub fn restore(&mut self, saved: RandomState) {
        self.seed = saved.seed;
        self.state.set(saved.state);
    }
}

impl Default for SeededRandom {
    fn default() -> Self {
        Self::new(0)
    }
}

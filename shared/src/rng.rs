//! Deterministic random number generation for the simulation.
//!
//! xorshift64: tiny, fast, and bit-identical on every platform. The
//! generator state is a single `u64` that travels inside snapshots, so a
//! replay from any snapshot reproduces the exact same spawn decisions.
//! Game logic must never touch a non-deterministic randomness source.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRng {
    state: u64,
}

impl GameRng {
    /// xorshift requires a non-zero state; seed 0 maps to 1.
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Restores a generator from a previously captured state.
    pub fn from_state(state: u64) -> Self {
        Self::new(state)
    }

    /// The current raw state, for capturing into snapshots.
    pub fn state(&self) -> u64 {
        self.state
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform f32 in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        // 24 high bits keep the value exactly representable.
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform f32 in `[min, max)`.
    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Uniform index into a collection of `len` elements. `len` must be
    /// non-zero.
    pub fn pick_index(&mut self, len: usize) -> usize {
        (self.next_u64() % len as u64) as usize
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::new(0x5eed_5eed)
    }
}

//! Key sampling and the tick-indexed local input log.

use macroquad::prelude::{is_key_down, KeyCode};
use shared::{Input, InputLog, Tick};

/// Owns the local input log: one entry per predicted tick, pruned as the
/// server confirms them, re-sent in redundant runs against packet loss.
pub struct InputManager {
    log: InputLog,
    synced: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            log: InputLog::new(),
            synced: false,
        }
    }

    /// Samples the movement and fire keys (WASD / arrows, space).
    pub fn sample() -> Input {
        Input {
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
            fire: is_key_down(KeyCode::Space),
        }
    }

    /// True once the log has been anchored to the server's timeline.
    pub fn synced(&self) -> bool {
        self.synced
    }

    /// Anchors the log to start right after the first confirmed server
    /// tick. The client does not invent tick numbers before it knows
    /// where the server's timeline stands.
    pub fn resync(&mut self, confirmed: Tick) {
        self.log = InputLog::with_start(confirmed + 1);
        self.synced = true;
    }

    /// Records the input for the next predicted tick and returns that
    /// tick.
    pub fn record(&mut self, input: Input) -> Tick {
        self.log.push_back(input);
        self.log.last()
    }

    /// Drops inputs at or below the confirmed tick.
    pub fn confirm(&mut self, confirmed: Tick) {
        self.log.discard_front_until(confirmed);
    }

    pub fn log(&self) -> &InputLog {
        &self.log
    }

    /// The newest `max` inputs as a bit-packed wire run.
    pub fn recent_run(&self, max: usize) -> (Tick, Vec<u8>) {
        let count = self.log.len().min(max);
        let first = self.log.last() - count as Tick + 1;
        let mut bytes = Vec::with_capacity(count);
        for tick in first..=self.log.last() {
            if let Some(input) = self.log.get(tick) {
                bytes.push(input.to_bits());
            }
        }
        (first, bytes)
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

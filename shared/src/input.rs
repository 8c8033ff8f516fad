//! Player input for one tick, bit-packable for the wire.

use crate::deque::TickDeque;
use serde::{Deserialize, Serialize};

/// The intents sampled at one tick. Losslessly representable as a single
/// byte, which is the form input runs take on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub fire: bool,
}

const UP: u8 = 1 << 0;
const DOWN: u8 = 1 << 1;
const LEFT: u8 = 1 << 2;
const RIGHT: u8 = 1 << 3;
const FIRE: u8 = 1 << 4;

impl Input {
    pub fn to_bits(self) -> u8 {
        let mut bits = 0;
        if self.up {
            bits |= UP;
        }
        if self.down {
            bits |= DOWN;
        }
        if self.left {
            bits |= LEFT;
        }
        if self.right {
            bits |= RIGHT;
        }
        if self.fire {
            bits |= FIRE;
        }
        bits
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            up: bits & UP != 0,
            down: bits & DOWN != 0,
            left: bits & LEFT != 0,
            right: bits & RIGHT != 0,
            fire: bits & FIRE != 0,
        }
    }

    pub fn is_idle(self) -> bool {
        self == Self::default()
    }
}

/// The tick-indexed log of local inputs.
pub type InputLog = TickDeque<Input>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_roundtrip() {
        let input = Input {
            up: true,
            down: false,
            left: true,
            right: false,
            fire: true,
        };
        assert_eq!(Input::from_bits(input.to_bits()), input);
        assert_eq!(Input::from_bits(0), Input::default());
    }

    #[test]
    fn test_bits_fit_low_five() {
        let all = Input {
            up: true,
            down: true,
            left: true,
            right: true,
            fire: true,
        };
        assert_eq!(all.to_bits(), 0b1_1111);
    }
}

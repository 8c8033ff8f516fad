//! Entities: the common base record plus player- and enemy-specific data.
//!
//! There is no entity hierarchy; which map of the world state an id lives
//! in is the discriminant. Health never mutates in place; it moves
//! through the `damaged` transition so cloned snapshots can never share a
//! hidden mutable cell with the live world.

use crate::deque::Tick;
use crate::physics::Vec2;
use serde::{Deserialize, Serialize};

/// Stable identity, immutable for the entity's lifetime.
pub type EntityId = u32;

/// State every entity carries regardless of kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCore {
    pub id: EntityId,
    /// Meters.
    pub position: Vec2,
    /// Meters per second.
    pub velocity: Vec2,
    /// Unit-ish direction the entity points; follows the last nonzero
    /// movement input (players) or chase direction (enemies).
    pub facing: Vec2,
    pub health: i32,
    pub max_health: i32,
}

impl EntityCore {
    pub fn new(id: EntityId, position: Vec2, max_health: i32) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            facing: Vec2::new(1.0, 0.0),
            health: max_health,
            max_health,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// The core after taking `amount` damage, floored at zero health.
    pub fn damaged(&self, amount: i32) -> Self {
        Self {
            health: (self.health - amount).max(0),
            ..self.clone()
        }
    }

    pub fn approx_eq(&self, other: &EntityCore, tolerance: f32) -> bool {
        self.id == other.id
            && self.health == other.health
            && self.max_health == other.max_health
            && self.position.approx_eq(other.position, tolerance)
            && self.velocity.approx_eq(other.velocity, tolerance)
            && self.facing.approx_eq(other.facing, tolerance)
    }
}

/// One equipped weapon. `last_fired` is an absolute tick, which is the
/// state that makes world snapshots tick-shiftable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub damage: i32,
    pub cooldown: Tick,
    pub last_fired: Tick,
}

impl Weapon {
    /// A weapon that is ready immediately.
    pub fn new(damage: i32, cooldown: Tick) -> Self {
        Self {
            damage,
            cooldown,
            last_fired: -cooldown,
        }
    }

    pub fn ready(&self, tick: Tick) -> bool {
        tick - self.last_fired >= self.cooldown
    }

    /// The weapon after firing at `tick`.
    pub fn fired(&self, tick: Tick) -> Self {
        Self {
            last_fired: tick,
            ..*self
        }
    }

    pub fn shift_ticks(&mut self, delta: Tick) {
        self.last_fired += delta;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub core: EntityCore,
    pub name: String,
    /// Only ever increases.
    pub score: u32,
    /// Optional click/AI destination; consumed by outer layers, carried
    /// through snapshots untouched.
    pub target: Option<Vec2>,
    /// Equipped weapons in slot order; slot 0 is the primary.
    pub weapons: Vec<Weapon>,
}

impl Player {
    pub fn new(id: EntityId, name: &str, position: Vec2, max_health: i32, weapon: Weapon) -> Self {
        Self {
            core: EntityCore::new(id, position, max_health),
            name: name.to_string(),
            score: 0,
            target: None,
            weapons: vec![weapon],
        }
    }

    pub fn approx_eq(&self, other: &Player, tolerance: f32) -> bool {
        let target_close = match (self.target, other.target) {
            (None, None) => true,
            (Some(a), Some(b)) => a.approx_eq(b, tolerance),
            _ => false,
        };
        self.core.approx_eq(&other.core, tolerance)
            && self.name == other.name
            && self.score == other.score
            && self.weapons == other.weapons
            && target_close
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub core: EntityCore,
    /// Damage dealt per contact strike.
    pub damage: i32,
    /// Score granted to the player that lands the kill.
    pub reward: u32,
}

impl Enemy {
    pub fn new(id: EntityId, position: Vec2, max_health: i32, damage: i32, reward: u32) -> Self {
        Self {
            core: EntityCore::new(id, position, max_health),
            damage,
            reward,
        }
    }

    pub fn approx_eq(&self, other: &Enemy, tolerance: f32) -> bool {
        self.core.approx_eq(&other.core, tolerance)
            && self.damage == other.damage
            && self.reward == other.reward
    }
}

//! The world state: every entity at one tick, plus the wave counter.

use crate::deque::Tick;
use crate::entity::{Enemy, EntityCore, EntityId, Player};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A snapshot of all entities at one tick.
///
/// Ids are unique within and disjoint across the two maps, and every id
/// must correspond to exactly one physics body in the owning simulation.
/// BTreeMap keeps iteration in ascending id order, which is what every
/// documented tie-break in the simulation relies on.
///
/// `wave` counts enemy spawns since the session began. It doubles as the
/// enemy id allocator (ids are `ENEMY_ID_BASE + wave`), so restoring a
/// snapshot restores id allocation along with everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub players: BTreeMap<EntityId, Player>,
    pub enemies: BTreeMap<EntityId, Enemy>,
    pub wave: u32,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.players.contains_key(&id) || self.enemies.contains_key(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.players.len() + self.enemies.len()
    }

    /// The common base record of the entity with `id`, whichever kind it
    /// is.
    pub fn core(&self, id: EntityId) -> Option<&EntityCore> {
        self.players
            .get(&id)
            .map(|p| &p.core)
            .or_else(|| self.enemies.get(&id).map(|e| &e.core))
    }

    pub fn core_mut(&mut self, id: EntityId) -> Option<&mut EntityCore> {
        if let Some(player) = self.players.get_mut(&id) {
            return Some(&mut player.core);
        }
        self.enemies.get_mut(&id).map(|e| &mut e.core)
    }

    /// Per-field closeness: identical structure and integers, float
    /// fields within `tolerance`. Physics drift makes exact float
    /// equality the wrong comparison between predicted and authoritative
    /// states.
    pub fn approx_eq(&self, other: &WorldState, tolerance: f32) -> bool {
        if self.wave != other.wave
            || self.players.len() != other.players.len()
            || self.enemies.len() != other.enemies.len()
        {
            return false;
        }
        for (id, player) in &self.players {
            match other.players.get(id) {
                Some(theirs) if player.approx_eq(theirs, tolerance) => {}
                _ => return false,
            }
        }
        for (id, enemy) in &self.enemies {
            match other.enemies.get(id) {
                Some(theirs) if enemy.approx_eq(theirs, tolerance) => {}
                _ => return false,
            }
        }
        true
    }

    /// Translates every internal tick reference (weapon fire times) by
    /// `delta`. A pure re-expression between wire-relative and local
    /// absolute tick bases; no semantic change.
    pub fn shift_ticks(&mut self, delta: Tick) {
        for player in self.players.values_mut() {
            for weapon in &mut player.weapons {
                weapon.shift_ticks(delta);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Weapon;
    use crate::physics::Vec2;

    fn world_with_player() -> WorldState {
        let mut world = WorldState::new();
        let player = Player::new(1, "ada", Vec2::new(2.0, 3.0), 10, Weapon::new(1, 6));
        world.players.insert(1, player);
        world
    }

    #[test]
    fn test_clone_is_deep() {
        let world = world_with_player();
        let mut copy = world.clone();
        copy.players.get_mut(&1).unwrap().core.position.x = 99.0;

        assert_eq!(world.players[&1].core.position.x, 2.0);
    }

    #[test]
    fn test_approx_eq_within_tolerance() {
        let world = world_with_player();
        let mut drifted = world.clone();
        drifted.players.get_mut(&1).unwrap().core.position.x += 5e-4;

        assert!(world.approx_eq(&drifted, 1e-3));
        assert!(!world.approx_eq(&drifted, 1e-5));
    }

    #[test]
    fn test_approx_eq_rejects_structural_differences() {
        let world = world_with_player();

        let mut extra = world.clone();
        extra
            .enemies
            .insert(2_000_000, Enemy::new(2_000_000, Vec2::ZERO, 3, 1, 10));
        assert!(!world.approx_eq(&extra, 1.0));

        let mut waved = world.clone();
        waved.wave += 1;
        assert!(!world.approx_eq(&waved, 1.0));
    }

    #[test]
    fn test_shift_ticks_roundtrips() {
        let mut world = world_with_player();
        world.players.get_mut(&1).unwrap().weapons[0] = Weapon::new(1, 6).fired(120);

        world.shift_ticks(-120);
        assert_eq!(world.players[&1].weapons[0].last_fired, 0);
        world.shift_ticks(120);
        assert_eq!(world.players[&1].weapons[0].last_fired, 120);
    }

    #[test]
    fn test_core_lookup_across_kinds() {
        let mut world = world_with_player();
        world
            .enemies
            .insert(1_000_000, Enemy::new(1_000_000, Vec2::new(5.0, 5.0), 3, 1, 10));

        assert_eq!(world.core(1).unwrap().id, 1);
        assert_eq!(world.core(1_000_000).unwrap().id, 1_000_000);
        assert!(world.core(42).is_none());
        assert_eq!(world.entity_count(), 2);
    }
}

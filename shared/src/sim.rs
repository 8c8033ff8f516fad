//! The deterministic simulation engine.
//!
//! One `Simulation` is the whole game at one tick: world state, physics
//! bodies, the map oracle and the deterministic generator. `advance`
//! performs exactly one fixed step given a source of per-entity input;
//! the server feeds it every networked player's input, the client feeds
//! it only the local player's (`SoloInput`). Given the same map, seed
//! and input sequence it is bit-reproducible, which is what makes
//! prediction replay possible at all.
//!
//! The central invariant is the entity/body bijection: every id in the
//! world state owns exactly one physics body and vice versa. Breaking it
//! is a bug, never a runtime condition, so violations panic on sight.

use crate::deque::Tick;
use crate::entity::{Enemy, EntityId, Player, Weapon};
use crate::input::Input;
use crate::map::{TileMap, UNREACHABLE};
use crate::physics::{PhysicsWorld, Vec2};
use crate::rng::GameRng;
use crate::world::WorldState;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("entity id {0} already exists")]
    DuplicateEntity(EntityId),
}

/// Per-entity input lookup for one tick. The server implements this over
/// everything the network delivered; the client implements it for the
/// local player only.
pub trait InputSource {
    fn input_for(&self, id: EntityId) -> Option<Input>;
}

impl InputSource for BTreeMap<EntityId, Input> {
    fn input_for(&self, id: EntityId) -> Option<Input> {
        self.get(&id).copied()
    }
}

/// Input for exactly one entity; everyone else coasts or follows AI.
#[derive(Debug, Clone, Copy)]
pub struct SoloInput {
    pub id: EntityId,
    pub input: Input,
}

impl InputSource for SoloInput {
    fn input_for(&self, id: EntityId) -> Option<Input> {
        (id == self.id).then_some(self.input)
    }
}

/// Tuning for one session. Defaults come from the crate constants; tests
/// pin `move_speed`/`step_dt` to make displacement arithmetic exact.
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    pub step_dt: f32,
    pub move_speed: f32,
    pub enemy_speed: f32,
    pub spawn_period: Tick,
    pub player_health: i32,
    pub enemy_health: i32,
    pub enemy_damage: i32,
    pub enemy_reward: u32,
    pub contact_range: f32,
    pub player_half: f32,
    pub enemy_half: f32,
    pub weapon_damage: i32,
    pub weapon_cooldown: Tick,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            step_dt: crate::STEP_DT,
            move_speed: crate::MOVE_SPEED,
            enemy_speed: crate::ENEMY_SPEED,
            spawn_period: crate::SPAWN_PERIOD,
            player_health: crate::PLAYER_MAX_HEALTH,
            enemy_health: crate::ENEMY_MAX_HEALTH,
            enemy_damage: crate::ENEMY_DAMAGE,
            enemy_reward: crate::ENEMY_REWARD,
            contact_range: crate::CONTACT_RANGE,
            player_half: crate::PLAYER_HALF,
            enemy_half: crate::ENEMY_HALF,
            weapon_damage: crate::WEAPON_DAMAGE,
            weapon_cooldown: crate::WEAPON_COOLDOWN,
        }
    }
}

/// World state paired with the generator state, captured immediately
/// after a step. The generator rides along because enemy spawning
/// consumes randomness; a replay from this snapshot reproduces the same
/// spawn decisions bit for bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: Tick,
    pub world: WorldState,
    pub rng: GameRng,
}

pub struct Simulation {
    map: Arc<TileMap>,
    config: SimConfig,
    tick: Tick,
    rng: GameRng,
    world: WorldState,
    physics: PhysicsWorld,
}

impl Simulation {
    pub fn new(map: Arc<TileMap>, config: SimConfig, seed: u64) -> Self {
        let physics = PhysicsWorld::from_map(&map);
        Self {
            map,
            config,
            tick: 0,
            rng: GameRng::new(seed),
            world: WorldState::new(),
            physics,
        }
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn map(&self) -> &Arc<TileMap> {
        &self.map
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Places a new player at a random point of a player spawn region.
    /// Fails if `id` already names a player or an enemy.
    pub fn add_player(&mut self, id: EntityId, name: &str) -> Result<(), SimError> {
        if self.world.contains(id) {
            return Err(SimError::DuplicateEntity(id));
        }
        let region_index = self.rng.pick_index(self.map.player_spawns.len());
        let position = self.map.player_spawns[region_index].random_point(&mut self.rng);

        let weapon = Weapon::new(self.config.weapon_damage, self.config.weapon_cooldown);
        let player = Player::new(id, name, position, self.config.player_health, weapon);
        self.physics.insert_body(id, position, self.config.player_half);
        self.world.players.insert(id, player);

        info!(
            "player {} ({}) spawned at ({:.2}, {:.2})",
            id, name, position.x, position.y
        );
        Ok(())
    }

    /// Removes a player and its body together. Returns whether the
    /// player existed.
    pub fn remove_player(&mut self, id: EntityId) -> bool {
        if self.world.players.remove(&id).is_none() {
            return false;
        }
        if !self.physics.remove_body(id) {
            panic!("player {id} had no physics body (entity/body bijection broken)");
        }
        info!("player {} removed", id);
        true
    }

    /// Advances by exactly one tick. The order is fixed: tick counter,
    /// spawn/strike/despawn cadence, enemy steering, input application
    /// and firing, one physics step, then write-back from bodies.
    pub fn advance(&mut self, inputs: &impl InputSource) {
        self.tick += 1;

        if self.tick % self.config.spawn_period == 0 {
            self.spawn_enemy();
            self.strike_players();
            self.despawn_dead_enemies();
        }

        self.steer_enemies();
        self.apply_inputs(inputs);
        self.physics.step(self.config.step_dt);
        self.sync_world_from_bodies();
    }

    /// Deep-copies the current state; shares nothing mutable with the
    /// live simulation.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            world: self.world.clone(),
            rng: self.rng.clone(),
        }
    }

    /// Rewinds to a snapshot: restores tick, generator and world, then
    /// reconciles bodies (survivors teleport, orphans are destroyed,
    /// missing ones are created). Leaves the bijection intact and is
    /// idempotent for a given snapshot.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.tick = snapshot.tick;
        self.rng = snapshot.rng.clone();
        self.world = snapshot.world.clone();

        let existing: Vec<EntityId> = self.physics.ids().collect();
        for id in existing {
            match self.world.core(id) {
                Some(core) => {
                    let (position, velocity) = (core.position, core.velocity);
                    self.physics.teleport(id, position, velocity);
                }
                None => {
                    self.physics.remove_body(id);
                }
            }
        }

        let mut missing: Vec<(EntityId, Vec2, f32)> = Vec::new();
        for (id, player) in &self.world.players {
            if !self.physics.contains(*id) {
                missing.push((*id, player.core.position, self.config.player_half));
            }
        }
        for (id, enemy) in &self.world.enemies {
            if !self.physics.contains(*id) {
                missing.push((*id, enemy.core.position, self.config.enemy_half));
            }
        }
        for (id, position, half) in missing {
            self.physics.insert_body(id, position, half);
            if let Some(core) = self.world.core(id) {
                let velocity = core.velocity;
                self.physics.teleport(id, position, velocity);
            }
        }
    }

    fn spawn_enemy(&mut self) {
        let id = crate::ENEMY_ID_BASE + self.world.wave;
        self.world.wave += 1;

        let region_index = self.rng.pick_index(self.map.enemy_spawns.len());
        let position = self.map.enemy_spawns[region_index].random_point(&mut self.rng);

        let enemy = Enemy::new(
            id,
            position,
            self.config.enemy_health,
            self.config.enemy_damage,
            self.config.enemy_reward,
        );
        self.physics.insert_body(id, position, self.config.enemy_half);
        self.world.enemies.insert(id, enemy);
        debug!("enemy {} spawned, wave {}", id, self.world.wave);
    }

    /// Each living enemy in contact range of a player strikes the
    /// lowest-id such player once.
    fn strike_players(&mut self) {
        let mut strikes: Vec<(EntityId, i32)> = Vec::new();
        for enemy in self.world.enemies.values() {
            if !enemy.core.is_alive() {
                continue;
            }
            for (player_id, player) in &self.world.players {
                if player.core.is_alive()
                    && enemy.core.position.distance(player.core.position)
                        <= self.config.contact_range
                {
                    strikes.push((*player_id, enemy.damage));
                    break;
                }
            }
        }
        for (player_id, damage) in strikes {
            if let Some(player) = self.world.players.get_mut(&player_id) {
                player.core = player.core.damaged(damage);
                if !player.core.is_alive() {
                    info!("player {} died", player_id);
                }
            }
        }
    }

    /// The only place the entity/body bijection is mutated for enemies:
    /// state entry and body go together or not at all.
    fn despawn_dead_enemies(&mut self) {
        let dead: Vec<EntityId> = self
            .world
            .enemies
            .iter()
            .filter(|(_, enemy)| !enemy.core.is_alive())
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            self.world.enemies.remove(&id);
            if !self.physics.remove_body(id) {
                panic!("enemy {id} had no physics body at despawn (entity/body bijection broken)");
            }
            debug!("enemy {} despawned", id);
        }
    }

    /// Steers every enemy one step toward the nearest living player by
    /// routing-table distance. Exact distance ties go to the lowest
    /// player id (ascending iteration plus a strictly-less comparison).
    fn steer_enemies(&mut self) {
        let mut headings: Vec<(EntityId, Vec2)> = Vec::new();

        for (enemy_id, enemy) in &self.world.enemies {
            let from = self.map.tile_at(enemy.core.position);

            let mut nearest: Option<(u16, Vec2, usize)> = None;
            for player in self.world.players.values() {
                if !player.core.is_alive() {
                    continue;
                }
                let to = self.map.tile_at(player.core.position);
                let distance = self.map.routing.distance(from, to);
                if distance == UNREACHABLE {
                    continue;
                }
                if nearest.map_or(true, |(best, _, _)| distance < best) {
                    nearest = Some((distance, player.core.position, to));
                }
            }

            let velocity = match nearest {
                None => Vec2::ZERO,
                Some((_, player_position, to)) => {
                    let target = if from == to {
                        player_position
                    } else {
                        match self.map.routing.next_hop(from, to) {
                            Some(hop) => self.map.tile_center(hop),
                            None => player_position,
                        }
                    };
                    (target - enemy.core.position)
                        .normalized()
                        .scale(self.config.enemy_speed)
                }
            };
            headings.push((*enemy_id, velocity));
        }

        for (id, velocity) in headings {
            let body = self
                .physics
                .body_mut(id)
                .unwrap_or_else(|| panic!("enemy {id} has no physics body (entity/body bijection broken)"));
            body.velocity = velocity;
            if velocity != Vec2::ZERO {
                if let Some(enemy) = self.world.enemies.get_mut(&id) {
                    enemy.core.facing = velocity.normalized();
                }
            }
        }
    }

    /// Applies 4-directional input: opposing presses cancel, a pressed
    /// axis gets the full movement speed, facing follows the last
    /// nonzero input pair. Fire casts toward facing. Dead players are
    /// stopped and ignore input.
    fn apply_inputs(&mut self, inputs: &impl InputSource) {
        let ids: Vec<EntityId> = self.world.players.keys().copied().collect();
        for id in ids {
            let alive = self.world.players[&id].core.is_alive();
            let body = self
                .physics
                .body_mut(id)
                .unwrap_or_else(|| panic!("player {id} has no physics body (entity/body bijection broken)"));

            if !alive {
                body.velocity = Vec2::ZERO;
                continue;
            }
            let Some(input) = inputs.input_for(id) else {
                continue;
            };

            let vx = (input.right as i8 - input.left as i8) as f32 * self.config.move_speed;
            let vy = (input.down as i8 - input.up as i8) as f32 * self.config.move_speed;
            let velocity = Vec2::new(vx, vy);
            body.velocity = velocity;

            if velocity != Vec2::ZERO {
                let facing = velocity.normalized();
                if let Some(player) = self.world.players.get_mut(&id) {
                    player.core.facing = facing;
                }
            }

            if input.fire {
                self.fire(id);
            }
        }
    }

    /// Casts from the shooter along its facing to the map boundary; the
    /// first living enemy hit takes the primary weapon's damage. A kill
    /// credits the enemy's reward to the shooter.
    fn fire(&mut self, shooter: EntityId) {
        let (origin, direction, damage) = {
            let Some(player) = self.world.players.get(&shooter) else {
                return;
            };
            let Some(weapon) = player.weapons.first() else {
                return;
            };
            if !weapon.ready(self.tick) {
                return;
            }
            (player.core.position, player.core.facing, weapon.damage)
        };

        if let Some(player) = self.world.players.get_mut(&shooter) {
            player.weapons[0] = player.weapons[0].fired(self.tick);
        }

        let enemies = &self.world.enemies;
        let hit = self.physics.raycast_first(origin, direction, |id| {
            enemies.get(&id).map_or(false, |enemy| enemy.core.is_alive())
        });
        let Some(hit) = hit else {
            return;
        };

        let enemy = self
            .world
            .enemies
            .get_mut(&hit)
            .unwrap_or_else(|| panic!("ray hit body {hit} with no enemy entity (entity/body bijection broken)"));
        enemy.core = enemy.core.damaged(damage);

        if !enemy.core.is_alive() {
            let reward = enemy.reward;
            debug!("enemy {} killed by player {}", hit, shooter);
            if let Some(player) = self.world.players.get_mut(&shooter) {
                player.score += reward;
            }
        }
    }

    /// Copies position and velocity from every body back into its world
    /// entity. Any mismatch between the body set and the entity set is a
    /// broken bijection.
    fn sync_world_from_bodies(&mut self) {
        if self.physics.len() != self.world.entity_count() {
            panic!(
                "physics world holds {} bodies for {} entities (entity/body bijection broken)",
                self.physics.len(),
                self.world.entity_count()
            );
        }
        let bodies: Vec<(EntityId, Vec2, Vec2)> = self
            .physics
            .bodies()
            .map(|body| (body.id, body.position, body.velocity))
            .collect();
        for (id, position, velocity) in bodies {
            let core = self
                .world
                .core_mut(id)
                .unwrap_or_else(|| panic!("body {id} has no world entity (entity/body bijection broken)"));
            core.position = position;
            core.velocity = velocity;
        }
    }
}

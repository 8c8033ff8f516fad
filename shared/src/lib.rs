//! Shared deterministic simulation core for the swarmgrid multiplayer game.
//!
//! Everything the client predicts and the server authorizes lives here:
//! the tick-indexed buffers, the world state model, the map oracle, the
//! fixed-step physics and the simulation engine that advances all of it.
//! The client and server crates differ only in which entities they feed
//! input to and in what they do with the resulting snapshots.

pub mod deque;
pub mod entity;
pub mod input;
pub mod map;
pub mod physics;
pub mod protocol;
pub mod rng;
pub mod sim;
pub mod world;

pub use deque::{EmptyBuffer, Tick, TickDeque};
pub use entity::{Enemy, EntityCore, EntityId, Player, Weapon};
pub use input::{Input, InputLog};
pub use map::{MapError, RoutingTable, SpawnRegion, TileMap};
pub use physics::{Aabb, Body, PhysicsWorld, Vec2};
pub use protocol::Packet;
pub use rng::GameRng;
pub use sim::{InputSource, SimConfig, SimError, Simulation, Snapshot, SoloInput};
pub use world::WorldState;

/// Simulation ticks per second; also the fixed physics step rate.
pub const TICK_RATE: u32 = 60;
/// Fixed update-step duration in seconds. Never stepped adaptively.
pub const STEP_DT: f32 = 1.0 / TICK_RATE as f32;

/// Player movement speed in meters per second.
pub const MOVE_SPEED: f32 = 4.0;
/// Enemy chase speed in meters per second.
pub const ENEMY_SPEED: f32 = 2.0;
/// Ticks between enemy spawn/despawn passes (one simulated second).
pub const SPAWN_PERIOD: Tick = TICK_RATE as Tick;

pub const PLAYER_MAX_HEALTH: i32 = 10;
pub const ENEMY_MAX_HEALTH: i32 = 3;
pub const ENEMY_DAMAGE: i32 = 1;
pub const ENEMY_REWARD: u32 = 10;
/// Distance within which an enemy can strike a player, in meters.
pub const CONTACT_RANGE: f32 = 0.75;

/// Half-extent of a player's collision box, in meters.
pub const PLAYER_HALF: f32 = 0.4;
/// Half-extent of an enemy's collision box, in meters.
pub const ENEMY_HALF: f32 = 0.35;

pub const WEAPON_DAMAGE: i32 = 1;
pub const WEAPON_COOLDOWN: Tick = 6;

/// Enemy ids live above this base; player ids are assigned below it.
/// Enemy id allocation is `ENEMY_ID_BASE + wave`, so it replays exactly
/// when a snapshot (which carries the wave counter) is restored.
pub const ENEMY_ID_BASE: EntityId = 1_000_000;

/// Per-field float tolerance for world-state similarity checks. Physics
/// accumulates rounding drift, so exact equality is the wrong test.
pub const SIMILARITY_TOLERANCE: f32 = 1e-3;

pub const PROTOCOL_VERSION: u32 = 1;

//! The authoritative game: the shared simulation plus the broadcast
//! cadence and wire encoding of truth updates.

use shared::{
    EntityId, Input, MapError, Packet, SimConfig, SimError, Simulation, Tick, TileMap, WorldState,
};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct ServerGame {
    sim: Simulation,
    seed: u64,
    broadcast_period: Tick,
}

impl ServerGame {
    pub fn new(map_name: &str, seed: u64, broadcast_period: Tick) -> Result<Self, MapError> {
        let map = Arc::new(TileMap::load(map_name)?);
        Ok(Self {
            sim: Simulation::new(map, SimConfig::default(), seed),
            seed,
            broadcast_period,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn map_name(&self) -> &str {
        &self.sim.map().name
    }

    pub fn tick(&self) -> Tick {
        self.sim.tick()
    }

    pub fn world(&self) -> &WorldState {
        self.sim.world()
    }

    pub fn add_player(&mut self, id: EntityId, name: &str) -> Result<(), SimError> {
        self.sim.add_player(id, name)
    }

    pub fn remove_player(&mut self, id: EntityId) -> bool {
        self.sim.remove_player(id)
    }

    /// Advances one tick with everything the network delivered for it.
    pub fn advance(&mut self, inputs: &BTreeMap<EntityId, Input>) {
        self.sim.advance(inputs);
    }

    /// The wire-form authoritative update for the current tick, if this
    /// tick is on the broadcast cadence. Weapon tick references are
    /// shifted relative to the snapshot tick; the generator state rides
    /// along so corrected clients predict the same spawns.
    pub fn truth_packet(&self) -> Option<Packet> {
        if self.sim.tick() == 0 || self.sim.tick() % self.broadcast_period != 0 {
            return None;
        }
        let snapshot = self.sim.snapshot();
        let mut world = snapshot.world;
        world.shift_ticks(-snapshot.tick);
        Some(Packet::Truth {
            tick: snapshot.tick,
            world,
            rng_state: snapshot.rng.state(),
        })
    }
}

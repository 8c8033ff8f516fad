//! The client's specialization of the simulation engine: it knows which
//! entity is "mine" and only ever applies fresh input to that one.

use shared::{
    EntityId, Input, SimConfig, Simulation, Snapshot, SoloInput, Tick, TileMap, WorldState,
};
use std::sync::Arc;

pub struct ClientSim {
    sim: Simulation,
    my_id: EntityId,
}

impl ClientSim {
    pub fn new(map: Arc<TileMap>, config: SimConfig, seed: u64, my_id: EntityId) -> Self {
        Self {
            sim: Simulation::new(map, config, seed),
            my_id,
        }
    }

    pub fn my_id(&self) -> EntityId {
        self.my_id
    }

    pub fn tick(&self) -> Tick {
        self.sim.tick()
    }

    pub fn world(&self) -> &WorldState {
        self.sim.world()
    }

    pub fn map(&self) -> &Arc<TileMap> {
        self.sim.map()
    }

    /// Advances one tick, applying `input` to the local entity only.
    /// Other entities coast on their last known velocity or follow AI.
    pub fn update(&mut self, input: Input) {
        let solo = SoloInput {
            id: self.my_id,
            input,
        };
        self.sim.advance(&solo);
    }

    /// Rewinds to a snapshot, reconciling physics bodies with the
    /// snapshot's entities.
    pub fn reset(&mut self, snapshot: &Snapshot) {
        self.sim.restore(snapshot);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.sim.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_map() -> Arc<TileMap> {
        Arc::new(
            TileMap::from_ascii(
                "clientsim",
                &[
                    "##########",
                    "#........#",
                    "#.P..P...#",
                    "#........#",
                    "#.......E#",
                    "##########",
                ],
            )
            .unwrap(),
        )
    }

    const RIGHT: Input = Input {
        up: false,
        down: false,
        left: false,
        right: true,
        fire: false,
    };

    fn seeded_pair(seed: u64) -> (Simulation, ClientSim) {
        let mut server = Simulation::new(test_map(), SimConfig::default(), seed);
        server.add_player(1, "ada").unwrap();
        server.add_player(2, "bob").unwrap();
        let mut client = ClientSim::new(test_map(), SimConfig::default(), seed, 1);
        client.reset(&server.snapshot());
        (server, client)
    }

    #[test]
    fn test_update_moves_only_the_local_player() {
        let (_, mut client) = seeded_pair(5);
        let other_before = client.world().players[&2].core.position;
        let mine_before = client.world().players[&1].core.position;

        for _ in 0..5 {
            client.update(RIGHT);
        }

        assert!(client.world().players[&1].core.position.x > mine_before.x);
        assert_eq!(client.world().players[&2].core.position, other_before);
    }

    #[test]
    fn test_reset_then_replay_matches_straight_run() {
        let (_, mut client) = seeded_pair(5);
        let checkpoint = client.snapshot();

        for _ in 0..10 {
            client.update(RIGHT);
        }
        let straight = client.snapshot();

        client.reset(&checkpoint);
        for _ in 0..10 {
            client.update(RIGHT);
        }
        let replayed = client.snapshot();

        assert_eq!(replayed.tick, straight.tick);
        assert!(replayed.world.approx_eq(&straight.world, 0.0));
    }

    #[test]
    fn test_snapshot_is_detached_from_live_world() {
        let (_, mut client) = seeded_pair(5);
        let snapshot = client.snapshot();
        let before = snapshot.world.players[&1].core.position;

        client.update(RIGHT);

        assert_eq!(snapshot.world.players[&1].core.position, before);
    }
}

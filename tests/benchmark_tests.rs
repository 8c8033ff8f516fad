//! Performance sanity checks for the prediction-critical paths

use client::predictor::{ActivePredictor, Predictor};
use client::sim::ClientSim;
use shared::{EntityId, Input, InputLog, SimConfig, Simulation, TileMap};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

const RIGHT: Input = Input {
    up: false,
    down: false,
    left: false,
    right: true,
    fire: false,
};

fn arena() -> Arc<TileMap> {
    Arc::new(TileMap::load("arena").unwrap())
}

fn idle() -> BTreeMap<EntityId, Input> {
    BTreeMap::new()
}

/// Benchmarks raw simulation advancement with a populated world.
#[test]
fn benchmark_simulation_advance() {
    let mut sim = Simulation::new(arena(), SimConfig::default(), 42);
    for id in 1..=4 {
        sim.add_player(id, &format!("p{id}")).unwrap();
    }
    let mut inputs = idle();
    for id in 1..=4 {
        inputs.insert(id, RIGHT);
    }

    let ticks = 600; // ten simulated seconds
    let start = Instant::now();
    for _ in 0..ticks {
        sim.advance(&inputs);
    }
    let duration = start.elapsed();

    println!(
        "simulation advance: {} ticks in {:?} ({:.2} µs/tick, {} enemies at end)",
        ticks,
        duration,
        duration.as_micros() as f64 / ticks as f64,
        sim.world().enemies.len()
    );

    // Ten simulated seconds should take far less than two wall seconds.
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the snapshot/restore pair the predictor leans on.
#[test]
fn benchmark_snapshot_and_restore() {
    let mut sim = Simulation::new(arena(), SimConfig::default(), 42);
    for id in 1..=4 {
        sim.add_player(id, &format!("p{id}")).unwrap();
    }
    // Populate the world with a few waves of enemies.
    for _ in 0..300 {
        sim.advance(&idle());
    }

    let iterations = 1000;
    let start = Instant::now();
    let mut snapshots = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        snapshots.push(sim.snapshot());
    }
    let snapshot_time = start.elapsed();

    let start = Instant::now();
    for snapshot in &snapshots {
        sim.restore(snapshot);
    }
    let restore_time = start.elapsed();

    println!(
        "snapshot: {:.2} µs each, restore: {:.2} µs each",
        snapshot_time.as_micros() as f64 / iterations as f64,
        restore_time.as_micros() as f64 / iterations as f64
    );

    assert!(snapshot_time.as_millis() < 1000);
    assert!(restore_time.as_millis() < 2000);
}

/// Benchmarks the reconciliation slow path: rewind plus a full replay of
/// unconfirmed inputs.
#[test]
fn benchmark_reconciliation_replay() {
    let mut server = Simulation::new(arena(), SimConfig::default(), 42);
    server.add_player(1, "ada").unwrap();

    let mut sim = ClientSim::new(arena(), SimConfig::default(), 42, 1);
    sim.reset(&server.snapshot());
    let mut predictor = ActivePredictor::new(sim);

    let rounds = 20;
    let window = 30; // half a second of fresh input per round
    let confirmed = 15; // the server confirms only half of it
    let mut log = InputLog::with_start(1);

    let start = Instant::now();
    for _ in 0..rounds {
        for _ in 0..window {
            log.push_back(RIGHT);
        }
        predictor.predict(&log);

        // Feed a truth the prediction cannot match (idle server) so
        // every round takes the rewind-and-replay path, with a growing
        // tail of unconfirmed inputs to replay.
        for _ in 0..confirmed {
            server.advance(&idle());
        }
        log.discard_front_until(server.tick());

        let mut truth = server.snapshot();
        truth.world.shift_ticks(-truth.tick);
        predictor.set_truth(truth, &log);
    }
    let duration = start.elapsed();

    println!(
        "reconciliation: {} rewinds in {:?} ({:.2} ms each)",
        rounds,
        duration,
        duration.as_millis() as f64 / rounds as f64
    );

    assert_eq!(predictor.state_num(), (rounds * window) as i64);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks authoritative update encoding and bounds its size.
#[test]
fn benchmark_truth_encoding() {
    let config = SimConfig {
        spawn_period: 1,
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(arena(), config, 42);
    // No players: enemies accumulate without dying.
    for _ in 0..200 {
        sim.advance(&idle());
    }
    assert_eq!(sim.world().enemies.len(), 200);

    let snapshot = sim.snapshot();
    let packet = shared::Packet::Truth {
        tick: snapshot.tick,
        world: snapshot.world.clone(),
        rng_state: snapshot.rng.state(),
    };

    let iterations = 1000;
    let start = Instant::now();
    let mut encoded_len = 0;
    for _ in 0..iterations {
        encoded_len = bincode::serialize(&packet).unwrap().len();
    }
    let duration = start.elapsed();

    println!(
        "truth encoding: {} bytes, {:.2} µs each",
        encoded_len,
        duration.as_micros() as f64 / iterations as f64
    );

    // A worst-case update must still fit comfortably in one datagram
    // burst.
    assert!(encoded_len < 32 * 1024);
    assert!(duration.as_millis() < 2000);
}

//! Client-side prediction with server reconciliation.
//!
//! The active predictor owns a rolling window of predicted snapshots,
//! one per tick, where the entry at tick T is the world *after* the
//! input for T was applied. `predict` extends the window from the local
//! input log; `set_truth` reconciles it against an authoritative
//! snapshot, keeping the prediction when it already agrees within
//! tolerance and otherwise rewinding to the corrected tick to replay
//! every logged input forward.
//!
//! Remote peers do not replay anything; the no-op variant just records
//! the newest authoritative state.

use crate::sim::ClientSim;
use log::{debug, warn};
use shared::{GameRng, InputLog, Snapshot, Tick, TickDeque, WorldState};

pub trait Predictor {
    /// Extends the prediction using the unconsumed tail of the local
    /// input log. No-op for remote peers.
    fn predict(&mut self, input_log: &InputLog);

    /// Reconciles against an authoritative snapshot (wire form: tick
    /// references relative to its own tick). `input_log` must cover the
    /// ticks after the snapshot's tick. Stale snapshots are dropped
    /// silently.
    fn set_truth(&mut self, truth: Snapshot, input_log: &InputLog);

    /// The newest known world state.
    fn state(&self) -> &WorldState;

    /// The tick the newest state belongs to.
    fn state_num(&self) -> Tick;
}

/// Records the latest authoritative state for a non-local peer and
/// never replays.
pub struct RemotePredictor {
    latest: Snapshot,
}

impl RemotePredictor {
    pub fn new() -> Self {
        Self {
            latest: Snapshot {
                tick: 0,
                world: WorldState::new(),
                rng: GameRng::default(),
            },
        }
    }
}

impl Default for RemotePredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Predictor for RemotePredictor {
    fn predict(&mut self, _input_log: &InputLog) {}

    fn set_truth(&mut self, mut truth: Snapshot, _input_log: &InputLog) {
        if truth.tick <= self.latest.tick {
            debug!(
                "dropping stale authoritative update for tick {} (have {})",
                truth.tick, self.latest.tick
            );
            return;
        }
        truth.world.shift_ticks(truth.tick);
        self.latest = truth;
    }

    fn state(&self) -> &WorldState {
        &self.latest.world
    }

    fn state_num(&self) -> Tick {
        self.latest.tick
    }
}

/// The CSP controller for the local player.
pub struct ActivePredictor {
    /// Newest authoritative tick seen; only ever increases.
    latest_confirmed: Tick,
    /// Contiguous predicted snapshots, oldest retained entry first.
    window: TickDeque<Snapshot>,
    sim: ClientSim,
    tolerance: f32,
}

impl ActivePredictor {
    /// Seeds the window with one snapshot of the just-constructed
    /// simulation.
    pub fn new(sim: ClientSim) -> Self {
        Self::with_tolerance(sim, shared::SIMILARITY_TOLERANCE)
    }

    pub fn with_tolerance(sim: ClientSim, tolerance: f32) -> Self {
        let seed = sim.snapshot();
        let mut window = TickDeque::with_start(seed.tick);
        window.push_back(seed);
        Self {
            latest_confirmed: 0,
            window,
            sim,
            tolerance,
        }
    }

    pub fn latest_confirmed(&self) -> Tick {
        self.latest_confirmed
    }

    /// The tick range currently held by the prediction window.
    pub fn window_range(&self) -> (Tick, Tick) {
        (self.window.first(), self.window.last())
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn map(&self) -> &std::sync::Arc<shared::TileMap> {
        self.sim.map()
    }

    fn newest(&self) -> &Snapshot {
        self.window
            .get(self.window.last())
            .unwrap_or_else(|| panic!("prediction window is empty"))
    }
}

impl Predictor for ActivePredictor {
    fn predict(&mut self, input_log: &InputLog) {
        if input_log.is_empty() {
            return;
        }

        let newest = self.window.last();
        if input_log.first() > newest + 1 {
            warn!(
                "input history starts at tick {} but prediction ends at tick {}; skipping",
                input_log.first(),
                newest
            );
            return;
        }

        for tick in (newest + 1)..=input_log.last() {
            // The log is gapless by construction, so every tick in the
            // range has an input; a hole here is a caller bug.
            let Some(input) = input_log.get(tick) else {
                warn!("input log has no entry for tick {}; aborting prediction", tick);
                return;
            };
            self.sim.update(*input);
            self.window.push_back(self.sim.snapshot());
        }
    }

    fn set_truth(&mut self, mut truth: Snapshot, input_log: &InputLog) {
        if truth.tick <= self.latest_confirmed {
            debug!(
                "dropping stale authoritative update for tick {} (confirmed {})",
                truth.tick, self.latest_confirmed
            );
            return;
        }
        self.latest_confirmed = truth.tick;

        // Entries older than the input log minus a two-tick margin can
        // never be a rewind point again.
        self.window.discard_front_until(input_log.first() - 2);

        // Wire snapshots carry tick references relative to their own
        // tick; re-express them in the local absolute base.
        truth.world.shift_ticks(truth.tick);

        // Fast path: the oldest retained prediction already agrees with
        // the server within tolerance, so the whole window ahead of it
        // is still valid. Most updates take this path; replaying every
        // time would throw away perfectly good recent predictions.
        if let Some(oldest) = self.window.get(self.window.first()) {
            if oldest.world.approx_eq(&truth.world, self.tolerance) {
                debug!("authoritative tick {} matches prediction", truth.tick);
                return;
            }
        }

        // Slow path: rewind. Overwrite the window entry just before the
        // unconfirmed inputs with the authoritative state (fabricating
        // one when absent, which is also how a freshly joined client
        // bootstraps), collapse the window to it, reset the simulation
        // and replay the whole log.
        let rewind_tick = input_log.first() - 1;
        let mut corrected = match self.window.get(rewind_tick) {
            Some(snapshot) => snapshot.clone(),
            None => self.sim.snapshot(),
        };
        corrected.tick = rewind_tick;
        corrected.world = truth.world;
        corrected.rng = truth.rng;

        debug!(
            "rewinding to tick {} and replaying {} inputs",
            rewind_tick,
            input_log.len()
        );

        self.sim.reset(&corrected);
        let mut window = TickDeque::with_start(rewind_tick);
        window.push_back(corrected);
        self.window = window;

        for (_, input) in input_log.iter() {
            self.sim.update(*input);
            self.window.push_back(self.sim.snapshot());
        }
    }

    fn state(&self) -> &WorldState {
        &self.newest().world
    }

    fn state_num(&self) -> Tick {
        self.sim.tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Input, SimConfig, Simulation, TileMap};
    use std::sync::Arc;

    const RIGHT: Input = Input {
        up: false,
        down: false,
        left: false,
        right: true,
        fire: false,
    };

    fn test_map() -> Arc<TileMap> {
        Arc::new(
            TileMap::from_ascii(
                "predict",
                &[
                    "##########",
                    "#........#",
                    "#.P......#",
                    "#........#",
                    "#.......E#",
                    "##########",
                ],
            )
            .unwrap(),
        )
    }

    fn test_config() -> SimConfig {
        SimConfig {
            move_speed: 2.0,
            step_dt: 1.0 / 60.0,
            ..SimConfig::default()
        }
    }

    /// A server simulation and a predictor bootstrapped from its tick-0
    /// snapshot, sharing seed and tuning.
    fn setup(seed: u64) -> (Simulation, ActivePredictor) {
        let mut server = Simulation::new(test_map(), test_config(), seed);
        server.add_player(1, "ada").unwrap();

        let mut sim = ClientSim::new(test_map(), test_config(), seed, 1);
        sim.reset(&server.snapshot());
        (server, ActivePredictor::new(sim))
    }

    /// Encodes a snapshot the way it travels: tick references relative
    /// to the snapshot's own tick.
    fn wire(mut snapshot: Snapshot) -> Snapshot {
        snapshot.world.shift_ticks(-snapshot.tick);
        snapshot
    }

    fn log_of(first: Tick, inputs: &[Input]) -> InputLog {
        let mut log = InputLog::with_start(first);
        for input in inputs {
            log.push_back(*input);
        }
        log
    }

    #[test]
    fn test_predict_extends_window_per_logged_tick() {
        let (_, mut predictor) = setup(42);
        assert_eq!(predictor.state_num(), 0);

        let log = log_of(1, &[RIGHT, RIGHT, RIGHT]);
        predictor.predict(&log);

        assert_eq!(predictor.state_num(), 3);
        assert_eq!(predictor.window_range(), (0, 3));
        assert_eq!(predictor.window_len(), 4);
    }

    #[test]
    fn test_predict_empty_log_is_noop() {
        let (_, mut predictor) = setup(42);
        predictor.predict(&InputLog::new());
        assert_eq!(predictor.state_num(), 0);
        assert_eq!(predictor.window_len(), 1);
    }

    #[test]
    fn test_predict_rejects_truncated_history() {
        let (_, mut predictor) = setup(42);
        let before = predictor.state().clone();

        // History starts well past the newest prediction: unsafe.
        let log = log_of(10, &[RIGHT, RIGHT]);
        predictor.predict(&log);

        assert_eq!(predictor.state_num(), 0);
        assert!(predictor.state().approx_eq(&before, 0.0));
    }

    #[test]
    fn test_predict_is_incremental() {
        let (_, mut predictor) = setup(42);
        let mut log = log_of(1, &[RIGHT, RIGHT]);
        predictor.predict(&log);
        assert_eq!(predictor.state_num(), 2);

        // Re-predicting with the same log adds nothing.
        predictor.predict(&log);
        assert_eq!(predictor.state_num(), 2);

        log.push_back(RIGHT);
        predictor.predict(&log);
        assert_eq!(predictor.state_num(), 3);
        assert_eq!(predictor.window_range(), (0, 3));
    }

    #[test]
    fn test_matching_truth_takes_fast_path() {
        let (mut server, mut predictor) = setup(42);

        let mut log = log_of(1, &[RIGHT, RIGHT, RIGHT]);
        predictor.predict(&log);
        let predicted = predictor.state().clone();

        // The server processed the same inputs up to tick 2.
        for _ in 0..2 {
            server.advance(&shared::SoloInput { id: 1, input: RIGHT });
        }
        log.discard_front_until(server.tick());
        predictor.set_truth(wire(server.snapshot()), &log);

        // Prediction survives untouched: same tick, same state.
        assert_eq!(predictor.state_num(), 3);
        assert!(predictor.state().approx_eq(&predicted, 0.0));
        assert_eq!(predictor.latest_confirmed(), 2);
    }

    #[test]
    fn test_diverged_truth_rewinds_and_replays() {
        let (mut server, mut predictor) = setup(42);
        let spawn = server.world().players[&1].core.position;

        let mut log = log_of(1, &[RIGHT, RIGHT, RIGHT]);
        predictor.predict(&log);
        assert_approx_eq!(
            predictor.state().players[&1].core.position.x - spawn.x,
            3.0 * 2.0 / 60.0,
            1e-6
        );

        // The server lost the tick-2 input: it saw movement for tick 1
        // and an idle tick 2, so its displacement is one tick's worth.
        server.advance(&shared::SoloInput { id: 1, input: RIGHT });
        server.advance(&shared::SoloInput {
            id: 1,
            input: Input::default(),
        });
        let authoritative = server.snapshot();
        assert_approx_eq!(
            authoritative.world.players[&1].core.position.x - spawn.x,
            1.0 * 2.0 / 60.0,
            1e-6
        );

        log.discard_front_until(server.tick());
        predictor.set_truth(wire(authoritative.clone()), &log);

        // The correction overrode the drift: one confirmed tick of
        // movement plus the replayed tick 3, not the original three.
        assert_eq!(predictor.state_num(), 3);
        assert_approx_eq!(
            predictor.state().players[&1].core.position.x - spawn.x,
            2.0 * 2.0 / 60.0,
            1e-6
        );

        // And the result equals a fresh simulation reset to the
        // corrected snapshot replaying the same input.
        let mut check = ClientSim::new(test_map(), test_config(), 42, 1);
        check.reset(&authoritative);
        check.update(RIGHT);
        assert!(predictor.state().approx_eq(check.world(), 1e-6));
    }

    #[test]
    fn test_stale_truth_is_dropped() {
        let (mut server, mut predictor) = setup(42);

        let mut log = log_of(1, &[RIGHT, RIGHT, RIGHT]);
        predictor.predict(&log);

        for _ in 0..2 {
            server.advance(&shared::SoloInput { id: 1, input: RIGHT });
        }
        log.discard_front_until(server.tick());
        predictor.set_truth(wire(server.snapshot()), &log);

        let state_before = predictor.state().clone();
        let tick_before = predictor.state_num();

        // A reordered datagram delivers an older (and nonsensical)
        // snapshot; it must change nothing.
        let mut stale = server.snapshot();
        stale.tick = 1;
        stale
            .world
            .players
            .get_mut(&1)
            .unwrap()
            .core
            .position
            .x = 999.0;
        predictor.set_truth(wire(stale), &log);

        assert_eq!(predictor.state_num(), tick_before);
        assert!(predictor.state().approx_eq(&state_before, 0.0));
        assert_eq!(predictor.latest_confirmed(), 2);
    }

    #[test]
    fn test_window_stays_contiguous_and_pruned() {
        let (mut server, mut predictor) = setup(42);

        let mut log = log_of(1, &[]);
        for round in 0..5i64 {
            for _ in 0..4 {
                log.push_back(RIGHT);
            }
            predictor.predict(&log);

            for _ in 0..4 {
                server.advance(&shared::SoloInput { id: 1, input: RIGHT });
            }
            log.discard_front_until(server.tick());
            predictor.set_truth(wire(server.snapshot()), &log);

            let (first, last) = predictor.window_range();
            assert_eq!(last, (round + 1) * 4);
            assert_eq!(predictor.window_len() as i64, last - first + 1);
            // Confirmed history is pruned away, keeping the window small.
            assert!(first >= log.first() - 2);
        }
    }

    #[test]
    fn test_mid_session_join_bootstraps_from_truth() {
        // A server that has been running for a while.
        let mut server = Simulation::new(test_map(), test_config(), 9);
        server.add_player(1, "ada").unwrap();
        for _ in 0..130 {
            server.advance(&shared::SoloInput { id: 1, input: RIGHT });
        }

        // A fresh client joins: empty world, empty log anchored to the
        // first truth it receives.
        let sim = ClientSim::new(test_map(), test_config(), 9, 1);
        let mut predictor = ActivePredictor::new(sim);
        let log = InputLog::with_start(server.tick() + 1);
        predictor.set_truth(wire(server.snapshot()), &log);

        assert_eq!(predictor.state_num(), 130);
        assert!(predictor.state().approx_eq(server.world(), 1e-4));

        // Prediction continues seamlessly from the adopted timeline.
        let mut log = log;
        log.push_back(RIGHT);
        predictor.predict(&log);
        assert_eq!(predictor.state_num(), 131);
    }

    #[test]
    fn test_remote_predictor_records_without_replaying() {
        let mut server = Simulation::new(test_map(), test_config(), 4);
        server.add_player(1, "ada").unwrap();
        server.advance(&shared::SoloInput { id: 1, input: RIGHT });

        let mut remote = RemotePredictor::new();
        remote.predict(&log_of(1, &[RIGHT, RIGHT]));
        assert_eq!(remote.state_num(), 0);

        remote.set_truth(wire(server.snapshot()), &InputLog::new());
        assert_eq!(remote.state_num(), 1);
        assert!(remote.state().approx_eq(server.world(), 0.0));

        // Stale updates are ignored here too.
        let mut stale = server.snapshot();
        stale.tick = 0;
        remote.set_truth(wire(stale), &InputLog::new());
        assert_eq!(remote.state_num(), 1);
    }
}

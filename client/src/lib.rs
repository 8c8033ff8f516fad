//! # Game Client Library
//!
//! Client-side implementation of the swarmgrid multiplayer game. The
//! client runs the exact same deterministic simulation as the server,
//! but only ever feeds input to the local player; everything else in
//! its world is a prediction awaiting confirmation.
//!
//! ## Client-Side Prediction
//! Local inputs are applied to the simulation the instant they are
//! sampled, so the local player never waits a round trip to see itself
//! move. Every predicted tick is snapshotted into a rolling window keyed
//! by tick number.
//!
//! ## Server Reconciliation
//! When an authoritative snapshot arrives, the predictor compares the
//! corresponding window entry against it. Agreement (within a float
//! tolerance) keeps the existing prediction; disagreement rewinds the
//! simulation to the corrected tick and replays the logged inputs to
//! rebuild the predicted future.
//!
//! ## Module Organization
//! - `sim`: the local specialization of the shared simulation engine
//! - `predictor`: the prediction window and reconciliation algorithm
//! - `input`: key sampling and the tick-indexed input log
//! - `network`: UDP client, packet handling, the main loop
//! - `rendering`: macroquad drawing of the predicted world

pub mod input;
pub mod network;
pub mod predictor;
pub mod rendering;
pub mod sim;

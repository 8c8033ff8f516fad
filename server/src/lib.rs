//! # Game Server Library
//!
//! The authoritative side of the swarmgrid multiplayer game. The server
//! owns the canonical simulation: it folds every client's tick-indexed
//! input log into the shared engine, advances it at a fixed rate, and
//! broadcasts authoritative snapshots that clients reconcile their
//! predictions against.
//!
//! ## Authoritative Simulation
//! The server runs the same deterministic engine the clients predict
//! with, but it is the only instance whose word counts. Client input
//! arrives as redundant bit-packed runs; the engine consumes each
//! client's input at the server's own tick, and entities without fresh
//! input simply coast.
//!
//! ## State Broadcasting
//! On a fixed cadence the server serializes its snapshot into a `Truth`
//! packet (world state with wire-relative tick references plus the
//! generator state) and sends it to every connected client. The
//! broadcast tick doubles as the confirmation point up to which client
//! input logs can be pruned.
//!
//! ## Module Organization
//! - `game`: the authoritative wrapper around the shared simulation
//! - `client_manager`: connections, timeouts and per-client input logs
//! - `network`: UDP socket handling and the main tick loop

pub mod client_manager;
pub mod game;
pub mod network;

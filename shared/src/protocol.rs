//! Datagram protocol between client and server, bincode-encoded.

use crate::deque::Tick;
use crate::entity::EntityId;
use crate::world::WorldState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
    },
    /// Accepts a connection and hands over everything the client needs
    /// to run the same simulation: its entity id, the session seed, the
    /// map name and the server's current tick.
    Connected {
        client_id: EntityId,
        seed: u64,
        map: String,
        tick: Tick,
    },
    /// A redundant run of the newest local inputs, one packed byte per
    /// tick starting at `first_tick`. Re-sending the recent tail lets
    /// the server fill holes left by lost datagrams without any
    /// retransmission protocol.
    Input {
        first_tick: Tick,
        inputs: Vec<u8>,
    },
    /// Authoritative update. `world` carries its weapon tick references
    /// relative to `tick`; receivers re-express them into their own
    /// absolute tick base via `WorldState::shift_ticks`. The server's
    /// generator state rides along so a corrected client predicts the
    /// same spawns the server will make.
    Truth {
        tick: Tick,
        world: WorldState,
        rng_state: u64,
    },
    Disconnect,
    Disconnected {
        reason: String,
    },
}

//! Client connection management and input log folding for the server.
//!
//! Each connected client owns a tick-indexed input log on the server
//! side. Incoming datagrams carry a redundant run of the client's newest
//! inputs; folding a run into the log keeps it gapless without any
//! retransmission protocol: overlap is ignored, strictly newer entries
//! are appended, and a run the log cannot bridge replaces it.

use log::{info, warn};
use shared::{EntityId, Input, InputLog, Tick};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One connected client and its buffered input history.
#[derive(Debug)]
pub struct RemoteClient {
    pub id: EntityId,
    pub name: String,
    pub addr: SocketAddr,
    /// Last time any packet arrived from this client.
    pub last_seen: Instant,
    /// Gapless tick-indexed inputs awaiting consumption.
    pub input_log: InputLog,
}

impl RemoteClient {
    /// The log is anchored to start right after the server tick the
    /// client joined at, matching the client's own anchoring.
    pub fn new(id: EntityId, name: &str, addr: SocketAddr, joined_tick: Tick) -> Self {
        Self {
            id,
            name: name.to_string(),
            addr,
            last_seen: Instant::now(),
            input_log: InputLog::with_start(joined_tick + 1),
        }
    }

    /// Folds a redundant input run into the log.
    pub fn receive_run(&mut self, first_tick: Tick, inputs: &[u8]) {
        self.last_seen = Instant::now();

        let mut run = InputLog::with_start(first_tick);
        for bits in inputs {
            run.push_back(Input::from_bits(*bits));
        }

        if self.input_log.merge_newer_from(&run) {
            return;
        }
        if !run.is_empty() && run.first() > self.input_log.last() + 1 {
            // The datagrams covering the gap are gone for good; adopt
            // the run as the new history rather than stalling forever.
            warn!(
                "client {} input gap: log ends at tick {}, run starts at {}",
                self.id,
                self.input_log.last(),
                run.first()
            );
            self.input_log = run;
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// All connected clients, capacity enforcement and input collection.
pub struct ClientManager {
    clients: BTreeMap<EntityId, RemoteClient>,
    next_client_id: EntityId,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new client. Returns None when the server is full.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        name: &str,
        joined_tick: Tick,
    ) -> Option<EntityId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("client {} ('{}') connected from {}", client_id, name, addr);
        self.clients
            .insert(client_id, RemoteClient::new(client_id, name, addr, joined_tick));
        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: EntityId) -> bool {
        if let Some(client) = self.clients.remove(&client_id) {
            info!("client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<EntityId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Folds an input run into the addressed client's log. Returns false
    /// for unknown clients.
    pub fn receive_run(&mut self, client_id: EntityId, first_tick: Tick, inputs: &[u8]) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.receive_run(first_tick, inputs);
                true
            }
            None => false,
        }
    }

    /// Every client's input for `tick`, in ascending id order. Clients
    /// whose input for the tick has not arrived are absent; their
    /// entities coast.
    pub fn inputs_for_tick(&self, tick: Tick) -> BTreeMap<EntityId, Input> {
        self.clients
            .iter()
            .filter_map(|(id, client)| client.input_log.get(tick).map(|input| (*id, *input)))
            .collect()
    }

    /// Prunes every log up to the broadcast tick the clients just got
    /// confirmed.
    pub fn prune_confirmed(&mut self, tick: Tick) {
        for client in self.clients.values_mut() {
            client.input_log.discard_front_until(tick);
        }
    }

    /// Removes and returns clients that have gone silent.
    pub fn check_timeouts(&mut self) -> Vec<EntityId> {
        let timeout = Duration::from_secs(5);
        let timed_out: Vec<EntityId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(*client_id);
        }
        timed_out
    }

    pub fn client_addrs(&self) -> Vec<(EntityId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

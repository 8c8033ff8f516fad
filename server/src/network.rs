//! Server network layer: UDP socket handling and the fixed-rate
//! authoritative tick loop.

use crate::client_manager::ClientManager;
use crate::game::ServerGame;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, Tick, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Ticks between authoritative broadcasts (10 Hz at the default rate).
pub const BROADCAST_PERIOD: Tick = 6;

/// Messages sent from network tasks to the main server loop.
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: shared::EntityId },
}

/// Main server coordinating networking and the authoritative game.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game: ServerGame,
    tick_duration: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        map_name: &str,
        seed: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let game = ServerGame::new(map_name, seed, BROADCAST_PERIOD)?;
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!(
            "server listening on {} (map '{}', seed {})",
            addr, map_name, seed
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            game,
            tick_duration,
            server_tx,
            server_rx,
        })
    }

    /// Spawns the task that continuously listens for incoming packets.
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[..len]) {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                break;
                            }
                        } else {
                            warn!("failed to decode packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that sweeps for silent clients.
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut sweep = tokio::time::interval(Duration::from_secs(1));

            loop {
                sweep.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout { client_id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        match serialize(packet) {
            Ok(data) => {
                if let Err(e) = self.socket.send_to(&data, addr).await {
                    error!("failed to send packet to {}: {}", addr, e);
                }
            }
            Err(e) => error!("failed to encode packet: {}", e),
        }
    }

    async fn broadcast_packet(&self, packet: &Packet) {
        let addrs = {
            let clients = self.clients.read().await;
            clients.client_addrs()
        };
        for (_, addr) in addrs {
            self.send_packet(packet, addr).await;
        }
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                name,
            } => {
                if client_version != PROTOCOL_VERSION {
                    let response = Packet::Disconnected {
                        reason: format!(
                            "protocol version mismatch (server {}, client {})",
                            PROTOCOL_VERSION, client_version
                        ),
                    };
                    self.send_packet(&response, addr).await;
                    return;
                }

                // A reconnect from the same address replaces the old
                // session.
                let existing = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(existing_id) = existing {
                    info!("replacing existing client {} from {}", existing_id, addr);
                    self.clients.write().await.remove_client(existing_id);
                    self.game.remove_player(existing_id);
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, &name, self.game.tick())
                };

                match client_id {
                    Some(client_id) => {
                        if let Err(e) = self.game.add_player(client_id, &name) {
                            error!("failed to add player {}: {}", client_id, e);
                            self.clients.write().await.remove_client(client_id);
                            return;
                        }
                        let response = Packet::Connected {
                            client_id,
                            seed: self.game.seed(),
                            map: self.game.map_name().to_string(),
                            tick: self.game.tick(),
                        };
                        self.send_packet(&response, addr).await;
                    }
                    None => {
                        let response = Packet::Disconnected {
                            reason: "server full".to_string(),
                        };
                        self.send_packet(&response, addr).await;
                    }
                }
            }

            Packet::Input { first_tick, inputs } => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(client_id) = client_id {
                    let mut clients = self.clients.write().await;
                    clients.receive_run(client_id, first_tick, &inputs);
                }
            }

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(client_id) = client_id {
                    self.clients.write().await.remove_client(client_id);
                    self.game.remove_player(client_id);
                }
            }

            _ => warn!("unexpected packet type from client at {}", addr),
        }
    }

    /// One authoritative tick: collect each client's input for the tick
    /// being simulated, advance, and broadcast on the cadence.
    async fn advance_tick(&mut self) {
        let inputs = {
            let clients = self.clients.read().await;
            clients.inputs_for_tick(self.game.tick() + 1)
        };
        self.game.advance(&inputs);

        if let Some(packet) = self.game.truth_packet() {
            self.broadcast_packet(&packet).await;
            let mut clients = self.clients.write().await;
            clients.prune_confirmed(self.game.tick());
        }

        if self.game.tick() % 600 == 0 {
            let client_count = self.clients.read().await.len();
            debug!(
                "tick {}: {} clients, {} enemies, wave {}",
                self.game.tick(),
                client_count,
                self.game.world().enemies.len(),
                self.game.world().wave
            );
        }
    }

    /// Main server loop coordinating all operations.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);

        info!("server started");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("client {} timed out", client_id);
                            self.game.remove_player(client_id);
                        }
                        None => {
                            info!("server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.advance_tick().await;
                },
            }
        }

        Ok(())
    }
}

//! UDP client: connection handshake, input transmission, authoritative
//! update handling, and the fixed-rate predict/render loop.

use crate::input::InputManager;
use crate::predictor::{ActivePredictor, Predictor};
use crate::rendering::{HudStats, Renderer};
use crate::sim::ClientSim;
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{EntityId, GameRng, Packet, SimConfig, Snapshot, TileMap, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, Instant};

/// How many of the newest inputs every datagram repeats. Eight ticks of
/// redundancy rides out short loss bursts without a reliability layer.
const INPUT_RUN_LEN: usize = 8;

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    name: String,
    client_id: Option<EntityId>,
    connected: bool,

    map: Option<Arc<TileMap>>,
    predictor: Option<ActivePredictor>,
    input: InputManager,
    renderer: Renderer,

    last_truth_at: Instant,
    truth_ms: u64,
    fake_ping_ms: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        name: &str,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            name: name.to_string(),
            client_id: None,
            connected: false,
            map: None,
            predictor: None,
            input: InputManager::new(),
            renderer: Renderer::new(),
            last_truth_at: Instant::now(),
            truth_ms: 0,
            fake_ping_ms,
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("connecting to {} as '{}'", self.server_addr, self.name);
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: self.name.clone(),
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected {
                client_id,
                seed,
                map,
                tick,
            } => {
                info!(
                    "connected as entity {} on map '{}' (server tick {})",
                    client_id, map, tick
                );
                match TileMap::load(&map) {
                    Ok(map) => {
                        let map = Arc::new(map);
                        let sim =
                            ClientSim::new(Arc::clone(&map), SimConfig::default(), seed, client_id);
                        self.map = Some(map);
                        self.predictor = Some(ActivePredictor::new(sim));
                        self.client_id = Some(client_id);
                        self.connected = true;
                    }
                    Err(e) => error!("server offered a map this build cannot load: {}", e),
                }
            }

            Packet::Truth {
                tick,
                world,
                rng_state,
            } => {
                let Some(predictor) = self.predictor.as_mut() else {
                    return;
                };
                let now = Instant::now();
                self.truth_ms = now.duration_since(self.last_truth_at).as_millis().min(999) as u64;
                self.last_truth_at = now;

                if self.input.synced() {
                    self.input.confirm(tick);
                } else {
                    self.input.resync(tick);
                }

                let truth = Snapshot {
                    tick,
                    world,
                    rng: GameRng::from_state(rng_state),
                };
                predictor.set_truth(truth, self.input.log());
            }

            Packet::Disconnected { reason } => {
                warn!("disconnected by server: {}", reason);
                self.connected = false;
                self.client_id = None;
                self.predictor = None;
                self.map = None;
            }

            _ => warn!("unexpected packet type from server"),
        }
    }

    /// One fixed-rate tick: sample the keys, log the input, extend the
    /// prediction, and send the redundant input run.
    async fn tick_input(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.connected || !self.input.synced() {
            return Ok(());
        }
        let Some(predictor) = self.predictor.as_mut() else {
            return Ok(());
        };

        let input = InputManager::sample();
        self.input.record(input);
        predictor.predict(self.input.log());

        let (first_tick, inputs) = self.input.recent_run(INPUT_RUN_LEN);
        if !inputs.is_empty() {
            self.send_packet(&Packet::Input { first_tick, inputs }).await?;
        }
        Ok(())
    }

    fn render(&mut self) {
        let (Some(predictor), Some(map), Some(client_id)) =
            (self.predictor.as_ref(), self.map.as_ref(), self.client_id)
        else {
            return;
        };
        let stats = HudStats {
            tick: predictor.state_num(),
            truth_ms: self.truth_ms,
            fake_ping_ms: self.fake_ping_ms,
            window_len: predictor.window_len(),
        };
        self.renderer.render(map, predictor.state(), client_id, stats);
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut tick_interval = interval(Duration::from_secs_f32(shared::STEP_DT));
        let mut render_interval = interval(Duration::from_millis(16));
        let mut buffer = [0u8; 65536];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }
                            match deserialize::<Packet>(&buffer[..len]) {
                                Ok(packet) => self.handle_packet(packet),
                                Err(_) => warn!("failed to decode packet from server"),
                            }
                        }
                        Err(e) => error!("error receiving packet: {}", e),
                    }
                },

                _ = tick_interval.tick() => {
                    if let Err(e) = self.tick_input().await {
                        error!("error sending input: {}", e);
                    }
                },

                _ = render_interval.tick() => {
                    self.render();
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    break;
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }
        Ok(())
    }
}

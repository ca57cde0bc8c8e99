use crate::reconciler::{Frame, Reconciler, WorldView};
use crate::time_sync::ClockSync;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{NetConfig, Packet, PlayerId, SnakeState, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

const RENDER_INTERVAL_MS: u64 = 16;

/// Scripted steering for headless runs. Holds each heading for `leg_ms` and
/// then turns clockwise, so the snake traces square loops that leave and
/// re-enter its territory.
#[derive(Debug, Clone)]
pub struct Autopilot {
    leg_ms: f64,
    last_turn_at: Option<f64>,
}

impl Autopilot {
    pub fn new(leg_ms: u64) -> Self {
        Self {
            leg_ms: leg_ms as f64,
            last_turn_at: None,
        }
    }

    /// Turn to send at `local_now`, built from the latest authoritative state
    /// of our own snake.
    pub fn next_turn(&mut self, local_now: f64, snake: &SnakeState) -> Option<Packet> {
        let last = *self.last_turn_at.get_or_insert(local_now);
        if local_now - last < self.leg_ms {
            return None;
        }
        self.last_turn_at = Some(local_now);

        let head = snake.head();
        Some(Packet::Turn {
            direction: snake.direction.clockwise(),
            x: head.x,
            y: head.y,
            sequence: head.sequence,
        })
    }

    pub fn reset(&mut self) {
        self.last_turn_at = None;
    }
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<PlayerId>,
    connected: bool,
    running: bool,
    alive: bool,

    name: String,
    skin: String,
    fake_ping_ms: u64,
    ping_interval_ms: u64,

    clock: ClockSync,
    reconciler: Reconciler,
    autopilot: Option<Autopilot>,
    view: Option<WorldView>,
    started: Instant,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        name: &str,
        skin: &str,
        fake_ping_ms: u64,
        autopilot: Option<Autopilot>,
        net: &NetConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            running: true,
            alive: false,
            name: name.to_string(),
            skin: skin.to_string(),
            fake_ping_ms,
            ping_interval_ms: net.ping_interval_ms.max(1),
            clock: ClockSync::new(net.clock_samples),
            reconciler: Reconciler::new(net),
            autopilot,
            view: None,
            started: Instant::now(),
        })
    }

    pub fn client_id(&self) -> Option<PlayerId> {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    /// The most recently rendered view.
    pub fn view(&self) -> Option<&WorldView> {
        self.view.as_ref()
    }

    fn local_now(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server at {}...", self.server_addr);

        let packet = Packet::Connect { client_version: 1 };
        self.send_packet(&packet).await?;

        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if self.connected {
            if let Err(e) = self.send_packet(&Packet::Disconnect).await {
                error!("Error sending disconnect: {}", e);
            }
            self.connected = false;
        }
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn send_or_log(&self, packet: &Packet) {
        if let Err(e) = self.send_packet(packet).await {
            error!("Error sending {:?}: {}", packet, e);
        }
    }

    async fn send_ping(&mut self) {
        let client_time = self.local_now();
        let id = self.clock.begin_ping(client_time);
        self.send_or_log(&Packet::TimeSync { id, client_time }).await;
    }

    async fn join(&mut self) {
        let packet = Packet::Join {
            name: self.name.clone(),
            skin: self.skin.clone(),
        };
        self.send_or_log(&packet).await;
    }

    async fn handle_packet(&mut self, packet: Packet, receive_time: f64) {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.connected = true;
                self.join().await;
                self.send_ping().await;
            }

            Packet::TimeSyncReply { id, server_time } => {
                if let Some(offset) = self.clock.on_reply(id, server_time, receive_time) {
                    debug!(
                        "Clock sample {:.1}ms, latency {:.1}ms",
                        offset,
                        self.clock.latency_ms()
                    );
                }
            }

            Packet::GameState {
                tick,
                timestamp,
                half_size,
                players,
                food,
            } => {
                self.reconciler.push_frame(Frame {
                    server_time: timestamp,
                    received_at: receive_time,
                    tick,
                    half_size,
                    players,
                    food,
                });
            }

            Packet::Spawn { player_id, snake } => {
                if Some(player_id) == self.client_id {
                    let head = snake.head_position();
                    info!("Spawned at ({:.0}, {:.0})", head.x, head.y);
                    self.alive = true;
                    if let Some(autopilot) = self.autopilot.as_mut() {
                        autopilot.reset();
                    }
                }
            }

            Packet::Death { record } => {
                info!(
                    "Died ({:?}{}): score {}, kills {}, alive {:.1}s",
                    record.cause,
                    record
                        .killer
                        .map(|id| format!(" by player {}", id))
                        .unwrap_or_default(),
                    record.stats.score,
                    record.stats.kills,
                    record.stats.time_alive_ms / 1000.0
                );
                self.alive = false;
                if self.autopilot.is_some() {
                    self.join().await;
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.running = false;
                self.client_id = None;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    async fn render_tick(&mut self) {
        let now = self.local_now();
        self.view = self.reconciler.update(&self.clock, now);

        if !self.alive {
            return;
        }
        let Some(client_id) = self.client_id else {
            return;
        };
        let turn = match (self.autopilot.as_mut(), self.reconciler.newest()) {
            (Some(autopilot), Some(frame)) => frame
                .snake(client_id)
                .and_then(|snake| autopilot.next_turn(now, snake)),
            _ => None,
        };
        if let Some(turn) = turn {
            debug!("Autopilot: {:?}", turn);
            self.send_or_log(&turn).await;
        }
    }

    fn log_stats(&self) {
        let head = self
            .client_id
            .and_then(|id| self.view.as_ref()?.snake(id))
            .map(|snake| snake.head_position());
        debug!(
            "Frames buffered: {}, latency: {:.1}ms, synced: {}, head: {:?}",
            self.reconciler.len(),
            self.clock.latency_ms(),
            self.clock.is_synced(),
            head
        );
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut ping_interval = interval(Duration::from_millis(self.ping_interval_ms));
        let mut render_interval = interval(Duration::from_millis(RENDER_INTERVAL_MS));
        let stats_every = 1000 / RENDER_INTERVAL_MS;
        let mut rendered: u64 = 0;

        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        while self.running {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }
                            let receive_time = self.local_now();

                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => self.handle_packet(packet, receive_time).await,
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = ping_interval.tick() => {
                    if self.connected {
                        self.send_ping().await;
                    }
                },

                _ = render_interval.tick() => {
                    self.render_tick().await;
                    rendered += 1;
                    if rendered % stats_every == 0 {
                        self.log_stats();
                    }
                },
            }
        }

        self.disconnect().await;
        Ok(())
    }
}

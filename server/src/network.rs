//! Server network layer handling UDP communications and the room loop

use crate::client_manager::ClientManager;
use crate::room::{Room, RoomCommand, RoomEvent};
use bincode::{deserialize, serialize, serialized_size};
use log::{debug, error, info, warn};
use shared::{GameConfig, Packet, PlayerId, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Longest simulated step; slower ticks are clamped to this.
const MAX_TICK_DELTA_MS: f64 = 250.0;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: PlayerId,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the room loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<PlayerId>,
    },
}

/// Main server coordinating networking and the room simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    room: Room,
    tick_duration: Duration,
    patch_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: GameConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let tick_duration = Duration::from_secs_f64(1.0 / config.net.tick_rate.max(1) as f64);
        let patch_duration = Duration::from_secs_f64(1.0 / config.net.patch_rate.max(1) as f64);
        let clients = ClientManager::new(
            config.net.max_clients,
            Duration::from_millis(config.net.client_timeout_ms),
        );

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(clients)),
            room: Room::new(config),
            tick_duration,
            patch_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        let data = match serialize(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to serialize broadcast: {}", e);
                                continue;
                            }
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    async fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn send_to_player(&self, player_id: PlayerId, packet: Packet) {
        let addr = {
            let clients = self.clients.read().await;
            clients.addr_of(player_id)
        };
        match addr {
            Some(addr) => self.send_packet(packet, addr).await,
            None => debug!("No address for player {}, dropping packet", player_id),
        }
    }

    async fn broadcast_packet(&self, packet: Packet, exclude: Option<PlayerId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Turns a client packet into a room change or an immediate reply
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect { client_version } = packet {
            self.handle_connect(client_version, addr).await;
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.touch_addr(addr)
        };
        let Some(player_id) = client_id else {
            debug!("Packet from unknown address {}", addr);
            return;
        };

        let command = match packet {
            Packet::Join { name, skin } => RoomCommand::Join {
                player_id,
                name,
                skin,
            },
            Packet::Turn {
                direction,
                x,
                y,
                sequence,
            } => RoomCommand::Turn {
                player_id,
                direction,
                x,
                y,
                sequence,
            },
            Packet::StartBoost => RoomCommand::StartBoost { player_id },
            Packet::StopBoost => RoomCommand::StopBoost { player_id },
            Packet::Freeze => RoomCommand::Freeze { player_id },
            Packet::Unfreeze => RoomCommand::Unfreeze { player_id },
            Packet::TimeSync { id, .. } => {
                let reply = self.room.time_sync_reply(id);
                self.send_packet(reply, addr).await;
                return;
            }
            Packet::Disconnect => {
                let mut clients = self.clients.write().await;
                clients.remove_client(&player_id);
                self.room.remove_player(player_id);
                return;
            }
            _ => {
                warn!("Unexpected packet type from client at {}", addr);
                return;
            }
        };

        self.room.enqueue(command);
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        // Remove existing connection if present
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };

        if let Some(existing_id) = existing_client_id {
            info!("Removing existing client {} from {}", existing_id, addr);
            let mut clients = self.clients.write().await;
            clients.remove_client(&existing_id);
            self.room.remove_player(existing_id);
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        let response = match client_id {
            Some(client_id) => {
                self.room.add_player(client_id);
                Packet::Connected { client_id }
            }
            None => Packet::Disconnected {
                reason: "Server full".to_string(),
            },
        };
        self.send_packet(response, addr).await;
    }

    /// Runs one room tick and forwards the resulting events
    async fn process_tick(&mut self, delta_ms: f64) {
        for event in self.room.tick(delta_ms) {
            match event {
                RoomEvent::Spawned { player_id, snake } => {
                    self.send_to_player(player_id, Packet::Spawn { player_id, snake })
                        .await;
                }
                RoomEvent::Died(record) => {
                    let victim = record.victim;
                    self.send_to_player(victim, Packet::Death { record }).await;
                }
                RoomEvent::RegionClaimed { .. } => {}
            }
        }
    }

    /// Broadcasts the current room snapshot to all connected clients
    async fn broadcast_game_state(&mut self) {
        let client_count = {
            let clients = self.clients.read().await;
            clients.len()
        };

        if client_count == 0 {
            return;
        }

        let packet = self.room.snapshot();
        match serialized_size(&packet) {
            Ok(size) if size as usize <= MAX_PACKET_SIZE => {
                self.broadcast_packet(packet, None).await;
            }
            Ok(size) => warn!("Snapshot of {} bytes exceeds datagram limit, skipped", size),
            Err(e) => error!("Failed to size snapshot: {}", e),
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut patch_interval = interval(self.patch_duration);
        patch_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();
        let stats_every = self.room.config().net.tick_rate.max(1);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.room.remove_player(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Advance the simulation
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let mut delta_ms = now.duration_since(last_tick).as_secs_f64() * 1000.0;
                    last_tick = now;

                    if delta_ms > MAX_TICK_DELTA_MS {
                        warn!("Large tick delta {:.1}ms, capping to {:.1}ms", delta_ms, MAX_TICK_DELTA_MS);
                        delta_ms = MAX_TICK_DELTA_MS;
                    }

                    self.process_tick(delta_ms).await;

                    if self.room.tick_count() % stats_every == 0 && self.room.player_count() > 0 {
                        debug!("Tick {}: {} players, {} alive, {} food, arena {:.0}",
                               self.room.tick_count(), self.room.player_count(),
                               self.room.living_count(), self.room.food().len(),
                               self.room.half_size());
                    }
                },

                // Snapshots go out at their own rate
                _ = patch_interval.tick() => {
                    self.broadcast_game_state().await;
                },
            }
        }

        Ok(())
    }
}

//! Server network layer handling UDP communications and arena loop coordination

use crate::arena::Arena;
use crate::client_manager::ClientManager;
use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::motion::MotionBuffer;
use arena_shared::{ConnectionId, Packet, ParticipantId, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: ConnectionId,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from arena loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<ConnectionId>,
    },
}

/// Main server coordinating networking and the arena authority
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    arena: Arena,
    tick_duration: Duration,
    client_timeout: Duration,
    physics_addr: Option<SocketAddr>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ArenaConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let tick_duration = Duration::from_millis(config.tick_interval_ms);
        let client_timeout = Duration::from_millis(config.client_timeout_ms);
        let max_clients = config.max_clients;
        let physics_addr = config.physics_addr;
        let arena = Arena::new(config, MotionBuffer::new())?;

        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            arena,
            tick_duration,
            client_timeout,
            physics_addr,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

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

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
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
        let timeout = self.client_timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
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

    async fn broadcast_packet(&self, packet: Packet, exclude: Option<ConnectionId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Full state for one connection: what it controls, who is in the arena
    /// and the sequence the snapshot is current to
    fn welcome(&self, connection_id: ConnectionId) -> Packet {
        let snapshot = self.arena.snapshot();
        Packet::Welcome {
            connection_id,
            participant: self.arena.participant(connection_id),
            roster: snapshot.roster,
            round: snapshot.round,
            as_of_seq: snapshot.as_of_seq,
        }
    }

    async fn find_client(&self, addr: SocketAddr) -> Option<ConnectionId> {
        let clients = self.clients.read().await;
        clients.find_client_by_addr(addr)
    }

    /// Sequence check for an input packet. Unknown senders and stale
    /// sequences yield None.
    async fn accept_input(&self, addr: SocketAddr, sequence: u32) -> Option<ConnectionId> {
        let mut clients = self.clients.write().await;
        let client_id = clients.find_client_by_addr(addr)?;
        if clients.accept_input(client_id, sequence) {
            Some(client_id)
        } else {
            debug!("Dropping stale input {} from client {}", sequence, client_id);
            None
        }
    }

    /// Whether a contact report from `addr` may score. With a physics
    /// address configured only that sender is trusted; otherwise the sender
    /// must be a connection whose own agent is one of the pair.
    async fn accept_contact(
        &self,
        addr: SocketAddr,
        a: ParticipantId,
        b: ParticipantId,
    ) -> bool {
        if let Some(physics_addr) = self.physics_addr {
            if addr != physics_addr {
                warn!(
                    "Contact report from {} ignored, physics source is {}",
                    addr, physics_addr
                );
                return false;
            }
            return true;
        }

        let Some(client_id) = self.find_client(addr).await else {
            warn!("Contact report from unknown sender {}", addr);
            return false;
        };
        {
            let mut clients = self.clients.write().await;
            clients.touch(client_id);
        }

        match self.arena.participant(client_id) {
            Some(reporter) if reporter.id == a || reporter.id == b => true,
            _ => {
                warn!(
                    "Client {} reported contact {} <-> {} it is not part of",
                    client_id, a, b
                );
                false
            }
        }
    }

    /// Processes incoming packets and forwards them to the arena
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                display_name,
            } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    let response = Packet::Disconnected {
                        reason: "Protocol version mismatch".to_string(),
                    };
                    self.send_packet(response, addr).await;
                    return;
                }

                // A reconnect from the same address replaces the old connection
                if let Some(existing_id) = self.find_client(addr).await {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&existing_id);
                    drop(clients);
                    self.arena.disconnect(existing_id);
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                let Some(client_id) = client_id else {
                    let response = Packet::Disconnected {
                        reason: "Server full".to_string(),
                    };
                    self.send_packet(response, addr).await;
                    return;
                };

                match self.arena.connect(client_id, display_name.as_deref()) {
                    Ok(_) => {
                        self.send_packet(
                            Packet::Connected {
                                connection_id: client_id,
                            },
                            addr,
                        )
                        .await;
                        let welcome = self.welcome(client_id);
                        self.send_packet(welcome, addr).await;
                    }
                    Err(e) => {
                        warn!("Rejecting client {} from {}: {}", client_id, addr, e);
                        {
                            let mut clients = self.clients.write().await;
                            clients.remove_client(&client_id);
                        }
                        let reason = match e {
                            ArenaError::PoolExhausted => "Arena full".to_string(),
                            other => other.to_string(),
                        };
                        self.send_packet(Packet::Disconnected { reason }, addr)
                            .await;
                    }
                }
            }

            Packet::Heartbeat => {
                if let Some(client_id) = self.find_client(addr).await {
                    let mut clients = self.clients.write().await;
                    clients.touch(client_id);
                }
            }

            Packet::Move {
                sequence,
                direction,
            } => {
                if let Some(client_id) = self.accept_input(addr, sequence).await {
                    self.arena.move_intent(client_id, direction);
                }
            }

            Packet::Dash {
                sequence,
                direction,
            } => {
                if let Some(client_id) = self.accept_input(addr, sequence).await {
                    let outcome = self.arena.request_dash(client_id, direction);
                    debug!("Dash from client {}: {:?}", client_id, outcome);
                }
            }

            Packet::Contact { a, b } => {
                if !self.accept_contact(addr, a, b).await {
                    return;
                }
                let outcomes = self.arena.contact(a, b);
                debug!("Contact {} <-> {}: {:?}", a, b, outcomes);
            }

            Packet::ResyncRequest => {
                if let Some(client_id) = self.find_client(addr).await {
                    debug!("Client {} requested a resync", client_id);
                    let welcome = self.welcome(client_id);
                    self.send_packet(welcome, addr).await;
                }
            }

            Packet::Disconnect => {
                if let Some(client_id) = self.find_client(addr).await {
                    {
                        let mut clients = self.clients.write().await;
                        clients.remove_client(&client_id);
                    }
                    self.arena.disconnect(client_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Sends every delta committed since the last flush, in commit order,
    /// followed by the motion commands for the physics side
    async fn flush(&mut self) {
        for committed in self.arena.drain_deltas() {
            let packet = Packet::Delta {
                seq: committed.seq,
                delta: committed.delta,
            };
            self.broadcast_packet(packet, None).await;
        }

        for command in self.arena.mover_mut().drain() {
            self.broadcast_packet(Packet::Motion(command), None).await;
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);

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
                            info!("Client {} timed out", client_id);
                            self.arena.disconnect(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    self.arena.tick();
                },
            }

            self.flush().await;
        }

        Ok(())
    }
}

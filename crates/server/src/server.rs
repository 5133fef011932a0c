use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};

use square::{
    ConnectionListener, ControlMessage, Entity, PlayerId, PlayerState, Position, Registry,
    StateReport, TcpReceiver, UdpReceiver, Velocity, encode_snapshot, physics,
};

use crate::config::ServerConfig;
use crate::events::ServerEvent;

/// Server-side connection component: the write half of the accepted socket
/// plus its one-shot receiver thread.
struct TcpLink {
    stream: TcpStream,
    receiver: TcpReceiver,
}

impl TcpLink {
    fn send(&mut self, text: &str) -> io::Result<()> {
        self.stream.write_all(text.as_bytes())
    }

    fn close(&mut self) {
        self.receiver.stop();
    }
}

pub struct GameServer {
    config: ServerConfig,
    registry: Registry,
    players: HashMap<PlayerId, Entity>,
    local_addr: SocketAddr,
    udp_send: UdpSocket,
    listener: ConnectionListener,
    udp_receiver: UdpReceiver,
    connections: Receiver<(TcpStream, SocketAddr)>,
    disconnects: Receiver<SocketAddr>,
    disconnect_tx: Sender<SocketAddr>,
    messages: Receiver<String>,
    message_tx: Sender<String>,
    updates: Receiver<(SocketAddr, String)>,
    tick_duration: Duration,
    last_tick: Instant,
    accumulator: Duration,
    last_broadcast: Instant,
    running: Arc<AtomicBool>,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    /// Bind TCP and UDP to the same `(address, port)` pair and start the
    /// listener and UDP receiver threads. Port 0 asks the OS for an
    /// ephemeral port, resolved after the TCP bind.
    pub fn bind<A: ToSocketAddrs>(addr: A, config: ServerConfig) -> io::Result<Self> {
        let tcp_listener = TcpListener::bind(addr)?;
        let local_addr = tcp_listener.local_addr()?;
        let udp_socket = UdpSocket::bind(local_addr)?;
        let udp_send = udp_socket.try_clone()?;

        let (connection_tx, connections) = unbounded();
        let (disconnect_tx, disconnects) = unbounded();
        let (message_tx, messages) = unbounded();
        let (update_tx, updates) = unbounded();

        let listener = ConnectionListener::spawn(tcp_listener, connection_tx)?;
        let udp_receiver = UdpReceiver::spawn(udp_socket, update_tx)?;

        let tick_duration = Duration::from_secs_f64(1.0 / config.tick_rate as f64);
        let now = Instant::now();

        Ok(Self {
            config,
            registry: Registry::new(),
            players: HashMap::new(),
            local_addr,
            udp_send,
            listener,
            udp_receiver,
            connections,
            disconnects,
            disconnect_tx,
            messages,
            message_tx,
            updates,
            tick_duration,
            last_tick: now,
            accumulator: Duration::ZERO,
            last_broadcast: now,
            running: Arc::new(AtomicBool::new(true)),
            pending_events: VecDeque::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            thread::sleep(Duration::from_millis(1));
        }
        self.shutdown();
    }

    /// Advance both timers: the 60 Hz game-logic tick and the broadcast
    /// interval.
    pub fn tick_once(&mut self) {
        let now = Instant::now();
        self.accumulator += now - self.last_tick;
        self.last_tick = now;

        while self.accumulator >= self.tick_duration {
            self.accumulator -= self.tick_duration;
            self.tick();
        }

        if now.duration_since(self.last_broadcast) >= self.config.broadcast_interval {
            self.last_broadcast = now;
            self.broadcast_state();
        }
    }

    pub fn shutdown(&mut self) {
        self.listener.stop();
        self.udp_receiver.stop();
        let ids: Vec<PlayerId> = self.players.keys().cloned().collect();
        for id in ids {
            self.remove_client(&id);
        }
    }

    /// One game-logic tick. Queue categories drain in fixed priority so a
    /// peer's removal is observed before any stale update from it.
    fn tick(&mut self) {
        self.process_connections();
        self.process_disconnects();
        self.process_messages();
        self.process_updates();
        physics::step(&mut self.registry);
    }

    fn process_connections(&mut self) {
        let pending: Vec<_> = self.connections.try_iter().collect();
        for (stream, peer) in pending {
            self.new_client(stream, peer);
        }
    }

    fn process_disconnects(&mut self) {
        let pending: Vec<_> = self.disconnects.try_iter().collect();
        for peer in pending {
            let id = PlayerId::from(peer);
            if self.players.contains_key(&id) {
                self.remove_client(&id);
            }
        }
    }

    // Reserved for future chat/command traffic.
    fn process_messages(&mut self) {
        for message in self.messages.try_iter() {
            log::debug!("unhandled reliable message: {message}");
        }
    }

    fn process_updates(&mut self) {
        let pending: Vec<_> = self.updates.try_iter().collect();
        for (peer, payload) in pending {
            let id = PlayerId::from(peer);
            let Some(&entity) = self.players.get(&id) else {
                // Late report from a removed or unknown peer.
                log::debug!("ignoring state report from unknown player {id}");
                continue;
            };
            match StateReport::decode(&payload) {
                Ok(report) => {
                    // Client-reported state is trusted verbatim; there is
                    // no plausibility check here.
                    if let Some(velocity) = self.registry.get_mut::<Velocity>(entity) {
                        velocity.0 = report.velocity;
                    }
                    if let Some(position) = self.registry.get_mut::<Position>(entity) {
                        position.0 = report.position;
                    }
                }
                Err(e) => log::warn!("dropping malformed state report from {id}: {e}"),
            }
        }
    }

    fn new_client(&mut self, stream: TcpStream, peer: SocketAddr) {
        let id = PlayerId::from(peer);
        if self.players.contains_key(&id) {
            log::warn!("rejecting duplicate connection for {id}");
            let _ = stream.shutdown(Shutdown::Both);
            self.pending_events.push_back(ServerEvent::ConnectionDenied {
                addr: peer,
                reason: "player id already connected",
            });
            return;
        }

        let write_stream = match stream.try_clone() {
            Ok(s) => s,
            Err(e) => {
                log::warn!("failed to clone socket for {id}: {e}");
                return;
            }
        };
        let receiver = match TcpReceiver::spawn_one_shot(
            stream,
            peer,
            self.message_tx.clone(),
            self.disconnect_tx.clone(),
        ) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("failed to start receiver for {id}: {e}");
                return;
            }
        };

        let spawn = self.config.spawn_position;
        let entity = self.registry.spawn();
        self.registry.attach(entity, Position(spawn));
        self.registry.attach(entity, Velocity::default());
        self.registry.attach(
            entity,
            TcpLink {
                stream: write_stream,
                receiver,
            },
        );
        self.players.insert(id.clone(), entity);

        self.broadcast_control(&ControlMessage::Connect {
            id: id.clone(),
            x: spawn.x,
            y: spawn.y,
        });
        self.pending_events
            .push_back(ServerEvent::ClientConnected { id, addr: peer });
    }

    fn remove_client(&mut self, id: &PlayerId) {
        let Some(entity) = self.players.remove(id) else {
            return;
        };
        if let Some(mut link) = self.registry.detach::<TcpLink>(entity) {
            link.close();
        }
        self.registry.despawn(entity);

        self.broadcast_control(&ControlMessage::Disconnect { id: id.clone() });
        self.pending_events
            .push_back(ServerEvent::ClientDisconnected { id: id.clone() });
    }

    fn broadcast_control(&mut self, message: &ControlMessage) {
        let encoded = message.encode();
        for (id, &entity) in &self.players {
            if let Some(link) = self.registry.get_mut::<TcpLink>(entity) {
                if let Err(e) = link.send(&encoded) {
                    log::warn!("tcp send to {id} failed: {e}");
                }
            }
        }
    }

    /// Send the authoritative snapshot to every connected player's UDP
    /// endpoint. Disconnects are drained first so a peer that dropped
    /// between game ticks never appears in the snapshot.
    fn broadcast_state(&mut self) {
        self.process_disconnects();
        if self.players.is_empty() {
            return;
        }

        let mut states = Vec::with_capacity(self.players.len());
        for (id, &entity) in &self.players {
            let (Some(position), Some(velocity)) = (
                self.registry.get::<Position>(entity),
                self.registry.get::<Velocity>(entity),
            ) else {
                continue;
            };
            states.push(PlayerState {
                id: id.clone(),
                velocity: velocity.0,
                position: position.0,
            });
        }

        let payload = encode_snapshot(&states);
        for id in self.players.keys() {
            let Some(addr) = id.socket_addr() else {
                continue;
            };
            if let Err(e) = self.udp_send.send_to(payload.as_bytes(), addr) {
                log::debug!("udp send to {id} failed: {e}");
            }
        }
    }
}

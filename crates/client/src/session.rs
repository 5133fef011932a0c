//! Client-side synchronization session.
//!
//! Owns the TCP/UDP receiver threads, the registry of player entities, and
//! the per-frame pipeline: drain control messages, drain snapshots, apply
//! input, integrate, dead-reckon, report. The rendering host calls
//! [`ClientSession::update`] once per frame and reads positions back; the
//! input layer writes the local [`InputIntent`].

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use glam::{Vec2, vec2};

use square::registry::{Entity, Registry};
use square::{
    ControlMessage, InputIntent, PlayerId, Position, StateReport, TcpReceiver, UdpReceiver,
    Velocity, decode_snapshot, physics,
};

use crate::config::ClientConfig;
use crate::dead_reckoning::{self, DeadReckoning};

pub struct ClientSession {
    config: ClientConfig,
    registry: Registry,
    players: HashMap<PlayerId, Entity>,
    my_id: PlayerId,
    my_entity: Option<Entity>,
    tcp_receiver: TcpReceiver,
    udp_send: UdpSocket,
    udp_receiver: UdpReceiver,
    messages: Receiver<String>,
    updates: Receiver<(SocketAddr, String)>,
    report_accumulator: Duration,
}

impl ClientSession {
    /// Connect to the server. The TCP connection's local address doubles
    /// as the UDP bind address and, as `"<ip>:<port>"`, this client's
    /// player id on both transports.
    pub fn connect(config: ClientConfig) -> io::Result<Self> {
        let stream = TcpStream::connect(config.server_addr)?;
        let local_addr = stream.local_addr()?;
        let my_id = PlayerId::from(local_addr);
        log::info!("connected to {} as {my_id}", config.server_addr);

        let (message_tx, messages) = unbounded();
        let tcp_receiver = TcpReceiver::spawn(stream, message_tx)?;

        let udp_socket = UdpSocket::bind(local_addr)?;
        let udp_send = udp_socket.try_clone()?;
        let (update_tx, updates) = unbounded();
        let udp_receiver = UdpReceiver::spawn(udp_socket, update_tx)?;

        Ok(Self {
            config,
            registry: Registry::new(),
            players: HashMap::new(),
            my_id,
            my_entity: None,
            tcp_receiver,
            udp_send,
            udp_receiver,
            messages,
            updates,
            report_accumulator: Duration::ZERO,
        })
    }

    pub fn my_id(&self) -> &PlayerId {
        &self.my_id
    }

    pub fn my_entity(&self) -> Option<Entity> {
        self.my_entity
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn entity_of(&self, id: &PlayerId) -> Option<Entity> {
        self.players.get(id).copied()
    }

    /// The input layer's write surface: the local player's directional
    /// intention for the coming ticks.
    pub fn set_input(&mut self, intent: InputIntent) {
        if let Some(me) = self.my_entity {
            if let Some(slot) = self.registry.get_mut::<InputIntent>(me) {
                *slot = intent;
            }
        }
    }

    /// One render frame worth of work.
    pub fn update(&mut self, delta_time: f32) {
        self.process_messages();
        self.process_updates();
        self.apply_input();
        physics::step(&mut self.registry);
        dead_reckoning::apply(
            &mut self.registry,
            self.my_entity,
            delta_time,
            &self.config.blend,
        );
        self.maybe_send_report(delta_time);
    }

    pub fn stop(&mut self) {
        self.tcp_receiver.stop();
        self.udp_receiver.stop();
    }

    fn process_messages(&mut self) {
        let pending: Vec<String> = self.messages.try_iter().collect();
        for message in pending {
            match ControlMessage::decode(&message) {
                Ok(ControlMessage::Connect { id, x, y }) => self.new_player(id, vec2(x, y)),
                Ok(ControlMessage::Disconnect { id }) => self.remove_player(&id),
                Err(e) => log::warn!("dropping malformed control message: {e}"),
            }
        }
    }

    fn process_updates(&mut self) {
        let pending: Vec<_> = self.updates.try_iter().collect();
        for (_, payload) in pending {
            let states = match decode_snapshot(&payload) {
                Ok(states) => states,
                Err(e) => {
                    log::warn!("dropping malformed snapshot: {e}");
                    continue;
                }
            };
            let now = Instant::now();
            for state in states {
                if !self.players.contains_key(&state.id) {
                    // First observation of this player: create it at the
                    // reported position; the sample itself is not history
                    // yet.
                    self.new_player(state.id, state.position);
                    continue;
                }
                if state.id == self.my_id {
                    continue;
                }
                let Some(&entity) = self.players.get(&state.id) else {
                    continue;
                };
                if let Some(dr) = self.registry.get_mut::<DeadReckoning>(entity) {
                    if let Err(e) = dr.observe(state.position, state.velocity, now) {
                        log::warn!("rejecting state sample for {}: {e}", state.id);
                    }
                }
            }
        }
    }

    fn apply_input(&mut self) {
        let Some(me) = self.my_entity else {
            return;
        };
        let Some(intent) = self.registry.get::<InputIntent>(me).copied() else {
            return;
        };
        if let Some(velocity) = self.registry.get_mut::<Velocity>(me) {
            velocity.0 = intent.velocity();
        }
    }

    fn maybe_send_report(&mut self, delta_time: f32) {
        self.report_accumulator += Duration::from_secs_f32(delta_time.max(0.0));
        if self.report_accumulator < self.config.report_interval {
            return;
        }
        self.report_accumulator = Duration::ZERO;

        let Some(me) = self.my_entity else {
            return;
        };
        let (Some(position), Some(velocity)) = (
            self.registry.get::<Position>(me),
            self.registry.get::<Velocity>(me),
        ) else {
            return;
        };
        let report = StateReport {
            velocity: velocity.0,
            position: position.0,
        };
        if let Err(e) = self
            .udp_send
            .send_to(report.encode().as_bytes(), self.config.server_addr)
        {
            log::debug!("state report failed: {e}");
        }
    }

    fn new_player(&mut self, id: PlayerId, position: Vec2) {
        if self.players.contains_key(&id) {
            log::warn!("ignoring connect for already-known player {id}");
            return;
        }
        let entity = self.registry.spawn();
        self.registry.attach(entity, Position(position));
        self.registry.attach(entity, Velocity::default());
        self.registry.attach(entity, InputIntent::empty());
        self.registry
            .attach(entity, DeadReckoning::seeded(position, Instant::now()));
        if id == self.my_id {
            self.my_entity = Some(entity);
        }
        log::info!("player {id} joined at {position}");
        self.players.insert(id, entity);
    }

    fn remove_player(&mut self, id: &PlayerId) {
        let Some(entity) = self.players.remove(id) else {
            log::debug!("ignoring disconnect for unknown player {id}");
            return;
        };
        self.registry.despawn(entity);
        if self.my_entity == Some(entity) {
            self.my_entity = None;
        }
        log::info!("player {id} left");
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.stop();
    }
}

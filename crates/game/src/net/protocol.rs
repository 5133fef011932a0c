//! Wire codec for the two text grammars.
//!
//! ASCII, no length prefix; one transport receive equals one message.
//! `;;` separates top-level fields, `;` separates sub-fields. All decoding
//! is fallible: a malformed message yields a [`ProtocolError`], never a
//! panic in the receiving thread.

use std::time::Duration;

use glam::{Vec2, vec2};

use crate::components::PlayerId;

pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Bound on every single receive call. Messages larger than this are
/// undefined behavior (no fragmentation handling).
pub const BUFFER_SIZE: usize = 4096;

/// Cadence of client state reports and server broadcasts; also the
/// reference step the dead-reckoning blend is tuned for (1/15 s).
pub const UDP_SEND_INTERVAL: Duration = Duration::from_micros(66_666);

const GROUP_SEPARATOR: &str = ";;";
const FIELD_SEPARATOR: char = ';';

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid number in field `{field}`: `{value}`")]
    BadNumber {
        field: &'static str,
        value: String,
    },
}

fn parse_f32(field: &'static str, value: &str) -> Result<f32, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::BadNumber {
        field,
        value: value.to_string(),
    })
}

/// Reliable-channel command, server to client.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    Connect { id: PlayerId, x: f32, y: f32 },
    Disconnect { id: PlayerId },
}

impl ControlMessage {
    pub fn encode(&self) -> String {
        match self {
            ControlMessage::Connect { id, x, y } => {
                format!("client_connect;;{id};;{x};;{y}")
            }
            ControlMessage::Disconnect { id } => format!("client_disconnect;;{id}"),
        }
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        if text.is_empty() {
            return Err(ProtocolError::Empty);
        }
        let mut fields = text.split(GROUP_SEPARATOR);
        let command = fields.next().ok_or(ProtocolError::Empty)?;
        match command {
            "client_connect" => {
                let id = fields.next().ok_or(ProtocolError::MissingField("id"))?;
                let x = fields.next().ok_or(ProtocolError::MissingField("x"))?;
                let y = fields.next().ok_or(ProtocolError::MissingField("y"))?;
                Ok(ControlMessage::Connect {
                    id: PlayerId::from(id),
                    x: parse_f32("x", x)?,
                    y: parse_f32("y", y)?,
                })
            }
            "client_disconnect" => {
                let id = fields.next().ok_or(ProtocolError::MissingField("id"))?;
                Ok(ControlMessage::Disconnect {
                    id: PlayerId::from(id),
                })
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// Unreliable-channel report, client to server: the client's own velocity
/// and position, trusted verbatim by the server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateReport {
    pub velocity: Vec2,
    pub position: Vec2,
}

impl StateReport {
    pub fn encode(&self) -> String {
        format!(
            "{};{};{};{}",
            self.velocity.x, self.velocity.y, self.position.x, self.position.y
        )
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        if text.is_empty() {
            return Err(ProtocolError::Empty);
        }
        let mut fields = text.split(FIELD_SEPARATOR);
        let vx = fields.next().ok_or(ProtocolError::MissingField("vx"))?;
        let vy = fields.next().ok_or(ProtocolError::MissingField("vy"))?;
        let x = fields.next().ok_or(ProtocolError::MissingField("x"))?;
        let y = fields.next().ok_or(ProtocolError::MissingField("y"))?;
        Ok(Self {
            velocity: vec2(parse_f32("vx", vx)?, parse_f32("vy", vy)?),
            position: vec2(parse_f32("x", x)?, parse_f32("y", y)?),
        })
    }
}

/// One player's entry in a broadcast snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: PlayerId,
    pub velocity: Vec2,
    pub position: Vec2,
}

/// Encode the authoritative snapshot: `<id>;<vx>;<vy>;<x>;<y>` groups
/// joined by `;;`, no trailing delimiter.
pub fn encode_snapshot(players: &[PlayerState]) -> String {
    players
        .iter()
        .map(|p| {
            format!(
                "{};{};{};{};{}",
                p.id, p.velocity.x, p.velocity.y, p.position.x, p.position.y
            )
        })
        .collect::<Vec<_>>()
        .join(GROUP_SEPARATOR)
}

pub fn decode_snapshot(text: &str) -> Result<Vec<PlayerState>, ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::Empty);
    }
    let mut players = Vec::new();
    for group in text.split(GROUP_SEPARATOR) {
        let mut fields = group.split(FIELD_SEPARATOR);
        let id = fields.next().ok_or(ProtocolError::MissingField("id"))?;
        let vx = fields.next().ok_or(ProtocolError::MissingField("vx"))?;
        let vy = fields.next().ok_or(ProtocolError::MissingField("vy"))?;
        let x = fields.next().ok_or(ProtocolError::MissingField("x"))?;
        let y = fields.next().ok_or(ProtocolError::MissingField("y"))?;
        players.push(PlayerState {
            id: PlayerId::from(id),
            velocity: vec2(parse_f32("vx", vx)?, parse_f32("vy", vy)?),
            position: vec2(parse_f32("x", x)?, parse_f32("y", y)?),
        });
    }
    Ok(players)
}

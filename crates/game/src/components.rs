use std::fmt;
use std::net::SocketAddr;

use bitflags::bitflags;
use glam::Vec2;

/// World position of a player square. For remote players this is the
/// rendered position the dead-reckoning blend writes each frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub Vec2);

/// Per-tick displacement; the physics step adds it to the position once
/// per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity(pub Vec2);

/// External identity of a connected player: the `"<ip>:<port>"` of the
/// client's UDP-bound address. At most one live entity per id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The UDP endpoint this id names, if it still parses as one.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.0.parse().ok()
    }
}

impl From<SocketAddr> for PlayerId {
    fn from(addr: SocketAddr) -> Self {
        Self(format!("{}:{}", addr.ip(), addr.port()))
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

bitflags! {
    /// Four-way directional intention written by the input layer and read
    /// by the physics contract. Opposite directions cancel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InputIntent: u8 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

impl InputIntent {
    pub const SPEED: f32 = 3.0;

    /// The velocity this intention asks for.
    pub fn velocity(self) -> Vec2 {
        let mut v = Vec2::ZERO;
        if self.contains(Self::UP) && !self.contains(Self::DOWN) {
            v.y = Self::SPEED;
        } else if self.contains(Self::DOWN) && !self.contains(Self::UP) {
            v.y = -Self::SPEED;
        }
        if self.contains(Self::LEFT) && !self.contains(Self::RIGHT) {
            v.x = -Self::SPEED;
        } else if self.contains(Self::RIGHT) && !self.contains(Self::LEFT) {
            v.x = Self::SPEED;
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;

    #[test]
    fn test_player_id_from_socket_addr() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let id = PlayerId::from(addr);
        assert_eq!(id.as_str(), "127.0.0.1:9000");
        assert_eq!(id.socket_addr(), Some(addr));
    }

    #[test]
    fn test_intent_velocity() {
        assert_eq!(InputIntent::empty().velocity(), Vec2::ZERO);
        assert_eq!(InputIntent::RIGHT.velocity(), vec2(3.0, 0.0));
        assert_eq!(
            (InputIntent::UP | InputIntent::LEFT).velocity(),
            vec2(-3.0, 3.0)
        );
    }

    #[test]
    fn test_opposite_intents_cancel() {
        assert_eq!(
            (InputIntent::UP | InputIntent::DOWN).velocity(),
            Vec2::ZERO
        );
        assert_eq!(
            (InputIntent::LEFT | InputIntent::RIGHT | InputIntent::DOWN).velocity(),
            vec2(0.0, -3.0)
        );
    }
}

use std::time::Duration;

use glam::{Vec2, vec2};
use square::{DEFAULT_TICK_RATE, UDP_SEND_INTERVAL};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate: u32,
    pub broadcast_interval: Duration,
    pub spawn_position: Vec2,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            broadcast_interval: UDP_SEND_INTERVAL,
            spawn_position: vec2(100.0, 100.0),
        }
    }
}

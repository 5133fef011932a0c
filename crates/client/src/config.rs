use std::net::SocketAddr;
use std::time::Duration;

use square::UDP_SEND_INTERVAL;

use crate::dead_reckoning::BlendConfig;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    /// Cadence of outgoing state reports.
    pub report_interval: Duration,
    pub blend: BlendConfig,
}

impl ClientConfig {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            report_interval: UDP_SEND_INTERVAL,
            blend: BlendConfig::default(),
        }
    }
}

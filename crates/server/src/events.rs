use std::net::SocketAddr;

use square::PlayerId;

#[derive(Debug, Clone)]
pub enum ServerEvent {
    ClientConnected {
        id: PlayerId,
        addr: SocketAddr,
    },
    ClientDisconnected {
        id: PlayerId,
    },
    ConnectionDenied {
        addr: SocketAddr,
        reason: &'static str,
    },
}

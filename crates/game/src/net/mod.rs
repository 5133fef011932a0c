mod protocol;
mod transport;

pub use protocol::{
    BUFFER_SIZE, ControlMessage, DEFAULT_PORT, DEFAULT_TICK_RATE, PlayerState, ProtocolError,
    StateReport, UDP_SEND_INTERVAL, decode_snapshot, encode_snapshot,
};
pub use transport::{ConnectionListener, TcpReceiver, UdpReceiver};

pub mod components;
pub mod net;
pub mod physics;
pub mod registry;

pub use components::{InputIntent, PlayerId, Position, Velocity};
pub use net::{
    BUFFER_SIZE, ConnectionListener, ControlMessage, DEFAULT_PORT, DEFAULT_TICK_RATE, PlayerState,
    ProtocolError, StateReport, TcpReceiver, UDP_SEND_INTERVAL, UdpReceiver, decode_snapshot,
    encode_snapshot,
};
pub use registry::{Entity, Registry};

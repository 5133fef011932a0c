pub mod config;
pub mod dead_reckoning;
pub mod session;

pub use config::ClientConfig;
pub use dead_reckoning::{BlendConfig, DeadReckoning, DrError};
pub use session::ClientSession;

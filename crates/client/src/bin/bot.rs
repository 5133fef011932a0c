//! Headless client driver: connects to a server and walks the local
//! square around a loop, logging what it sees. Stands in for the
//! rendering/input host during manual end-to-end runs.

use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use square::{InputIntent, Position};
use square_client::{ClientConfig, ClientSession};

#[derive(Parser)]
#[command(name = "square-bot")]
#[command(about = "Headless square client")]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1:9000")]
    server: SocketAddr,

    /// Seconds to keep walking before disconnecting.
    #[arg(short, long, default_value_t = 30)]
    duration: u64,
}

const FRAME: Duration = Duration::from_micros(16_666);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut session = ClientSession::connect(ClientConfig::new(args.server))
        .with_context(|| format!("connecting to {}", args.server))?;

    let legs = [
        InputIntent::RIGHT,
        InputIntent::DOWN,
        InputIntent::LEFT,
        InputIntent::UP,
    ];

    let total_frames = args.duration * 60;
    for frame in 0..total_frames {
        // Change walking direction once a second.
        let leg = legs[(frame / 60) as usize % legs.len()];
        session.set_input(leg);
        session.update(FRAME.as_secs_f32());

        if frame % 60 == 0 {
            if let Some(me) = session.my_entity() {
                if let Some(position) = session.registry().get::<Position>(me) {
                    log::info!(
                        "frame {frame}: {} players, local square at {}",
                        session.player_count(),
                        position.0
                    );
                }
            }
        }

        thread::sleep(FRAME);
    }

    session.stop();
    Ok(())
}

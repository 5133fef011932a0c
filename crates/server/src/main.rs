mod config;
mod events;
mod server;

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use config::ServerConfig;
use events::ServerEvent;
use server::GameServer;

#[derive(Parser)]
#[command(name = "square-server")]
#[command(about = "Square game server")]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    address: String,

    #[arg(short, long, default_value_t = square::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = square::DEFAULT_TICK_RATE)]
    tick_rate: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bind_addr = format!("{}:{}", args.address, args.port);

    let config = ServerConfig {
        tick_rate: args.tick_rate,
        ..Default::default()
    };

    let mut server =
        GameServer::bind(&bind_addr, config).with_context(|| format!("binding {bind_addr}"))?;
    log::info!("Server started on {}", server.local_addr());

    let running = server.running();
    while running.load(Ordering::SeqCst) {
        server.tick_once();

        for event in server.drain_events() {
            match event {
                ServerEvent::ClientConnected { id, addr } => {
                    log::info!("Client {id} connected from {addr}");
                }
                ServerEvent::ClientDisconnected { id } => {
                    log::info!("Client {id} disconnected");
                }
                ServerEvent::ConnectionDenied { addr, reason } => {
                    log::warn!("Connection denied to {addr}: {reason}");
                }
            }
        }

        thread::sleep(Duration::from_millis(1));
    }

    log::info!("Server shutting down");
    server.shutdown();

    Ok(())
}

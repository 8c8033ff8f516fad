mod client_manager;
mod game;
mod network;

use clap::Parser;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (simulation updates per second)
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Maximum number of concurrent clients
    #[arg(short = 'c', long, default_value = "8")]
    max_clients: usize,

    /// Built-in map to play on
    #[arg(short, long, default_value = "arena")]
    map: String,

    /// Session seed; random when omitted
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);
    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f32(1.0 / args.tick_rate as f32);

    info!(
        "starting server on {} ({} Hz, map '{}', seed {})",
        address, args.tick_rate, args.map, seed
    );

    let mut server = network::Server::new(
        &address,
        tick_duration,
        args.max_clients,
        &args.map,
        seed,
    )
    .await?;

    server.run().await?;

    Ok(())
}

mod input;
mod network;
mod predictor;
mod rendering;
mod sim;

use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Player name shown to other clients
    #[arg(short = 'n', long, default_value = "player")]
    name: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("starting client...");
    info!("connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("simulating {}ms latency", args.fake_ping);
    }
    info!("controls: WASD/arrows to move, space to fire");

    let mut client = network::Client::new(&args.server, &args.name, args.fake_ping).await?;
    client.run().await?;

    Ok(())
}

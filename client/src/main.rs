use clap::Parser;
use client::network::{Autopilot, Client};
use log::info;
use shared::GameConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Territory skin
    #[arg(long, default_value = "pattern_squares")]
    skin: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Steer automatically, turning clockwise every N milliseconds
    #[arg(short = 'a', long)]
    autopilot: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = GameConfig::load_or_default();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    if let Some(leg) = args.autopilot {
        info!("Autopilot turning every {}ms", leg);
    }

    let mut client = Client::new(
        &args.server,
        &args.name,
        &args.skin,
        args.fake_ping,
        args.autopilot.map(Autopilot::new),
        &config.net,
    )
    .await?;

    tokio::select! {
        result = client.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving");
        }
    }
    client.disconnect().await;

    Ok(())
}

use clap::Parser;
use log::info;
use server::network::Server;
use shared::GameConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation ticks per second (overrides TICK_RATE)
    #[arg(short, long)]
    tick_rate: Option<u32>,

    /// Snapshot broadcasts per second (overrides PATCH_RATE)
    #[arg(long)]
    patch_rate: Option<u32>,

    /// Maximum players in the room (overrides MAX_CLIENTS)
    #[arg(short, long)]
    max_clients: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut config = GameConfig::load_or_default();
    if let Some(rate) = args.tick_rate {
        config.net.tick_rate = rate.max(1);
    }
    if let Some(rate) = args.patch_rate {
        config.net.patch_rate = rate.max(1);
    }
    if let Some(max) = args.max_clients {
        config.net.max_clients = max;
    }

    info!(
        "Starting room: {} Hz tick, {} Hz snapshots, up to {} players",
        config.net.tick_rate, config.net.patch_rate, config.net.max_clients
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

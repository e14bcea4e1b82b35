use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use shared::{DISCOVERY_PORT, TCP_PORT};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the TCP listener to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// TCP port to listen on
    #[arg(short, long, default_value_t = TCP_PORT)]
    port: u16,

    /// UDP port the discovery beacon broadcasts to
    #[arg(long, default_value_t = DISCOVERY_PORT)]
    discovery_port: u16,

    /// Server name advertised to LAN clients
    #[arg(short, long, default_value = "ArenaServer")]
    name: String,

    /// Do not broadcast discovery announcements
    #[arg(long)]
    no_beacon: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        discovery_port: args.discovery_port,
        name: args.name,
        beacon: !args.no_beacon,
        ..ServerConfig::default()
    };

    info!("Starting server '{}'...", config.name);
    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

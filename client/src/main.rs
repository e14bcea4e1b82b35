use clap::Parser;
use client::config::{timeout_from_secs, ClientConfig};
use client::discovery::discover_server;
use client::game::LocalAvatar;
use client::input::ScriptedInput;
use client::network::{Client, SessionEnd};
use client::rendering::LogRenderer;
use log::{info, warn};
use shared::{DISCOVERY_PORT, TCP_PORT};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address (host:port); discovered on the LAN when omitted
    #[arg(short = 's', long)]
    server: Option<String>,

    /// Player name; random when omitted
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Color as r,g,b or "random"
    #[arg(short = 'c', long)]
    color: Option<String>,

    /// UDP port to listen on for server announcements
    #[arg(long, default_value_t = DISCOVERY_PORT)]
    discovery_port: u16,

    /// Seconds to wait for a server announcement
    #[arg(long, default_value = "4")]
    discovery_timeout: f32,

    /// Quit after this many frames (60 per second)
    #[arg(short = 'f', long)]
    frames: Option<u64>,

    /// Seed for the scripted input
    #[arg(long, default_value = "1")]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let mut rng = rand::thread_rng();

    let mut config = ClientConfig::new(args.name, args.color.as_deref(), &mut rng);
    config.server = args.server;
    config.discovery_port = args.discovery_port;
    config.discovery_timeout = timeout_from_secs(args.discovery_timeout)?;
    config.max_frames = args.frames;

    let server_addr = resolve_server(&config).await?;
    info!(
        "Connecting to {} as '{}' with color {:?}",
        server_addr, config.name, config.color
    );

    let avatar = LocalAvatar::spawn(config.name.clone(), config.color, &mut rng);
    let mut client = Client::connect(server_addr, avatar).await?;

    let mut input = ScriptedInput::new(args.seed, config.max_frames);
    let mut renderer = LogRenderer::default();

    tokio::select! {
        end = client.run(&mut input, &mut renderer) => match end {
            SessionEnd::Quit => info!("Left the arena"),
            SessionEnd::ServerClosed => warn!("Server went away"),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

async fn resolve_server(config: &ClientConfig) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    if let Some(server) = &config.server {
        let mut addrs = tokio::net::lookup_host(server.as_str()).await?;
        return addrs
            .next()
            .ok_or_else(|| format!("no address found for {}", server).into());
    }

    match discover_server(config.discovery_port, config.discovery_timeout).await {
        Some(addr) => Ok(addr),
        None => {
            let fallback = SocketAddr::from(([127, 0, 0, 1], TCP_PORT));
            warn!("No server discovered, falling back to {}", fallback);
            Ok(fallback)
        }
    }
}

//! Finds an arena server by listening for its LAN broadcast

use log::{debug, info, warn};
use shared::protocol::DiscoveryMessage;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;

/// Turns an announce datagram into the server's TCP address.
///
/// The datagram's source IP is used rather than the advertised `host`, which
/// may name an interface the client cannot reach.
pub fn parse_announce(datagram: &[u8], sender: SocketAddr) -> Option<SocketAddr> {
    match serde_json::from_slice::<DiscoveryMessage>(datagram) {
        Ok(DiscoveryMessage::ServerAnnounce(announce)) => {
            debug!(
                "Announce from {} ('{}', advertised host {:?})",
                sender, announce.name, announce.host
            );
            Some(SocketAddr::new(sender.ip(), announce.tcp_port))
        }
        Err(e) => {
            debug!("Ignoring datagram from {}: {}", sender, e);
            None
        }
    }
}

/// Waits on `socket` for the first valid announce, skipping anything else.
pub async fn listen_for_announce(socket: &UdpSocket, timeout: Duration) -> Option<SocketAddr> {
    let deadline = Instant::now() + timeout;
    let mut buffer = [0u8; 4096];

    loop {
        let received = tokio::time::timeout_at(deadline, socket.recv_from(&mut buffer)).await;
        match received {
            Err(_) => return None,
            Ok(Ok((len, sender))) => {
                if let Some(addr) = parse_announce(&buffer[..len], sender) {
                    return Some(addr);
                }
            }
            Ok(Err(e)) => {
                debug!("Discovery receive failed: {}", e);
            }
        }
    }
}

/// Binds the discovery port and waits up to `timeout` for a server.
pub async fn discover_server(port: u16, timeout: Duration) -> Option<SocketAddr> {
    let socket = match UdpSocket::bind(("0.0.0.0", port)).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!("Could not bind discovery port {}: {}", port, e);
            return None;
        }
    };

    info!("Searching for servers on UDP {} ({:?})...", port, timeout);
    let found = listen_for_announce(&socket, timeout).await;
    match found {
        Some(addr) => info!("Discovered server at {}", addr),
        None => info!("No server announced itself"),
    }
    found
}

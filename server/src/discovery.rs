//! LAN discovery beacon.
//!
//! Once a second the server broadcasts a `server_announce` datagram on the
//! discovery port. Clients trust the datagram's source address over the
//! `host` field, so an unreliable [`local_ip`] guess only affects logs.

use log::{debug, info};
use shared::protocol::{DiscoveryMessage, ServerAnnounce};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};

// Never contacted; connecting a UDP socket only selects the outbound route.
const ROUTE_PROBE: &str = "8.8.8.8:80";

/// Best guess at this host's LAN address, falling back to loopback.
pub fn local_ip() -> IpAddr {
    probe_route().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn probe_route() -> io::Result<IpAddr> {
    let socket = StdUdpSocket::bind("0.0.0.0:0")?;
    socket.connect(ROUTE_PROBE)?;
    Ok(socket.local_addr()?.ip())
}

pub struct Beacon {
    socket: UdpSocket,
    payload: Vec<u8>,
    target: SocketAddr,
    period: Duration,
}

impl Beacon {
    /// Binds an ephemeral broadcast-capable socket aimed at `target`.
    pub async fn bind(target: SocketAddr, announce: &ServerAnnounce, period: Duration) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.set_broadcast(true)?;
        let payload = serde_json::to_vec(&DiscoveryMessage::ServerAnnounce(announce.clone()))?;
        Ok(Self {
            socket,
            payload,
            target,
            period,
        })
    }

    /// Broadcast address for `port` on the local segment.
    pub fn broadcast_target(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub async fn announce_once(&self) -> io::Result<usize> {
        self.socket.send_to(&self.payload, self.target).await
    }

    /// Announces forever. Send failures are logged and retried next period.
    pub async fn run(self) {
        info!("Discovery beacon announcing to {} every {:?}", self.target, self.period);
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = self.announce_once().await {
                debug!("Discovery announce to {} failed: {}", self.target, e);
            }
        }
    }
}

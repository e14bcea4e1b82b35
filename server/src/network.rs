//! Server network layer: TCP accept loop plus the periodic world tasks

use crate::connection::serve_connection;
use crate::discovery::{local_ip, Beacon};
use crate::world::{Outbound, WorldState};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::protocol::ServerAnnounce;
use shared::{encode_line, ServerMessage, DISCOVERY_PORT, TCP_PORT};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Tunables for a server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub discovery_port: u16,
    /// Advertised in discovery announcements.
    pub name: String,
    pub beacon: bool,
    pub tick: Duration,
    pub broadcast_interval: Duration,
    pub beacon_interval: Duration,
    pub reap_interval: Duration,
    pub reap_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: TCP_PORT,
            discovery_port: DISCOVERY_PORT,
            name: "ArenaServer".to_string(),
            beacon: true,
            tick: Duration::from_secs_f64(1.0 / 60.0),
            broadcast_interval: Duration::from_millis(50),
            beacon_interval: Duration::from_secs(1),
            reap_interval: Duration::from_secs(5),
            reap_timeout: Duration::from_secs(12),
        }
    }
}

/// Authoritative arena server
pub struct Server {
    listener: TcpListener,
    world: Arc<WorldState>,
    config: ServerConfig,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let address = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&address).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            world: Arc::new(WorldState::new()),
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn world(&self) -> Arc<WorldState> {
        Arc::clone(&self.world)
    }

    /// Starts the periodic tasks and accepts connections until the listener fails hard.
    pub async fn run(self) -> io::Result<()> {
        let bound = self.listener.local_addr()?;

        tokio::spawn(run_simulation(self.world(), self.config.tick));
        tokio::spawn(run_broadcaster(self.world(), self.config.broadcast_interval));
        tokio::spawn(run_reaper(
            self.world(),
            self.config.reap_interval,
            self.config.reap_timeout,
        ));

        if self.config.beacon {
            self.spawn_beacon(bound.port()).await;
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                    }
                    tokio::spawn(serve_connection(stream, addr, self.world()));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    async fn spawn_beacon(&self, tcp_port: u16) {
        let announce = ServerAnnounce {
            host: Some(local_ip().to_string()),
            tcp_port,
            name: self.config.name.clone(),
        };
        let target = Beacon::broadcast_target(self.config.discovery_port);

        match Beacon::bind(target, &announce, self.config.beacon_interval).await {
            Ok(beacon) => {
                tokio::spawn(beacon.run());
            }
            Err(e) => warn!("Discovery beacon disabled: {}", e),
        }
    }
}

/// Advances bullets and combat on a fixed tick.
///
/// Elapsed wall-clock time is split into sub-steps of at most `tick`, so a
/// late tick catches up with several normal steps.
pub async fn run_simulation(world: Arc<WorldState>, tick: Duration) {
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut rng = StdRng::from_entropy();
    let step = tick.as_secs_f32();

    // Skip the first tick since it fires immediately
    ticker.tick().await;
    let mut last_update = Instant::now();

    loop {
        ticker.tick().await;

        let now = Instant::now();
        let elapsed = (now - last_update).as_secs_f32();
        last_update = now;

        for dt in crate::physics::substeps(elapsed, step) {
            let report = world.step(dt, &mut rng).await;
            for hit in report.hits.iter().filter(|h| h.killed) {
                info!("Player {} killed player {}", hit.owner, hit.victim);
            }
        }
    }
}

/// Queues one snapshot for every joined connection and returns how many took it.
///
/// A connection whose queue is full or whose writer is gone misses this
/// snapshot; nobody else is held up by it.
pub async fn broadcast_snapshot(world: &WorldState) -> usize {
    let targets = world.outbound_targets().await;
    if targets.is_empty() {
        return 0;
    }

    let snapshot = world.snapshot().await;
    let line: Outbound = match encode_line(&ServerMessage::State(snapshot)) {
        Ok(line) => Outbound::from(line),
        Err(e) => {
            error!("Failed to encode snapshot: {}", e);
            return 0;
        }
    };

    let mut delivered = 0;
    for (conn, outbound) in targets {
        match outbound.try_send(Arc::clone(&line)) {
            Ok(()) => delivered += 1,
            Err(TrySendError::Full(_)) => {
                warn!("Connection {} is not keeping up, dropped a snapshot", conn.0)
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Failed to queue snapshot for connection {}", conn.0)
            }
        }
    }
    delivered
}

pub async fn run_broadcaster(world: Arc<WorldState>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        broadcast_snapshot(&world).await;
    }
}

/// Periodically evicts players that stopped sending updates.
pub async fn run_reaper(world: Arc<WorldState>, period: Duration, timeout: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let reaped = world.reap_stale(std::time::Instant::now(), timeout).await;
        for id in reaped {
            info!("Player {} timed out", id);
        }
    }
}

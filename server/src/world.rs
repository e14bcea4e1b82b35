//! Authoritative world state shared by every server task.
//!
//! The store owns three collections, each behind its own lock: players,
//! bullets and the connection → player mapping. Callers only reach them
//! through the accessors below, and no accessor ever holds two of the locks
//! at the same time. Operations that touch several collections (a combat
//! step, a disconnect, a reap) take and release them one after another in a
//! fixed order.

use crate::entity::{Bullet, Player};
use crate::physics::{self, Hit};
use log::{debug, info, warn};
use rand::Rng;
use shared::{encode_line, BulletId, BulletView, Color, PlayerId, ServerMessage, WorldSnapshot};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot, RwLock};

/// One encoded line ready for a connection's writer task.
pub type Outbound = Arc<str>;

/// Lines a connection may have queued before further snapshots are dropped.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Identifies a TCP connection for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

/// What the world keeps for a joined connection.
///
/// Dropping the handle closes the connection: its receive loop is waiting on
/// the other end of `close_signal`.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub player_id: PlayerId,
    outbound: mpsc::Sender<Outbound>,
    close_signal: oneshot::Sender<()>,
}

impl ConnectionHandle {
    pub fn new(
        player_id: PlayerId,
        outbound: mpsc::Sender<Outbound>,
        close_signal: oneshot::Sender<()>,
    ) -> Self {
        Self {
            player_id,
            outbound,
            close_signal,
        }
    }

    /// Asks the connection's receive loop to stop.
    pub fn close(self) {
        // The loop may already be gone
        let _ = self.close_signal.send(());
    }
}

/// Result of one simulation sub-step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub hits: Vec<Hit>,
    /// Bullets removed because their time ran out. Never overlaps `hits`.
    pub expired: Vec<BulletId>,
}

pub struct WorldState {
    players: RwLock<BTreeMap<PlayerId, Player>>,
    bullets: RwLock<Vec<Bullet>>,
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    next_player_id: AtomicU32,
    next_bullet_id: AtomicU32,
    next_connection_id: AtomicU64,
}

impl WorldState {
    pub fn new() -> Self {
        Self {
            players: RwLock::new(BTreeMap::new()),
            bullets: RwLock::new(Vec::new()),
            connections: RwLock::new(HashMap::new()),
            next_player_id: AtomicU32::new(1),
            next_bullet_id: AtomicU32::new(1),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Ids are handed out once and never reused.
    pub fn next_player_id(&self) -> PlayerId {
        PlayerId::new(self.next_player_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Admits a new player on `conn`, named `Player{id}` when `name` is blank.
    ///
    /// The `join_ack` is queued on `outbound` before the connection is
    /// registered, so it always precedes the first snapshot on that socket.
    pub async fn join(
        &self,
        conn: ConnectionId,
        name: Option<String>,
        color: Color,
        outbound: mpsc::Sender<Outbound>,
        close_signal: oneshot::Sender<()>,
    ) -> PlayerId {
        let id = self.next_player_id();

        match encode_line(&ServerMessage::JoinAck { id }) {
            Ok(line) => {
                if let Err(e) = outbound.try_send(Outbound::from(line)) {
                    debug!("Connection {}: could not queue join_ack: {}", conn.0, e);
                }
            }
            Err(e) => warn!("Failed to encode join_ack for player {}: {}", id, e),
        }

        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Player{}", id));
        let player = Player::new(id, name, color);
        let handle = ConnectionHandle::new(id, outbound, close_signal);
        self.insert_player(conn, handle, player).await;
        id
    }

    /// Registers a joined player and then its connection.
    ///
    /// The broadcaster reads its targets before the snapshot, so a connection
    /// that receives any snapshot always finds its own player in it.
    pub async fn insert_player(&self, conn: ConnectionId, handle: ConnectionHandle, player: Player) {
        self.players.write().await.insert(player.id, player);
        self.connections.write().await.insert(conn, handle);
    }

    /// Overwrites a player's self-reported position and refreshes its heartbeat.
    ///
    /// Non-finite coordinates are refused: they would serialize as `null` and
    /// spoil every snapshot.
    pub async fn update_position(&self, id: PlayerId, x: f32, y: f32) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        let mut players = self.players.write().await;
        match players.get_mut(&id) {
            Some(player) => {
                player.x = x;
                player.y = y;
                player.touch(Instant::now());
                true
            }
            None => false,
        }
    }

    /// Fires a bullet from `owner`'s current position.
    ///
    /// Returns `None` for an unknown owner or a zero-length direction.
    pub async fn spawn_bullet(&self, owner: PlayerId, dx: f32, dy: f32) -> Option<BulletId> {
        shared::normalize(dx, dy)?;
        let origin = self.players.read().await.get(&owner)?.position();

        let id = BulletId::new(self.next_bullet_id.fetch_add(1, Ordering::SeqCst));
        let bullet = Bullet::fire(id, owner, origin, dx, dy)?;
        self.bullets.write().await.push(bullet);
        Some(id)
    }

    /// Runs one simulation sub-step of `dt` seconds.
    ///
    /// Bullets are integrated and copied under the bullet lock, hits are
    /// resolved and applied under the player lock, then the bullet lock is
    /// taken again to drop everything that hit or expired.
    pub async fn step<R: Rng>(&self, dt: f32, rng: &mut R) -> StepReport {
        let (moved, expired) = {
            let mut bullets = self.bullets.write().await;
            let expired = physics::integrate(&mut bullets, dt);
            (bullets.clone(), expired)
        };

        let mut hits = Vec::new();
        if !moved.is_empty() {
            let mut players = self.players.write().await;
            hits = physics::resolve_hits(&moved, &players);
            physics::apply_hits(&mut hits, &mut players, rng);
        }

        let hit_ids: HashSet<BulletId> = hits.iter().map(|h| h.bullet).collect();
        let expired: Vec<BulletId> = expired
            .into_iter()
            .filter(|id| !hit_ids.contains(id))
            .collect();

        if !hit_ids.is_empty() || !expired.is_empty() {
            let mut bullets = self.bullets.write().await;
            bullets.retain(|b| !hit_ids.contains(&b.id) && !expired.contains(&b.id));
        }

        StepReport { hits, expired }
    }

    /// Copies the public fields of every player and bullet.
    pub async fn snapshot(&self) -> WorldSnapshot {
        let players = self
            .players
            .read()
            .await
            .iter()
            .map(|(id, p)| (*id, p.view()))
            .collect();
        let bullets: Vec<BulletView> = self.bullets.read().await.iter().map(Bullet::view).collect();

        WorldSnapshot {
            players,
            bullets,
            time: unix_time(),
        }
    }

    /// Outbound channels of every joined connection.
    pub async fn outbound_targets(&self) -> Vec<(ConnectionId, mpsc::Sender<Outbound>)> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(conn, handle)| (*conn, handle.outbound.clone()))
            .collect()
    }

    /// Removes a connection's player and then its mapping.
    ///
    /// Only the caller that takes the mapping out gets the id back, so calling
    /// this again for the same connection does nothing and returns `None`.
    pub async fn disconnect(&self, conn: ConnectionId) -> Option<PlayerId> {
        let id = self.connections.read().await.get(&conn)?.player_id;
        self.players.write().await.remove(&id);
        self.connections.write().await.remove(&conn)?;
        debug!("Removed player {} and connection {}", id, conn.0);
        Some(id)
    }

    /// Evicts every player whose last heartbeat is older than `timeout`.
    ///
    /// The players are removed first, then their connections are unmapped and
    /// closed. Returns the reaped ids in ascending order.
    pub async fn reap_stale(&self, now: Instant, timeout: Duration) -> Vec<PlayerId> {
        let stale: Vec<PlayerId> = self
            .players
            .read()
            .await
            .values()
            .filter(|p| p.is_timed_out(now, timeout))
            .map(|p| p.id)
            .collect();

        if stale.is_empty() {
            return stale;
        }

        {
            let mut players = self.players.write().await;
            for id in &stale {
                players.remove(id);
            }
        }

        let closed: Vec<ConnectionHandle> = {
            let mut connections = self.connections.write().await;
            let conns: Vec<ConnectionId> = connections
                .iter()
                .filter(|(_, handle)| stale.contains(&handle.player_id))
                .map(|(conn, _)| *conn)
                .collect();
            conns
                .iter()
                .filter_map(|conn| connections.remove(conn))
                .collect()
        };
        for handle in closed {
            handle.close();
        }

        info!("Reaped {} inactive player(s)", stale.len());
        stale
    }

    pub async fn player(&self, id: PlayerId) -> Option<Player> {
        self.players.read().await.get(&id).cloned()
    }

    pub async fn bullets(&self) -> Vec<Bullet> {
        self.bullets.read().await.clone()
    }

    pub async fn player_count(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn bullet_count(&self) -> usize {
        self.bullets.read().await.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs_f64()
}

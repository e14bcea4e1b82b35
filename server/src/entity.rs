use shared::{
    normalize, spawn_position, BulletId, BulletView, Color, PlayerId, PlayerView, BULLET_SPAWN_OFFSET,
    BULLET_SPEED, BULLET_TTL, MAX_HEALTH,
};
use std::time::{Duration, Instant};

/// Authoritative server-side player record.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub color: Color,
    /// May dip below zero inside a combat pass before the respawn rule resets it.
    pub hp: i32,
    pub kills: u32,
    pub last_seen: Instant,
}

impl Player {
    /// Creates a player at the deterministic spawn point for `id`.
    pub fn new(id: PlayerId, name: String, color: Color) -> Self {
        let (x, y) = spawn_position(id);
        Self {
            id,
            name,
            x,
            y,
            color,
            hp: MAX_HEALTH,
            kills: 0,
            last_seen: Instant::now(),
        }
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    // Refresh the heartbeat
    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
    }

    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            color: self.color,
            hp: self.hp,
            kills: self.kills,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub id: BulletId,
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Seconds left before expiry.
    pub ttl: f32,
}

impl Bullet {
    /// Fires a bullet from `origin` toward `(dx, dy)`.
    ///
    /// The direction is normalized here; a zero-length direction fires nothing.
    pub fn fire(id: BulletId, owner: PlayerId, origin: (f32, f32), dx: f32, dy: f32) -> Option<Self> {
        let (nx, ny) = normalize(dx, dy)?;
        Some(Self {
            id,
            owner,
            x: origin.0 + nx * BULLET_SPAWN_OFFSET,
            y: origin.1 + ny * BULLET_SPAWN_OFFSET,
            vx: nx * BULLET_SPEED,
            vy: ny * BULLET_SPEED,
            ttl: BULLET_TTL,
        })
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn view(&self) -> BulletView {
        BulletView {
            id: self.id,
            x: self.x,
            y: self.y,
            owner: self.owner,
        }
    }
}

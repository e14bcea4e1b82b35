use crate::rendering::{OwnAvatar, RenderFrame};
use log::{debug, info};
use rand::Rng;
use shared::{BulletView, Color, PlayerId, PlayerView, ServerMessage, WorldSnapshot, MAX_HEALTH};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Local movement speed in pixels per second.
pub const MOVE_SPEED: f32 = 200.0;

/// How far from the world edge the predicted avatar may go.
pub const EDGE_MARGIN: f32 = 10.0;

/// Client position updates per second.
pub const UPDATE_RATE: f32 = 20.0;

const MIN_X: f32 = EDGE_MARGIN;
const MAX_X: f32 = shared::WORLD_WIDTH - EDGE_MARGIN;
const MIN_Y: f32 = EDGE_MARGIN;
const MAX_Y: f32 = shared::WORLD_HEIGHT - EDGE_MARGIN;

/// The player's own avatar, moved locally from input.
///
/// The server never corrects this position; it only echoes it back to
/// everyone else.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalAvatar {
    pub name: String,
    pub color: Color,
    pub x: f32,
    pub y: f32,
}

impl LocalAvatar {
    pub fn new(name: String, color: Color, x: f32, y: f32) -> Self {
        Self { name, color, x, y }
    }

    /// Places the avatar somewhere away from the edges.
    pub fn spawn<R: Rng>(name: String, color: Color, rng: &mut R) -> Self {
        let x = rng.gen_range(50.0..=750.0);
        let y = rng.gen_range(50.0..=550.0);
        Self::new(name, color, x, y)
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    /// Moves by `movement` for `dt` seconds and clamps to the playfield.
    pub fn advance(&mut self, movement: (i8, i8), dt: f32) {
        let mut dx = movement.0.signum() as f32;
        let mut dy = movement.1.signum() as f32;
        if dx != 0.0 && dy != 0.0 {
            dx *= std::f32::consts::FRAC_1_SQRT_2;
            dy *= std::f32::consts::FRAC_1_SQRT_2;
        }

        self.x = (self.x + dx * MOVE_SPEED * dt).clamp(MIN_X, MAX_X);
        self.y = (self.y + dy * MOVE_SPEED * dt).clamp(MIN_Y, MAX_Y);
    }
}

/// Client view of the arena: the predicted avatar plus the latest snapshot.
#[derive(Debug, Clone)]
pub struct ClientGameState {
    my_id: Option<PlayerId>,
    avatar: LocalAvatar,
    players: BTreeMap<PlayerId, PlayerView>,
    bullets: Vec<BulletView>,
    last_server_time: Option<f64>,
}

impl ClientGameState {
    pub fn new(avatar: LocalAvatar) -> Self {
        Self {
            my_id: None,
            avatar,
            players: BTreeMap::new(),
            bullets: Vec::new(),
            last_server_time: None,
        }
    }

    pub fn my_id(&self) -> Option<PlayerId> {
        self.my_id
    }

    pub fn avatar(&self) -> &LocalAvatar {
        &self.avatar
    }

    pub fn last_server_time(&self) -> Option<f64> {
        self.last_server_time
    }

    pub fn apply_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::JoinAck { id } => {
                info!("Joined as player {}", id);
                self.my_id = Some(id);
            }
            ServerMessage::State(snapshot) => self.apply_snapshot(snapshot),
        }
    }

    // Snapshots replace the remote view wholesale
    fn apply_snapshot(&mut self, snapshot: WorldSnapshot) {
        debug!(
            "Snapshot at {:.3}: {} players, {} bullets",
            snapshot.time,
            snapshot.players.len(),
            snapshot.bullets.len()
        );
        self.players = snapshot.players;
        self.bullets = snapshot.bullets;
        self.last_server_time = Some(snapshot.time);
    }

    pub fn advance(&mut self, movement: (i8, i8), dt: f32) {
        self.avatar.advance(movement, dt);
    }

    /// Direction from the predicted position to `target`, or `None` when they coincide.
    pub fn shoot_toward(&self, target: (f32, f32)) -> Option<(f32, f32)> {
        let dx = target.0 - self.avatar.x;
        let dy = target.1 - self.avatar.y;
        shared::normalize(dx, dy).map(|_| (dx, dy))
    }

    /// Our health according to the latest snapshot, full until the server says otherwise.
    pub fn own_health(&self) -> i32 {
        self.my_id
            .and_then(|id| self.players.get(&id))
            .map(|p| p.hp)
            .unwrap_or(MAX_HEALTH)
    }

    pub fn remote_players(&self) -> impl Iterator<Item = (&PlayerId, &PlayerView)> {
        let me = self.my_id;
        self.players.iter().filter(move |(id, _)| Some(**id) != me)
    }

    pub fn bullets(&self) -> &[BulletView] {
        &self.bullets
    }

    pub fn frame(&self) -> RenderFrame {
        RenderFrame {
            my_id: self.my_id,
            own: OwnAvatar {
                name: self.avatar.name.clone(),
                x: self.avatar.x,
                y: self.avatar.y,
                color: self.avatar.color,
                hp: self.own_health(),
            },
            others: self
                .remote_players()
                .map(|(id, view)| (*id, view.clone()))
                .collect(),
            bullets: self.bullets.clone(),
        }
    }
}

/// Rate-limits position updates independently of the frame rate.
#[derive(Debug, Clone)]
pub struct UpdateThrottle {
    period: Duration,
    last_sent: Option<Instant>,
}

impl UpdateThrottle {
    pub fn new(rate_hz: f32) -> Self {
        Self {
            period: Duration::from_secs_f32(1.0 / rate_hz),
            last_sent: None,
        }
    }

    /// Returns true when an update is due at `now`, and records it as sent.
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = match self.last_sent {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        };
        if due {
            self.last_sent = Some(now);
        }
        due
    }
}

impl Default for UpdateThrottle {
    fn default() -> Self {
        Self::new(UPDATE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn avatar_at(x: f32, y: f32) -> LocalAvatar {
        LocalAvatar::new("me".to_string(), [9, 9, 9], x, y)
    }

    fn view(name: &str, x: f32, y: f32, hp: i32) -> PlayerView {
        PlayerView {
            name: name.to_string(),
            x,
            y,
            color: [255, 0, 0],
            hp,
            kills: 0,
        }
    }

    fn snapshot(players: Vec<(u32, PlayerView)>) -> ServerMessage {
        ServerMessage::State(WorldSnapshot {
            players: players
                .into_iter()
                .map(|(id, v)| (PlayerId::new(id), v))
                .collect(),
            bullets: vec![BulletView {
                id: shared::BulletId::new(4),
                x: 1.0,
                y: 2.0,
                owner: PlayerId::new(2),
            }],
            time: 1234.5,
        })
    }

    #[test]
    fn test_straight_movement() {
        let mut avatar = avatar_at(400.0, 300.0);
        avatar.advance((1, 0), 0.5);
        assert_approx_eq!(avatar.x, 500.0);
        assert_approx_eq!(avatar.y, 300.0);
    }

    #[test]
    fn test_diagonal_movement_is_normalized() {
        let mut avatar = avatar_at(400.0, 300.0);
        avatar.advance((1, 1), 1.0);

        let moved = ((avatar.x - 400.0).powi(2) + (avatar.y - 300.0).powi(2)).sqrt();
        assert_approx_eq!(moved, MOVE_SPEED, 1e-3);
        assert_approx_eq!(avatar.x - 400.0, 141.421_36, 1e-3);
    }

    #[test]
    fn test_movement_clamps_to_playfield() {
        let mut avatar = avatar_at(20.0, 580.0);
        avatar.advance((-1, 1), 1.0);
        assert_eq!(avatar.position(), (10.0, 590.0));

        avatar.advance((1, -1), 10.0);
        assert_eq!(avatar.position(), (790.0, 10.0));
    }

    #[test]
    fn test_spawn_stays_inside_margin() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let avatar = LocalAvatar::spawn("a".to_string(), [0, 0, 0], &mut rng);
            assert!((50.0..=750.0).contains(&avatar.x));
            assert!((50.0..=550.0).contains(&avatar.y));
        }
    }

    #[test]
    fn test_join_ack_and_snapshot() {
        let mut state = ClientGameState::new(avatar_at(100.0, 100.0));
        assert_eq!(state.own_health(), MAX_HEALTH);

        state.apply_server_message(ServerMessage::JoinAck { id: PlayerId::new(1) });
        assert_eq!(state.my_id(), Some(PlayerId::new(1)));

        state.apply_server_message(snapshot(vec![
            (1, view("me", 700.0, 500.0, 75)),
            (2, view("them", 300.0, 300.0, 100)),
        ]));

        assert_eq!(state.own_health(), 75);
        // Own position is never taken from the server
        assert_eq!(state.avatar().position(), (100.0, 100.0));
        assert_eq!(state.last_server_time(), Some(1234.5));

        let frame = state.frame();
        assert_eq!(frame.others.len(), 1);
        assert_eq!(frame.others[0].0, PlayerId::new(2));
        assert_eq!(frame.own.hp, 75);
        assert_eq!(frame.bullets.len(), 1);
    }

    #[test]
    fn test_snapshot_replaces_previous_sets() {
        let mut state = ClientGameState::new(avatar_at(100.0, 100.0));
        state.apply_server_message(snapshot(vec![
            (2, view("a", 1.0, 1.0, 100)),
            (3, view("b", 2.0, 2.0, 100)),
        ]));
        state.apply_server_message(ServerMessage::State(WorldSnapshot::default()));

        assert_eq!(state.remote_players().count(), 0);
        assert!(state.bullets().is_empty());
    }

    #[test]
    fn test_shoot_toward() {
        let state = ClientGameState::new(avatar_at(100.0, 100.0));
        assert_eq!(state.shoot_toward((200.0, 150.0)), Some((100.0, 50.0)));
        assert_eq!(state.shoot_toward((100.0, 100.0)), None);
    }

    #[test]
    fn test_throttle_limits_to_rate() {
        let mut throttle = UpdateThrottle::new(20.0);
        let start = Instant::now();

        // 60 frames over one second
        let sent = (0..60)
            .filter(|i| throttle.ready(start + Duration::from_micros(i * 16_667)))
            .count();
        assert!((19..=21).contains(&sent), "sent {}", sent);
    }
}

pub mod framing;
pub mod protocol;

pub use framing::{encode_line, FrameError, FramedReader, LineFramer};
pub use protocol::{
    BulletId, BulletView, ClientMessage, Color, PlayerId, PlayerView, ServerAnnounce,
    ServerMessage, WorldSnapshot,
};

pub const TCP_PORT: u16 = 5000;
pub const DISCOVERY_PORT: u16 = 5001;

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const PLAYER_RADIUS: f32 = 16.0;
pub const MAX_HEALTH: i32 = 100;

pub const BULLET_SPEED: f32 = 420.0;
pub const BULLET_TTL: f32 = 2.5;
pub const BULLET_SPAWN_OFFSET: f32 = 20.0;
pub const BULLET_DAMAGE: i32 = 25;

pub const DEFAULT_COLOR: Color = [255, 0, 0];

/// Normalizes a direction vector.
///
/// Returns `None` when the magnitude is too small to carry a direction.
pub fn normalize(dx: f32, dy: f32) -> Option<(f32, f32)> {
    let magnitude = dx.hypot(dy);
    if !magnitude.is_finite() || magnitude <= 0.0001 {
        return None;
    }
    Some((dx / magnitude, dy / magnitude))
}

pub fn distance_squared(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

/// Deterministic spawn point for a freshly joined player.
pub fn spawn_position(id: PlayerId) -> (f32, f32) {
    let n = id.value() as u64;
    (
        100.0 + ((n * 37) % 600) as f32,
        100.0 + ((n * 23) % 400) as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_normalize_unit_length() {
        let (x, y) = normalize(3.0, 4.0).unwrap();
        assert_approx_eq!(x, 0.6, 1e-6);
        assert_approx_eq!(y, 0.8, 1e-6);
    }

    #[test]
    fn test_normalize_rejects_zero_vector() {
        assert!(normalize(0.0, 0.0).is_none());
        assert!(normalize(0.00001, 0.0).is_none());
        assert!(normalize(f32::NAN, 1.0).is_none());
    }

    #[test]
    fn test_normalize_large_direction() {
        let (x, y) = normalize(1e20, 0.0).unwrap();
        assert_approx_eq!(x, 1.0, 1e-6);
        assert_approx_eq!(y, 0.0, 1e-6);

        let (x, y) = normalize(-3e30, 4e30).unwrap();
        assert_approx_eq!(x, -0.6, 1e-6);
        assert_approx_eq!(y, 0.8, 1e-6);
    }

    #[test]
    fn test_distance_squared() {
        assert_eq!(distance_squared((0.0, 0.0), (3.0, 4.0)), 25.0);
        assert_eq!(distance_squared((10.0, 10.0), (10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_spawn_position_is_derived_from_id() {
        assert_eq!(spawn_position(PlayerId::new(3)), (211.0, 169.0));
        assert_eq!(spawn_position(PlayerId::new(1)), (137.0, 123.0));
        assert_eq!(
            spawn_position(PlayerId::new(3)),
            spawn_position(PlayerId::new(3))
        );
    }

    #[test]
    fn test_spawn_position_stays_in_arena() {
        for n in 1..500 {
            let (x, y) = spawn_position(PlayerId::new(n));
            assert!((100.0..700.0).contains(&x));
            assert!((100.0..500.0).contains(&y));
        }
    }
}

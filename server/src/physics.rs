//! Bullet integration, hit detection and combat rules.
//!
//! Everything here works on plain collections so the world store can run it
//! under whichever lock owns the data. Iteration orders are fixed (bullets by
//! ascending id, players by ascending id) so identical inputs always produce
//! identical outcomes.

use crate::entity::{Bullet, Player};
use rand::Rng;
use shared::{
    distance_squared, BulletId, PlayerId, BULLET_DAMAGE, MAX_HEALTH, PLAYER_RADIUS, WORLD_HEIGHT,
    WORLD_WIDTH,
};
use std::collections::BTreeMap;

pub const HIT_RADIUS_SQUARED: f32 = PLAYER_RADIUS * PLAYER_RADIUS;

/// Margin kept between a respawn point and the arena edge.
pub const RESPAWN_MARGIN: f32 = 50.0;

// Absorbs rounding left over after summing fixed f32 sub-steps.
const TTL_EPSILON: f32 = 1e-4;

// Remainders smaller than this are not worth a sub-step.
const MIN_SUBSTEP: f32 = 1e-6;

/// A bullet that touched a player during one sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub bullet: BulletId,
    pub owner: PlayerId,
    pub victim: PlayerId,
    /// Set by [`apply_hits`] when this hit took the victim to zero health.
    pub killed: bool,
}

/// Advances every bullet by `dt` seconds.
///
/// Returns the ids whose time-to-live ran out. They are left in place; the
/// caller removes them after combat resolution so a bullet is only ever
/// removed once.
pub fn integrate(bullets: &mut [Bullet], dt: f32) -> Vec<BulletId> {
    let mut expired = Vec::new();
    for bullet in bullets.iter_mut() {
        bullet.x += bullet.vx * dt;
        bullet.y += bullet.vy * dt;
        bullet.ttl -= dt;
        if bullet.ttl <= TTL_EPSILON {
            expired.push(bullet.id);
        }
    }
    expired
}

/// Finds at most one victim per bullet.
///
/// All tests use the player positions as they are when resolution starts,
/// and a bullet never hits its own owner.
pub fn resolve_hits(bullets: &[Bullet], players: &BTreeMap<PlayerId, Player>) -> Vec<Hit> {
    let mut ordered: Vec<&Bullet> = bullets.iter().collect();
    ordered.sort_by_key(|b| b.id);

    ordered
        .into_iter()
        .filter_map(|bullet| {
            players
                .values()
                .filter(|p| p.id != bullet.owner)
                .find(|p| distance_squared(bullet.position(), p.position()) <= HIT_RADIUS_SQUARED)
                .map(|victim| Hit {
                    bullet: bullet.id,
                    owner: bullet.owner,
                    victim: victim.id,
                    killed: false,
                })
        })
        .collect()
}

/// Applies damage for each hit in order, crediting kills and respawning victims.
pub fn apply_hits<R: Rng>(hits: &mut [Hit], players: &mut BTreeMap<PlayerId, Player>, rng: &mut R) {
    for hit in hits.iter_mut() {
        let Some(victim) = players.get_mut(&hit.victim) else {
            continue;
        };

        victim.hp -= BULLET_DAMAGE;
        if victim.hp > 0 {
            continue;
        }

        let (x, y) = respawn_position(rng);
        victim.hp = MAX_HEALTH;
        victim.x = x;
        victim.y = y;
        hit.killed = true;

        if let Some(owner) = players.get_mut(&hit.owner) {
            owner.kills += 1;
        }
    }
}

/// Uniformly random point inside the arena, away from the walls.
pub fn respawn_position<R: Rng>(rng: &mut R) -> (f32, f32) {
    (
        RESPAWN_MARGIN + rng.gen::<f32>() * (WORLD_WIDTH - 2.0 * RESPAWN_MARGIN),
        RESPAWN_MARGIN + rng.gen::<f32>() * (WORLD_HEIGHT - 2.0 * RESPAWN_MARGIN),
    )
}

/// Splits an elapsed wall-clock interval into sub-steps no longer than `step`.
///
/// A stall of several frames turns into several ordinary steps instead of
/// one large jump.
pub fn substeps(elapsed: f32, step: f32) -> Vec<f32> {
    let mut steps = Vec::new();
    if step <= 0.0 || !elapsed.is_finite() {
        return steps;
    }

    let mut remaining = elapsed;
    while remaining > MIN_SUBSTEP {
        let dt = remaining.min(step);
        steps.push(dt);
        remaining -= dt;
    }
    steps
}

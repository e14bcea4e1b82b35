//! Player intent sources

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{WORLD_HEIGHT, WORLD_WIDTH};

/// What the player wants to do this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputIntent {
    /// Each component is -1, 0 or 1 (left/up negative).
    pub movement: (i8, i8),
    /// World point to fire toward.
    pub shoot_at: Option<(f32, f32)>,
    pub quit: bool,
}

/// Anything that can be polled once per frame for player intent.
pub trait InputSource {
    fn poll(&mut self) -> InputIntent;
}

/// Headless input: wanders in random directions and fires periodically.
pub struct ScriptedInput {
    rng: StdRng,
    frame: u64,
    max_frames: Option<u64>,
    turn_every: u64,
    fire_every: u64,
    movement: (i8, i8),
}

impl ScriptedInput {
    pub fn new(seed: u64, max_frames: Option<u64>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            frame: 0,
            max_frames,
            turn_every: 45,
            fire_every: 30,
            movement: (0, 0),
        }
    }

    pub fn with_fire_every(mut self, frames: u64) -> Self {
        self.fire_every = frames.max(1);
        self
    }

    pub fn frames(&self) -> u64 {
        self.frame
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> InputIntent {
        if self.max_frames.is_some_and(|max| self.frame >= max) {
            return InputIntent {
                quit: true,
                ..InputIntent::default()
            };
        }

        if self.frame % self.turn_every == 0 {
            self.movement = (self.rng.gen_range(-1..=1), self.rng.gen_range(-1..=1));
        }

        let shoot_at = (self.frame % self.fire_every == self.fire_every - 1).then(|| {
            (
                self.rng.gen_range(0.0..WORLD_WIDTH),
                self.rng.gen_range(0.0..WORLD_HEIGHT),
            )
        });

        self.frame += 1;
        InputIntent {
            movement: self.movement,
            shoot_at,
            quit: false,
        }
    }
}

use log::info;
use shared::{BulletView, Color, PlayerId, PlayerView, MAX_HEALTH};

/// The local avatar as it should be drawn: predicted position, server health.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnAvatar {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub color: Color,
    pub hp: i32,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub my_id: Option<PlayerId>,
    pub own: OwnAvatar,
    /// Remote players from the latest snapshot, never including ourselves.
    pub others: Vec<(PlayerId, PlayerView)>,
    pub bullets: Vec<BulletView>,
}

impl RenderFrame {
    /// Health as a fraction of the bar, clamped to `0.0..=1.0`.
    pub fn health_fraction(hp: i32) -> f32 {
        (hp.clamp(0, MAX_HEALTH) as f32) / MAX_HEALTH as f32
    }
}

/// Presents frames somewhere: a window, a log, a test buffer.
pub trait RenderSink {
    fn present(&mut self, frame: &RenderFrame);
}

/// Headless renderer that logs a summary every `every` frames.
pub struct LogRenderer {
    every: u64,
    frames: u64,
}

impl LogRenderer {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for LogRenderer {
    fn default() -> Self {
        // Once a second at 60 fps
        Self::new(60)
    }
}

impl RenderSink for LogRenderer {
    fn present(&mut self, frame: &RenderFrame) {
        self.frames += 1;
        if self.frames % self.every != 0 {
            return;
        }

        let id = frame
            .my_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".to_string());
        info!(
            "{} (you, id {}) at ({:.0}, {:.0}) health {:.0}% | {} other player(s), {} bullet(s)",
            frame.own.name,
            id,
            frame.own.x,
            frame.own.y,
            RenderFrame::health_fraction(frame.own.hp) * 100.0,
            frame.others.len(),
            frame.bullets.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn frame() -> RenderFrame {
        RenderFrame {
            my_id: Some(PlayerId::new(1)),
            own: OwnAvatar {
                name: "me".to_string(),
                x: 10.0,
                y: 20.0,
                color: [1, 2, 3],
                hp: 100,
            },
            others: Vec::new(),
            bullets: Vec::new(),
        }
    }

    #[test]
    fn test_health_fraction_clamps() {
        assert_approx_eq!(RenderFrame::health_fraction(100), 1.0);
        assert_approx_eq!(RenderFrame::health_fraction(25), 0.25);
        assert_approx_eq!(RenderFrame::health_fraction(-25), 0.0);
        assert_approx_eq!(RenderFrame::health_fraction(250), 1.0);
    }

    #[test]
    fn test_log_renderer_counts_frames() {
        let mut renderer = LogRenderer::new(0);
        let frame = frame();
        for _ in 0..5 {
            renderer.present(&frame);
        }
        assert_eq!(renderer.frames(), 5);
    }
}

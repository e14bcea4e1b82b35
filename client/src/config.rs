//! Client settings and the identity defaults used when none are given

use rand::Rng;
use shared::{Color, DISCOVERY_PORT};
use std::time::{Duration, TryFromFloatSecsError};

/// Resolved client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Explicit `host:port`; `None` means discover on the LAN first.
    pub server: Option<String>,
    pub name: String,
    pub color: Color,
    pub discovery_port: u16,
    pub discovery_timeout: Duration,
    /// Stop after this many frames when driven by scripted input.
    pub max_frames: Option<u64>,
}

impl ClientConfig {
    /// Fills in a random name and color where the user left them blank.
    pub fn new<R: Rng>(name: Option<String>, color: Option<&str>, rng: &mut R) -> Self {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| random_name(rng));
        let color = color.and_then(parse_color).unwrap_or_else(|| random_color(rng));

        Self {
            server: None,
            name,
            color,
            discovery_port: DISCOVERY_PORT,
            discovery_timeout: Duration::from_secs(4),
            max_frames: None,
        }
    }
}

/// Parses `"r,g,b"`, clamping each channel to 0..=255.
///
/// Returns `None` for blank input, `random`/`r`, or anything malformed.
pub fn parse_color(input: &str) -> Option<Color> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("r") || input.eq_ignore_ascii_case("random") {
        return None;
    }

    let parts: Vec<&str> = input.split(',').collect();
    if parts.len() != 3 {
        return None;
    }

    let mut color = [0u8; 3];
    for (channel, part) in color.iter_mut().zip(parts) {
        let value: i64 = part.trim().parse().ok()?;
        *channel = value.clamp(0, 255) as u8;
    }
    Some(color)
}

/// Converts a timeout given in seconds. Negative values mean no wait.
///
/// Infinite or out-of-range values are an error rather than a panic.
pub fn timeout_from_secs(secs: f32) -> Result<Duration, TryFromFloatSecsError> {
    Duration::try_from_secs_f32(secs.max(0.0))
}

pub fn random_name<R: Rng>(rng: &mut R) -> String {
    format!("Player{}", rng.gen_range(1000..=9999))
}

// Channels start at 40 so avatars stay visible on a dark background
pub fn random_color<R: Rng>(rng: &mut R) -> Color {
    [
        rng.gen_range(40..=255),
        rng.gen_range(40..=255),
        rng.gen_range(40..=255),
    ]
}

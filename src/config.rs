use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Player tuning, read from a RON file. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Margin added to every booking so the engine always receives it
    /// ahead of time. Seconds.
    pub lookahead_secs: f64,
    /// Bookings closer than this to their onset are not moved by a speed
    /// change. Seconds.
    pub reschedule_guard_secs: f64,
    /// Non-positive speeds are clamped up to this.
    pub min_speed: f64,
    /// Cadence of the playback loop.
    pub frame_interval_ms: u64,
    /// 0 -> 100
    pub initial_volume: u8,
    pub command_queue_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: 0.05,
            reschedule_guard_secs: 0.05,
            min_speed: 0.01,
            frame_interval_ms: 16,
            initial_volume: 70,
            command_queue_capacity: 1024,
        }
    }
}

impl PlayerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let ron_string = fs::read_to_string(path)?;
        let config: PlayerConfig = ron::from_str(&ron_string)?;
        Ok(config)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: PlayerConfig = ron::from_str("(lookahead_secs: 0.08)").unwrap();
        assert_eq!(config.lookahead_secs, 0.08);
        assert_eq!(config.min_speed, PlayerConfig::default().min_speed);
        assert_eq!(config.initial_volume, 70);
    }

    #[test]
    fn frame_interval_is_never_zero() {
        let config = PlayerConfig {
            frame_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_millis(1));
    }
}

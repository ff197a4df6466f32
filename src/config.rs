use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Real-time playback settings, read from a RON file. Missing fields keep
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How far ahead of the playback position events are scheduled.
    pub lookahead_beats: f64,
    pub ring_capacity: usize,
    pub poll_interval_ms: u64,
    /// Substring of the MIDI output port name. Without it the score is
    /// only logged.
    pub midi_port: Option<String>,
    pub midi_channel: u8,
    pub log_filter: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            lookahead_beats: 1.0,
            ring_capacity: 4096,
            poll_interval_ms: 5,
            midi_port: None,
            midi_channel: 0,
            log_filter: "info".to_string(),
        }
    }
}

impl PlaybackConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ron_string = fs::read_to_string(path)?;
        let config: PlaybackConfig = ron::from_str(&ron_string)?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

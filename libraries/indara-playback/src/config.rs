//! Playback engine configuration

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the playback engine
///
/// Durations are written as milliseconds in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Status polling cadence for poll-mode backends (default: 500ms)
    #[serde(with = "millis", rename = "poll_interval_ms")]
    pub poll_interval: Duration,

    /// Minimum spacing between session snapshots while playing (default: 5s)
    #[serde(with = "millis", rename = "persist_interval_ms")]
    pub persist_interval: Duration,

    /// Pause before skipping past an unplayable track (default: 1s)
    #[serde(with = "millis", rename = "auto_skip_delay_ms")]
    pub auto_skip_delay: Duration,

    /// Update spacing for throttled, non-time-critical views (default: 250ms)
    #[serde(with = "millis", rename = "ui_throttle_ms")]
    pub ui_throttle: Duration,

    /// Initial volume (0.0-1.0, default: 1.0)
    pub initial_volume: f32,

    /// Storage key for the session snapshot
    pub storage_key: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            persist_interval: Duration::from_secs(5),
            auto_skip_delay: Duration::from_secs(1),
            ui_throttle: Duration::from_millis(250),
            initial_volume: 1.0,
            storage_key: "indara.session".to_string(),
        }
    }
}

impl PlaybackConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(PlaybackError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(PlaybackError::Config(format!(
                "initial_volume must be within 0.0-1.0, got {}",
                self.initial_volume
            )));
        }

        if self.storage_key.trim().is_empty() {
            return Err(PlaybackError::Config("storage_key must not be empty".to_string()));
        }

        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlaybackConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.persist_interval, Duration::from_secs(5));
        assert_eq!(config.initial_volume, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{"poll_interval_ms": 250, "initial_volume": 0.5}"#).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.initial_volume, 0.5);
        assert_eq!(config.auto_skip_delay, Duration::from_secs(1));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let config = PlaybackConfig {
            poll_interval: Duration::ZERO,
            ..PlaybackConfig::default()
        };
        assert!(matches!(config.validate(), Err(PlaybackError::Config(_))));
    }

    #[test]
    fn rejects_out_of_range_volume() {
        let config = PlaybackConfig {
            initial_volume: 1.5,
            ..PlaybackConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

/// Harness configuration
use crate::error::{CliError, Result};
use indara_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub simulator: SimulatorSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSettings {
    /// JSON file the resume point is written to
    #[serde(default = "default_session_file")]
    pub file: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorSettings {
    /// Length given to tracks without a duration hint
    #[serde(default = "default_track_secs")]
    pub track_secs: u64,

    /// Time a simulated source takes to open
    #[serde(default = "default_load_latency_ms")]
    pub load_latency_ms: u64,
}

impl SimulatorSettings {
    pub fn track_length(&self) -> Duration {
        Duration::from_secs(self.track_secs)
    }

    pub fn load_latency(&self) -> Duration {
        Duration::from_millis(self.load_latency_ms)
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// Reads `path` when given, otherwise `config.toml` if present, then
    /// overlays `INDARA_*` variables (`INDARA_PLAYBACK__POLL_INTERVAL_MS`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from("config.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("INDARA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.playback.validate()?;

        if self.simulator.track_secs == 0 {
            return Err(CliError::Config(
                "simulator.track_secs must be greater than zero".to_string(),
            ));
        }

        if self.session.file.as_os_str().is_empty() {
            return Err(CliError::Config("session.file must not be empty".to_string()));
        }

        Ok(())
    }
}

// Default values
fn default_session_file() -> PathBuf {
    PathBuf::from("./data/session.json")
}

fn default_track_secs() -> u64 {
    30
}

fn default_load_latency_ms() -> u64 {
    200
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            file: default_session_file(),
        }
    }
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            track_secs: default_track_secs(),
            load_latency_ms: default_load_latency_ms(),
        }
    }
}

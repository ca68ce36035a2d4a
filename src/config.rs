//! Player configuration.
//!
//! Settings come from an optional JSON file passed with `--config`, and
//! command-line flags override whatever the file sets.

use crate::audio::DEFAULT_INSTRUMENT;
use crate::player::{MAX_POLL_INTERVAL, MIN_POLL_INTERVAL};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default progress poll interval in milliseconds.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 100;

/// Settings for one player session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// SoundFont (.sf2) used to render notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soundfont: Option<PathBuf>,
    /// General MIDI preset name, e.g. "acoustic_grand_piano".
    pub instrument: String,
    /// How often progress is refreshed while playing.
    pub progress_interval_ms: u64,
    /// Start directory of the file browser.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browse_dir: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            soundfont: None,
            instrument: DEFAULT_INSTRUMENT.to_string(),
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            browse_dir: None,
        }
    }
}

impl PlayerConfig {
    /// Parses a configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid JSON
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = Self::from_json(&json)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// The poll interval, clamped to 100-200ms.
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
    }
}

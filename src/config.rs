//! Engine configuration: tempo, loop and mix defaults loaded from
//! `~/.groovebox/engine.yaml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::beat::{self, DEFAULT_BEATS_PER_BAR};
use crate::song::MixLevels;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Engine settings. Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sequencer tempo in BPM, clamped to `[40, 300]` on use.
    pub tempo: u32,
    pub beats_per_bar: u32,
    pub loop_enabled: bool,
    pub loop_bars: u32,
    pub num_tracks: usize,
    /// Song track gains.
    pub mix: MixLevels,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tempo: 120,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            loop_enabled: true,
            loop_bars: 4,
            num_tracks: 8,
            mix: MixLevels::default(),
        }
    }
}

impl EngineConfig {
    /// `~/.groovebox/engine.yaml`, or `None` without a home directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".groovebox").join("engine.yaml"))
    }

    /// Load from the standard path. Returns `None` when the file is missing
    /// or does not parse.
    pub fn load() -> Option<Self> {
        let path = Self::default_path()?;
        match Self::load_from(&path) {
            Ok(config) => Some(config),
            Err(ConfigError::Io(_)) => None,
            Err(err) => {
                log::warn!(target: "config", "ignoring {}: {err}", path.display());
                None
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Write as YAML, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn clamped_tempo(&self) -> u32 {
        beat::clamp_tempo(self.tempo)
    }
}

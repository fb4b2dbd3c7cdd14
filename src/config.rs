// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON at `$XDG_CONFIG_HOME/depth-sample/config.json`. A missing
//! file means defaults; a file that does not parse is an error. Every field is
//! optional in the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::backends::camera::{CameraBackendType, SessionConfig, SyntheticConfig};
use crate::constants::{APP_NAME, CONFIG_FILE_NAME, DEFAULT_UI_CHANNEL_CAPACITY};
use crate::depth::{DepthColormap, SampleStrategy};
use crate::errors::{AppError, AppResult};
use crate::pipeline::PipelineConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to capture from
    pub backend: CameraBackendType,
    pub session: SessionConfig,
    /// Which depth-map cell becomes the reading
    pub sample_strategy: SampleStrategy,
    /// Colormap for the depth view and depth snapshots
    pub colormap: DepthColormap,
    pub synthetic: SyntheticConfig,
    /// Where snapshots go (default: Pictures/DepthSample)
    pub snapshot_dir: Option<PathBuf>,
    pub ui_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            session: SessionConfig::default(),
            sample_strategy: SampleStrategy::default(),
            colormap: DepthColormap::default(),
            synthetic: SyntheticConfig::default(),
            snapshot_dir: None,
            ui_channel_capacity: DEFAULT_UI_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/depth-sample/config.json`, if a config dir exists
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from `path` if given, otherwise from the default location
    pub fn load_or_default(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(path) => Self::load(&path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            strategy: self.sample_strategy,
            colormap: self.colormap,
            ui_channel_capacity: self.ui_channel_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{Orientation, SessionPreset};

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "sample_strategy": "legacy-fixed-index" }"#).unwrap();
        assert_eq!(config.sample_strategy, SampleStrategy::LegacyFixedIndex);
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.session.orientation, Orientation::Portrait);
        assert!(config.synthetic.depth_camera);
    }

    #[test]
    fn test_nested_session_settings() {
        let config: Config = serde_json::from_str(
            r#"{ "session": { "preset": "low", "camera_index": 1 }, "colormap": "turbo" }"#,
        )
        .unwrap();
        assert_eq!(config.session.preset, SessionPreset::Low);
        assert_eq!(config.session.camera_index, Some(1));
        assert!(config.session.depth_filtering);
        assert_eq!(config.colormap, DepthColormap::Turbo);
    }

    #[test]
    fn test_pipeline_config_follows_settings() {
        let config = Config {
            sample_strategy: SampleStrategy::LegacyFixedIndex,
            ui_channel_capacity: 4,
            ..Default::default()
        };
        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.strategy, SampleStrategy::LegacyFixedIndex);
        assert_eq!(pipeline.ui_channel_capacity, 4);
    }
}

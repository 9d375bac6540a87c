//! Demo configuration.
//!
//! Loaded from an optional `marker-stage.json` next to the executable or in
//! the working directory, falling back to defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for the marker demo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Camera index to capture from.
    pub camera_index: u32,
    /// Camera calibration intrinsics (JSON).
    pub calibration_path: PathBuf,
    /// Marker pattern pose model (ONNX).
    pub pattern_path: PathBuf,
    /// Minimum detection confidence for the marker to count as visible.
    pub confidence_threshold: f32,
    /// Window title.
    pub window_title: String,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            calibration_path: PathBuf::from("data/camera_intrinsics.json"),
            pattern_path: PathBuf::from("data/marker_pose.onnx"),
            confidence_threshold: 0.5,
            window_title: "Marker Stage".to_string(),
        }
    }
}

impl StageConfig {
    pub const FILE_NAME: &'static str = "marker-stage.json";

    /// Load configuration, trying the working directory then the
    /// executable's directory. Missing or malformed files fall back to
    /// defaults.
    pub fn load() -> Self {
        let mut candidates = vec![PathBuf::from(Self::FILE_NAME)];
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join(Self::FILE_NAME));
            }
        }

        for path in candidates {
            if let Some(config) = Self::load_from(&path) {
                log::info!("Loaded config from {:?}", path);
                return config;
            }
        }

        log::info!("No config file found, using defaults");
        Self::default()
    }

    fn load_from(path: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&text) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Ignoring malformed config {:?}: {}", path, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trip() {
        let config = StageConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        let back: StageConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.camera_index, 0);
        assert_eq!(back.confidence_threshold, 0.5);
        assert_eq!(back.pattern_path, PathBuf::from("data/marker_pose.onnx"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: StageConfig = serde_json::from_str(r#"{"camera_index": 2}"#).unwrap();
        assert_eq!(config.camera_index, 2);
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(
            config.calibration_path,
            PathBuf::from("data/camera_intrinsics.json")
        );
    }
}

use crate::models::pose::{YogaPose, LANDMARK_COUNT};
use crate::models::session::Rgb;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where a model file comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum ModelSource {
    /// Local file path
    LocalFile(PathBuf),
    /// Direct URL
    Url(String),
}

/// Practice configuration
///
/// Every threshold the evaluation pipeline uses lives here so it can be tuned
/// against the classifier it is paired with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PracticeConfig {
    /// Keypoints scoring at or below this are ignored (0.0-1.0)
    pub keypoint_confidence_threshold: f32,
    /// A frame is rejected when more keypoints than this are low-confidence
    pub max_low_confidence_keypoints: usize,
    /// Target pose probability required to count as holding (0.0-1.0)
    pub pose_confidence_threshold: f32,
    /// Torso length multiplier used for the pose size lower bound
    pub torso_size_multiplier: f32,
    /// Sampling interval of the evaluation loop in milliseconds
    pub tick_interval_ms: u64,
    /// Pose selected when practice starts
    pub default_target: YogaPose,
    /// Skeleton color while the target pose is held
    pub holding_color: Rgb,
    /// Skeleton color otherwise
    pub neutral_color: Rgb,
    /// Keypoint marker color
    pub point_color: Rgb,
    /// Keypoint marker radius in pixels
    pub point_radius: f32,
    /// Skeleton line width in pixels
    pub line_width: f32,
    /// Keypoint detector model
    pub detector_model: ModelSource,
    /// Pose classifier model
    pub classifier_model: ModelSource,
    /// Where downloaded models are cached
    pub model_cache_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl Default for PracticeConfig {
    fn default() -> Self {
        let mut model_cache_dir = home_dir().unwrap_or_else(|_| PathBuf::from("."));
        model_cache_dir.push(".asana");
        model_cache_dir.push("models");

        Self {
            keypoint_confidence_threshold: 0.4,
            max_low_confidence_keypoints: 4,
            pose_confidence_threshold: 0.97,
            torso_size_multiplier: 2.5,
            tick_interval_ms: 100,
            default_target: YogaPose::Tree,
            holding_color: Rgb::GREEN,
            neutral_color: Rgb::WHITE,
            point_color: Rgb::WHITE,
            point_radius: 8.0,
            line_width: 2.0,
            detector_model: ModelSource::LocalFile(PathBuf::from("models/movenet_thunder.onnx")),
            classifier_model: ModelSource::LocalFile(PathBuf::from("models/pose_classifier.onnx")),
            model_cache_dir,
        }
    }
}

impl PracticeConfig {
    /// Load configuration from the default location, creating it with defaults if missing
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load and validate configuration from a specific file
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: PracticeConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.keypoint_confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "Invalid keypoint confidence threshold: {}. Must be between 0.0 and 1.0",
                self.keypoint_confidence_threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.pose_confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "Invalid pose confidence threshold: {}. Must be between 0.0 and 1.0",
                self.pose_confidence_threshold
            )));
        }

        if self.max_low_confidence_keypoints > LANDMARK_COUNT {
            return Err(ConfigError::Invalid(format!(
                "Invalid low-confidence tolerance: {}. Must be at most {}",
                self.max_low_confidence_keypoints, LANDMARK_COUNT
            )));
        }

        if !self.torso_size_multiplier.is_finite() || self.torso_size_multiplier <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "Invalid torso size multiplier: {}. Must be positive",
                self.torso_size_multiplier
            )));
        }

        if !(10..=5000).contains(&self.tick_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "Invalid tick interval: {}ms. Must be between 10 and 5000",
                self.tick_interval_ms
            )));
        }

        if !self.default_target.is_selectable() {
            return Err(ConfigError::Invalid(format!(
                "Invalid default target: {}",
                self.default_target
            )));
        }

        if self.point_radius <= 0.0 || self.line_width <= 0.0 {
            return Err(ConfigError::Invalid(
                "Point radius and line width must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> ConfigResult<Self> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Get the configuration file path
    pub fn get_config_path() -> ConfigResult<PathBuf> {
        let mut path = home_dir()?;
        path.push(".asana");
        path.push("config");
        path.push("settings.json");
        Ok(path)
    }
}

fn home_dir() -> ConfigResult<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .map_err(|_| ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PracticeConfig::default();
        assert_eq!(config.keypoint_confidence_threshold, 0.4);
        assert_eq!(config.max_low_confidence_keypoints, 4);
        assert_eq!(config.pose_confidence_threshold, 0.97);
        assert_eq!(config.torso_size_multiplier, 2.5);
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.default_target, YogaPose::Tree);
        assert_eq!(config.holding_color, Rgb::GREEN);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_models_are_onnx_files() {
        let config = PracticeConfig::default();
        for source in [&config.detector_model, &config.classifier_model] {
            match source {
                ModelSource::LocalFile(path) => {
                    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("onnx"));
                }
                ModelSource::Url(url) => panic!("default model should be local, got {}", url),
            }
        }
    }

    #[test]
    fn test_config_validation() {
        let mut config = PracticeConfig::default();

        config.keypoint_confidence_threshold = 1.5;
        assert!(config.validate().is_err());
        config.keypoint_confidence_threshold = 0.4;

        config.pose_confidence_threshold = -0.1;
        assert!(config.validate().is_err());
        config.pose_confidence_threshold = 0.97;

        config.max_low_confidence_keypoints = 18;
        assert!(config.validate().is_err());
        config.max_low_confidence_keypoints = 4;

        config.torso_size_multiplier = 0.0;
        assert!(config.validate().is_err());
        config.torso_size_multiplier = f32::NAN;
        assert!(config.validate().is_err());
        config.torso_size_multiplier = 2.5;

        config.tick_interval_ms = 0;
        assert!(config.validate().is_err());
        config.tick_interval_ms = 100;

        config.default_target = YogaPose::NoPose;
        assert!(config.validate().is_err());
        config.default_target = YogaPose::Cobra;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");

        let mut config = PracticeConfig::default();
        config.pose_confidence_threshold = 0.9;
        config.classifier_model = ModelSource::LocalFile(PathBuf::from("/tmp/classifier.onnx"));
        config.save_to(&path).unwrap();

        let loaded = PracticeConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut config = PracticeConfig::default();
        config.tick_interval_ms = 1;
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        assert!(matches!(
            PracticeConfig::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PracticeConfig::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}

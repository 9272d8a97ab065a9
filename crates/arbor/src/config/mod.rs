//! Configuration system
//!
//! Engine-level tunables, loadable from TOML or RON files.

pub use serde::{Deserialize, Serialize};

use crate::render::TechniqueOptions;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_str_with_format(&contents, path)
    }

    /// Parse configuration text, picking the format from the file name extension
    fn from_str_with_format(contents: &str, path: &str) -> Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// # Engine Configuration
///
/// Tunables shared by the scene pipeline. Anything not listed here is a
/// fixed constant of the pipeline (light cap, instance cap, cascade count).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Edge length in texels of each shadow cascade texture
    pub shadow_map_size: u32,
    /// Whether the default technique sorts blending buckets back-to-front
    pub sort_transparent_back_to_front: bool,
    /// Window size used by headless setups and as the initial viewport
    pub default_window_size: (f32, f32),
    /// Delta substituted by the run loop when a frame overruns `max_frame_time`
    pub physics_fallback_dt: f64,
    /// Frame time (seconds) above which the run loop skips the real physics delta
    pub max_frame_time: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shadow_map_size: 2048,
            sort_transparent_back_to_front: false,
            default_window_size: (1280.0, 720.0),
            physics_fallback_dt: 1.0 / 60.0,
            max_frame_time: 0.25,
        }
    }
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Set the shadow cascade resolution
    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size;
        self
    }

    /// Enable or disable back-to-front sorting of the blending pass
    pub fn with_transparent_sorting(mut self, enabled: bool) -> Self {
        self.sort_transparent_back_to_front = enabled;
        self
    }

    /// Pass options handed to cameras created through the engine context
    pub fn technique_options(&self) -> TechniqueOptions {
        TechniqueOptions {
            sort_transparent_back_to_front: self.sort_transparent_back_to_front,
        }
    }

    /// Physics delta for a frame that took `frame_time` seconds
    ///
    /// Frames slower than `max_frame_time` get the fallback delta instead of
    /// their measured one, so a stall does not explode the simulation.
    pub fn physics_dt(&self, frame_time: f64) -> f64 {
        if frame_time > self.max_frame_time {
            self.physics_fallback_dt
        } else {
            frame_time
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.shadow_map_size, 2048);
        assert!(!config.sort_transparent_back_to_front);
    }

    #[test]
    fn test_toml_partial_override() {
        let config = EngineConfig::from_str_with_format("shadow_map_size = 1024\n", "engine.toml").unwrap();
        assert_eq!(config.shadow_map_size, 1024);
        assert_eq!(config.default_window_size, (1280.0, 720.0));
    }

    #[test]
    fn test_ron_round_trip() {
        let config = EngineConfig::default().with_transparent_sorting(true);
        let text = ron::to_string(&config).unwrap();
        let parsed = EngineConfig::from_str_with_format(&text, "engine.ron").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unsupported_format() {
        let result = EngineConfig::from_str_with_format("", "engine.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_physics_dt_falls_back_on_long_frames() {
        let config = EngineConfig::default();
        assert_eq!(config.physics_dt(0.01), 0.01);
        assert_eq!(config.physics_dt(1.0), config.physics_fallback_dt);
    }
}

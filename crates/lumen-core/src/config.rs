//! Engine configuration loaded from TOML

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for [`crate::TimelineData`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of undo snapshots kept, including the base state
    pub undo_capacity: usize,
    /// Keyframes closer than this many seconds are treated as one
    /// (equal spacing batches, dedup)
    pub merge_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_capacity: 100,
            merge_threshold: 0.001,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml(&source)
    }

    /// Load from the user config directory, falling back to defaults
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.undo_capacity == 0 {
            return Err(ConfigError::Invalid("undo_capacity must be at least 1".into()));
        }
        if self.merge_threshold.is_nan() || self.merge_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "merge_threshold must be non-negative, got {}",
                self.merge_threshold
            )));
        }
        Ok(())
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lumen")
        .join("engine.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml("undo_capacity = 20").unwrap();
        assert_eq!(config.undo_capacity, 20);
        assert_eq!(config.merge_threshold, 0.001);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = EngineConfig::from_toml("undo_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_toml() {
        let err = EngineConfig::from_toml("undo_capacity = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineConfig::load_from(Path::new("/nonexistent/lumen/engine.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

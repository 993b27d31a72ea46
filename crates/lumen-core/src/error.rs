//! Error types for lumen

use thiserror::Error;

/// Malformed project data. The whole import is rejected.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No tracks data present")]
    MissingTracks,
    #[error("tracks[{track}] missing keyframes")]
    MissingKeyframes { track: usize },
    #[error("tracks[{track}].keyframes[{keyframe}] missing {field} field, checked: {}", .checked.join(", "))]
    MissingField {
        track: usize,
        keyframe: usize,
        field: &'static str,
        checked: &'static [&'static str],
    },
    #[error("tracks[{track}].keyframes[{keyframe}] {field} is not {expected}")]
    WrongType {
        track: usize,
        keyframe: usize,
        field: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum LumenError {
    #[error("Import error: {0}")]
    Import(#[from] ImportError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, LumenError>;

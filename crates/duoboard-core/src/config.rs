//! Whiteboard settings.

use crate::canvas::DEFAULT_CANVAS_COLOR;
use crate::history::DEFAULT_MAX_UNDO_DEPTH;
use crate::stroke::{
    DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH, MAX_STROKE_WIDTH, MIN_STROKE_WIDTH,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Root under which whiteboard documents are stored.
pub const DEFAULT_DOCUMENT_ROOT: &str = "whiteboards";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tunables for a whiteboard client. Every field has a default, so a
/// config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhiteboardConfig {
    /// Background of a fresh board.
    pub default_canvas_color: String,
    /// Brush color before the user picks one.
    pub default_stroke_color: String,
    /// Brush width before the user picks one.
    pub default_stroke_width: f64,
    /// Undo steps kept per session.
    pub max_undo_depth: usize,
    /// Store path under which room documents live.
    pub document_root: String,
}

impl Default for WhiteboardConfig {
    fn default() -> Self {
        Self {
            default_canvas_color: DEFAULT_CANVAS_COLOR.to_string(),
            default_stroke_color: DEFAULT_STROKE_COLOR.to_string(),
            default_stroke_width: DEFAULT_STROKE_WIDTH,
            max_undo_depth: DEFAULT_MAX_UNDO_DEPTH,
            document_root: DEFAULT_DOCUMENT_ROOT.to_string(),
        }
    }
}

impl WhiteboardConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::debug!("Loaded whiteboard config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_undo_depth == 0 {
            return Err(ConfigError::Invalid("max_undo_depth must be at least 1".into()));
        }
        if !(MIN_STROKE_WIDTH..=MAX_STROKE_WIDTH).contains(&self.default_stroke_width) {
            return Err(ConfigError::Invalid(format!(
                "default_stroke_width must be between {} and {}",
                MIN_STROKE_WIDTH, MAX_STROKE_WIDTH
            )));
        }
        if self.default_canvas_color.trim().is_empty()
            || self.default_stroke_color.trim().is_empty()
        {
            return Err(ConfigError::Invalid("colors must not be empty".into()));
        }
        if self.document_root.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid("document_root must not be empty".into()));
        }
        Ok(())
    }
}

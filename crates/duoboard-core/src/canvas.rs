//! Canvas state and the persisted whiteboard document.
//!
//! The stored document looks like:
//! ```text
//! {
//!   "name": "Our board",
//!   "canvasColor": "white",
//!   "paths": [ { "path": ["M1,2 ", "L3,4 "], "color": "red", "width": 3 } ]
//! }
//! ```
//! Parsing is lenient: whatever the store hands back, the result is a
//! usable canvas, at worst an empty one.

use crate::stroke::{Stroke, list_items, sanitize_color};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Background color of a board that never had one set.
pub const DEFAULT_CANVAS_COLOR: &str = "white";

pub(crate) const NAME_KEY: &str = "name";
pub(crate) const CANVAS_COLOR_KEY: &str = "canvasColor";
pub(crate) const PATHS_KEY: &str = "paths";

/// Background color plus committed strokes; the unit that gets synchronized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanvasState {
    #[serde(rename = "canvasColor")]
    canvas_color: String,
    #[serde(rename = "paths")]
    strokes: Vec<Stroke>,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasState {
    /// An empty white canvas.
    pub fn new() -> Self {
        Self::with_color(DEFAULT_CANVAS_COLOR)
    }

    pub fn with_color(color: impl Into<String>) -> Self {
        Self {
            canvas_color: sanitize_color(color.into(), DEFAULT_CANVAS_COLOR),
            strokes: Vec::new(),
        }
    }

    pub fn canvas_color(&self) -> &str {
        &self.canvas_color
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Replace the background color. Strokes are untouched.
    pub fn set_background_color(&mut self, color: impl Into<String>) {
        self.canvas_color = sanitize_color(color.into(), DEFAULT_CANVAS_COLOR);
    }

    /// Replace the whole stroke list.
    pub fn set_strokes(&mut self, strokes: Vec<Stroke>) {
        self.strokes = strokes;
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Read a canvas out of a stored JSON value.
    pub fn from_value(value: &Value) -> Self {
        let color = value
            .get(CANVAS_COLOR_KEY)
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CANVAS_COLOR);

        let strokes = list_items(value.get(PATHS_KEY).cloned())
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match serde_json::from_value::<Stroke>(item) {
                Ok(stroke) => Some(stroke),
                Err(e) => {
                    log::warn!("Skipping malformed stroke {}: {}", i, e);
                    None
                }
            })
            .collect();

        Self {
            canvas_color: sanitize_color(color.to_string(), DEFAULT_CANVAS_COLOR),
            strokes,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON. Only invalid JSON is an error; odd content is tolerated.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl<'de> Deserialize<'de> for CanvasState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// A whole stored whiteboard: its name and its canvas.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WhiteboardDocument {
    pub name: String,
    #[serde(flatten)]
    pub canvas: CanvasState,
}

impl WhiteboardDocument {
    pub fn new(name: impl Into<String>, canvas: CanvasState) -> Self {
        Self {
            name: name.into(),
            canvas,
        }
    }

    /// Read a document out of a stored JSON value. `null` gives an empty board.
    pub fn from_value(value: &Value) -> Self {
        let name = value
            .get(NAME_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            name,
            canvas: CanvasState::from_value(value),
        }
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl<'de> Deserialize<'de> for WhiteboardDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

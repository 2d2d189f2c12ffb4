//! Freehand strokes and their SVG-style path segment encoding.
//!
//! A stroke is stored as a list of segment strings such as `"M12,40 "` and
//! `"L13,42 "`. Joining the strings yields a renderable path `d` attribute,
//! so the exact format is part of the persisted document shape.

use kurbo::{BezPath, Point, Rect};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Color applied to new strokes until the user picks another.
pub const DEFAULT_STROKE_COLOR: &str = "red";

/// Color used for stored strokes that carry none.
pub const FALLBACK_STROKE_COLOR: &str = "black";

/// Brush width applied to new strokes until the user picks another.
pub const DEFAULT_STROKE_WIDTH: f64 = 3.0;

pub const MIN_STROKE_WIDTH: f64 = 1.0;
pub const MAX_STROKE_WIDTH: f64 = 10.0;

/// Longest color string kept; anything longer is truncated.
const MAX_COLOR_LEN: usize = 32;

/// Segment command letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathCommand {
    /// First point of a stroke (`M`).
    MoveTo,
    /// Every following point (`L`).
    LineTo,
}

impl PathCommand {
    pub fn letter(self) -> char {
        match self {
            PathCommand::MoveTo => 'M',
            PathCommand::LineTo => 'L',
        }
    }

    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'M' => Some(PathCommand::MoveTo),
            'L' => Some(PathCommand::LineTo),
            _ => None,
        }
    }
}

/// Errors from parsing a segment string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentParseError {
    #[error("empty path segment")]
    Empty,
    #[error("unknown path command '{0}'")]
    UnknownCommand(char),
    #[error("malformed coordinates in path segment '{0}'")]
    Coordinates(String),
}

/// One move-to or line-to command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSegment {
    pub command: PathCommand,
    pub x: f64,
    pub y: f64,
}

impl PathSegment {
    pub fn move_to(x: f64, y: f64) -> Self {
        Self { command: PathCommand::MoveTo, x, y }
    }

    pub fn line_to(x: f64, y: f64) -> Self {
        Self { command: PathCommand::LineTo, x, y }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Adding 0.0 folds -0 into 0 so rounded points never print "-0".
        write!(f, "{}{},{} ", self.command.letter(), self.x + 0.0, self.y + 0.0)
    }
}

impl FromStr for PathSegment {
    type Err = SegmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or(SegmentParseError::Empty)?;
        let command =
            PathCommand::from_letter(letter).ok_or(SegmentParseError::UnknownCommand(letter))?;

        let malformed = || SegmentParseError::Coordinates(trimmed.to_string());
        let mut coords = chars
            .as_str()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<f64>().ok().filter(|v| v.is_finite()));

        let x = coords.next().flatten().ok_or_else(malformed)?;
        let y = coords.next().flatten().ok_or_else(malformed)?;
        if coords.next().is_some() {
            return Err(malformed());
        }

        Ok(Self { command, x, y })
    }
}

impl Serialize for PathSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PathSegment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// A committed pen gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    #[serde(rename = "path", default, deserialize_with = "lenient_segments")]
    segments: Vec<PathSegment>,
    #[serde(default = "fallback_color", deserialize_with = "lenient_color")]
    color: String,
    #[serde(default = "default_width", deserialize_with = "lenient_width")]
    width: f64,
}

impl Stroke {
    /// Create a stroke. Color and width are sanitized.
    pub fn new(segments: Vec<PathSegment>, color: impl Into<String>, width: f64) -> Self {
        Self {
            segments,
            color: sanitize_color(color.into(), FALLBACK_STROKE_COLOR),
            width: sanitize_width(width),
        }
    }

    /// Build a stroke through the given points: the first becomes `M`, the rest `L`.
    pub fn from_points(
        points: impl IntoIterator<Item = Point>,
        color: impl Into<String>,
        width: f64,
    ) -> Self {
        let segments = points
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                if i == 0 {
                    PathSegment::move_to(p.x, p.y)
                } else {
                    PathSegment::line_to(p.x, p.y)
                }
            })
            .collect();
        Self::new(segments, color, width)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment strings as stored in the `path` field.
    pub fn path_strings(&self) -> Vec<String> {
        self.segments.iter().map(ToString::to_string).collect()
    }

    /// Concatenated path data, usable as an SVG `d` attribute.
    pub fn path_data(&self) -> String {
        self.segments.iter().map(ToString::to_string).collect()
    }

    /// Convert to a kurbo path for rendering.
    pub fn to_bez_path(&self) -> BezPath {
        let mut path = BezPath::new();
        for segment in &self.segments {
            match segment.command {
                PathCommand::LineTo if !path.elements().is_empty() => {
                    path.line_to(segment.point())
                }
                _ => path.move_to(segment.point()),
            }
        }
        path
    }

    /// Bounding box of all points, `Rect::ZERO` when empty.
    pub fn bounds(&self) -> Rect {
        let mut points = self.segments.iter().map(PathSegment::point);
        let Some(first) = points.next() else {
            return Rect::ZERO;
        };
        points.fold(Rect::from_points(first, first), |rect, p| rect.union_pt(p))
    }
}

/// Replace empty colors and cap overly long ones.
pub fn sanitize_color(color: String, fallback: &str) -> String {
    let trimmed = color.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    trimmed.chars().take(MAX_COLOR_LEN).collect()
}

/// Clamp a brush width into the supported range.
pub fn sanitize_width(width: f64) -> f64 {
    if width.is_finite() {
        width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH)
    } else {
        DEFAULT_STROKE_WIDTH
    }
}

/// Read a stored list, accepting the store's object-with-index-keys form.
pub(crate) fn list_items(value: Option<Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(Value::Object(map)) => {
            let mut keyed: Vec<(u64, Value)> = map
                .into_iter()
                .filter_map(|(key, item)| match key.parse::<u64>() {
                    Ok(index) => Some((index, item)),
                    Err(_) => {
                        log::warn!("Ignoring non-index key '{}' in stored list", key);
                        None
                    }
                })
                .collect();
            keyed.sort_by_key(|(index, _)| *index);
            keyed.into_iter().map(|(_, item)| item).collect()
        }
        Some(other) => {
            log::warn!("Expected a list, found {}", other);
            Vec::new()
        }
    }
}

fn lenient_segments<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<PathSegment>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(list_items(value)
        .into_iter()
        .filter_map(|item| match item {
            Value::String(raw) => match raw.parse::<PathSegment>() {
                Ok(segment) => Some(segment),
                Err(e) => {
                    log::warn!("Dropping path segment: {}", e);
                    None
                }
            },
            other => {
                log::warn!("Dropping non-string path segment: {}", other);
                None
            }
        })
        .collect())
}

fn lenient_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let color = Option::<String>::deserialize(deserializer)?;
    Ok(sanitize_color(color.unwrap_or_default(), FALLBACK_STROKE_COLOR))
}

fn lenient_width<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let width = Option::<f64>::deserialize(deserializer)?;
    Ok(width.map(sanitize_width).unwrap_or(DEFAULT_STROKE_WIDTH))
}

fn fallback_color() -> String {
    FALLBACK_STROKE_COLOR.to_string()
}

fn default_width() -> f64 {
    DEFAULT_STROKE_WIDTH
}

//! Pointer gesture recording.

use crate::stroke::{PathSegment, Stroke};
use kurbo::Point;

/// Largest coordinate magnitude kept; larger values are clamped.
pub const MAX_COORDINATE: f64 = 1_000_000.0;

/// Accumulates the segments of the stroke currently being drawn.
#[derive(Debug, Clone, Default)]
pub struct PathRecorder {
    segments: Vec<PathSegment>,
}

impl PathRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new gesture, discarding anything recorded so far.
    pub fn begin(&mut self) {
        self.segments.clear();
    }

    /// Record a pointer position. The first point of a gesture becomes a
    /// move-to, later ones line-to. Coordinates are rounded to whole pixels.
    pub fn move_to(&mut self, x: f64, y: f64) {
        let (x, y) = (clamp_coordinate(x), clamp_coordinate(y));
        let segment = if self.segments.is_empty() {
            PathSegment::move_to(x, y)
        } else {
            PathSegment::line_to(x, y)
        };
        self.segments.push(segment);
    }

    /// Record a pointer position given as a point.
    pub fn move_to_point(&mut self, point: Point) {
        self.move_to(point.x, point.y);
    }

    /// Finish the gesture. Returns `None` for a tap that never moved.
    pub fn end(&mut self, color: &str, width: f64) -> Option<Stroke> {
        if self.segments.is_empty() {
            return None;
        }
        let segments = std::mem::take(&mut self.segments);
        Some(Stroke::new(segments, color, width))
    }

    /// The in-progress stroke, for drawing under the pointer.
    pub fn preview(&self, color: &str, width: f64) -> Option<Stroke> {
        if self.segments.is_empty() {
            None
        } else {
            Some(Stroke::new(self.segments.clone(), color, width))
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

fn clamp_coordinate(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.round().clamp(-MAX_COORDINATE, MAX_COORDINATE)
}

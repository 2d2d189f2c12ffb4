//! Whiteboard interaction state machine.
//!
//! The controller is the only writer of the local [`CanvasState`]. Local
//! gestures and button presses change it and mark it for pushing; remote
//! updates replace it wholesale. It never talks to the store itself: the
//! owner drains [`WhiteboardController::take_push`] and
//! [`WhiteboardController::take_events`] after each interaction.

use crate::canvas::{CanvasState, WhiteboardDocument};
use crate::config::WhiteboardConfig;
use crate::history::StrokeHistory;
use crate::recorder::PathRecorder;
use crate::stroke::{Stroke, sanitize_color, sanitize_width};
use crate::sync::{SyncError, SyncOperation};

/// Whether a pen gesture is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    /// No pointer down.
    #[default]
    Idle,
    /// Pointer down, segments accumulating.
    Drawing,
}

/// Something the UI may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum WhiteboardEvent {
    /// A stroke was added at this index of the canvas stroke list.
    StrokeCommitted { index: usize },
    Cleared,
    Undone,
    Redone,
    BackgroundChanged { color: String },
    /// The canvas was replaced by the remote copy.
    RemoteApplied,
    /// A remote update arrived mid-gesture and will be applied when it ends.
    RemoteDeferred,
    /// A store call failed. Local state is kept as is.
    SyncFailed { operation: SyncOperation, message: String },
}

/// Orchestrates recording, history and remote reconciliation for one board.
#[derive(Debug, Clone)]
pub struct WhiteboardController {
    state: GestureState,
    recorder: PathRecorder,
    history: StrokeHistory,
    canvas: CanvasState,
    name: String,
    active_color: String,
    active_width: f64,
    default_color: String,
    /// Remote update received while drawing.
    pending_remote: Option<WhiteboardDocument>,
    /// Local changes not yet handed out for pushing.
    needs_push: bool,
    events: Vec<WhiteboardEvent>,
}

impl Default for WhiteboardController {
    fn default() -> Self {
        Self::new(&WhiteboardConfig::default())
    }
}

impl WhiteboardController {
    pub fn new(config: &WhiteboardConfig) -> Self {
        Self {
            state: GestureState::Idle,
            recorder: PathRecorder::new(),
            history: StrokeHistory::new(config.max_undo_depth),
            canvas: CanvasState::with_color(config.default_canvas_color.clone()),
            name: String::new(),
            active_color: config.default_stroke_color.clone(),
            active_width: sanitize_width(config.default_stroke_width),
            default_color: config.default_stroke_color.clone(),
            pending_remote: None,
            needs_push: false,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_drawing(&self) -> bool {
        self.state == GestureState::Drawing
    }

    pub fn canvas(&self) -> &CanvasState {
        &self.canvas
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn active_color(&self) -> &str {
        &self.active_color
    }

    pub fn active_width(&self) -> f64 {
        self.active_width
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn has_pending_remote(&self) -> bool {
        self.pending_remote.is_some()
    }

    /// The stroke under the pointer, drawn on top of the committed ones.
    pub fn current_stroke(&self) -> Option<Stroke> {
        if self.is_drawing() {
            self.recorder.preview(&self.active_color, self.active_width)
        } else {
            None
        }
    }

    // --- Gestures ---

    pub fn on_touch_start(&mut self) {
        if self.is_drawing() {
            log::debug!("Touch start during a gesture, restarting stroke");
        }
        self.recorder.begin();
        self.state = GestureState::Drawing;
    }

    pub fn on_touch_move(&mut self, x: f64, y: f64) {
        if !self.is_drawing() {
            log::trace!("Ignoring pointer move at ({}, {}) with no gesture", x, y);
            return;
        }
        self.recorder.move_to(x, y);
    }

    /// Finish the gesture. Returns true if a stroke was committed.
    ///
    /// A remote update buffered during the gesture is applied first, so the
    /// new stroke lands on top of the remote strokes instead of being lost.
    pub fn on_touch_end(&mut self) -> bool {
        if !self.is_drawing() {
            return false;
        }
        self.state = GestureState::Idle;
        self.apply_pending_remote();

        let Some(stroke) = self.recorder.end(&self.active_color, self.active_width) else {
            log::trace!("Discarding gesture with no movement");
            return false;
        };

        let strokes = self.history.add(stroke).to_vec();
        let index = strokes.len() - 1;
        self.canvas.set_strokes(strokes);
        self.needs_push = true;
        log::debug!("Committed stroke {}", index);
        self.events.push(WhiteboardEvent::StrokeCommitted { index });
        true
    }

    /// Abandon the gesture without committing anything.
    pub fn on_touch_cancel(&mut self) {
        if !self.is_drawing() {
            return;
        }
        self.recorder.begin();
        self.state = GestureState::Idle;
        self.apply_pending_remote();
    }

    // --- Toolbar ---

    pub fn on_clear_pressed(&mut self) {
        self.history.clear();
        self.canvas.set_strokes(Vec::new());
        self.needs_push = true;
        self.events.push(WhiteboardEvent::Cleared);
    }

    /// Returns false when there was nothing to undo.
    pub fn on_undo_pressed(&mut self) -> bool {
        let Some(strokes) = self.history.undo() else {
            return false;
        };
        self.canvas.set_strokes(strokes.to_vec());
        self.needs_push = true;
        self.events.push(WhiteboardEvent::Undone);
        true
    }

    /// Returns false when there was nothing to redo.
    pub fn on_redo_pressed(&mut self) -> bool {
        let Some(strokes) = self.history.redo() else {
            return false;
        };
        self.canvas.set_strokes(strokes.to_vec());
        self.needs_push = true;
        self.events.push(WhiteboardEvent::Redone);
        true
    }

    /// Pick the color for subsequent strokes. Committed strokes keep theirs.
    pub fn on_color_picked(&mut self, color: &str) {
        self.active_color = sanitize_color(color.to_string(), &self.default_color);
    }

    /// Pick the brush width for subsequent strokes.
    pub fn on_width_picked(&mut self, width: f64) {
        self.active_width = sanitize_width(width);
    }

    /// Fill the background with the active color.
    pub fn on_background_fill_pressed(&mut self) {
        self.canvas.set_background_color(self.active_color.clone());
        self.needs_push = true;
        self.events.push(WhiteboardEvent::BackgroundChanged {
            color: self.canvas.canvas_color().to_string(),
        });
    }

    // --- Remote ---

    /// Take in the store's current document.
    ///
    /// While idle it replaces the local canvas at once. During a gesture it
    /// is held until the gesture ends; a newer update replaces a held one.
    pub fn on_remote_update(&mut self, document: WhiteboardDocument) {
        if self.is_drawing() {
            if self.pending_remote.replace(document).is_some() {
                log::debug!("Newer remote update supersedes the deferred one");
            }
            self.events.push(WhiteboardEvent::RemoteDeferred);
            return;
        }
        self.apply_remote(document);
    }

    fn apply_pending_remote(&mut self) {
        if let Some(document) = self.pending_remote.take() {
            self.apply_remote(document);
        }
    }

    fn apply_remote(&mut self, document: WhiteboardDocument) {
        let WhiteboardDocument { name, canvas } = document;
        if name == self.name && canvas == self.canvas {
            // Usually the echo of our own push.
            log::trace!("Remote update matches local state");
            return;
        }
        log::debug!(
            "Applying remote canvas with {} strokes on {}",
            canvas.strokes().len(),
            canvas.canvas_color()
        );
        self.name = name;
        self.history.rebase(canvas.strokes().to_vec());
        self.canvas = canvas;
        self.needs_push = false;
        self.events.push(WhiteboardEvent::RemoteApplied);
    }

    // --- Outgoing ---

    pub fn needs_push(&self) -> bool {
        self.needs_push
    }

    /// Hand out the canvas to push, if it changed locally since the last call.
    pub fn take_push(&mut self) -> Option<CanvasState> {
        if !self.needs_push {
            return None;
        }
        self.needs_push = false;
        Some(self.canvas.clone())
    }

    /// Record a failed store call for the UI. Nothing is retried.
    pub fn report_sync_failure(&mut self, operation: SyncOperation, error: &SyncError) {
        log::warn!("Whiteboard {} failed: {}", operation, error);
        self.events.push(WhiteboardEvent::SyncFailed {
            operation,
            message: error.to_string(),
        });
    }

    /// Take pending events (drains the queue).
    pub fn take_events(&mut self) -> Vec<WhiteboardEvent> {
        std::mem::take(&mut self.events)
    }
}

//! Committed strokes with linear undo/redo.
//!
//! History is local to one client and one session. It records changes
//! rather than whole-list snapshots, so undo takes back exactly one local
//! change even after the list was replaced by a partner's copy.

use crate::stroke::Stroke;

/// Default maximum number of undo steps to keep.
pub const DEFAULT_MAX_UNDO_DEPTH: usize = 50;

/// One undoable change to the stroke list.
#[derive(Debug, Clone, PartialEq)]
enum Change {
    /// A stroke appended at the end.
    Added(Stroke),
    /// Everything removed; holds the strokes that were there.
    Cleared(Vec<Stroke>),
}

/// The committed stroke list plus its undo and redo stacks.
#[derive(Debug, Clone)]
pub struct StrokeHistory {
    strokes: Vec<Stroke>,
    undo_stack: Vec<Change>,
    redo_stack: Vec<Change>,
    max_depth: usize,
}

impl Default for StrokeHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO_DEPTH)
    }
}

impl StrokeHistory {
    /// Create an empty history keeping at most `max_depth` undo steps.
    pub fn new(max_depth: usize) -> Self {
        Self {
            strokes: Vec::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    fn push_undo(&mut self, change: Change) {
        self.undo_stack.push(change);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
    }

    /// Append a committed stroke.
    pub fn add(&mut self, stroke: Stroke) -> &[Stroke] {
        self.redo_stack.clear();
        let change = self.apply(Change::Added(stroke));
        self.push_undo(change);
        &self.strokes
    }

    /// Remove every stroke. Undoable like any other change.
    pub fn clear(&mut self) -> &[Stroke] {
        self.redo_stack.clear();
        let change = self.apply(Change::Cleared(Vec::new()));
        self.push_undo(change);
        &self.strokes
    }

    /// Take back the last local change.
    /// Returns `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<&[Stroke]> {
        let change = self.undo_stack.pop()?;
        let change = self.revert(change);
        self.redo_stack.push(change);
        Some(&self.strokes)
    }

    /// Re-apply the last undone change.
    /// Returns `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<&[Stroke]> {
        let change = self.redo_stack.pop()?;
        let change = self.apply(change);
        self.push_undo(change);
        Some(&self.strokes)
    }

    /// Replace the committed list with state received from elsewhere.
    ///
    /// Undo steps survive and act on the new list: undoing an added stroke
    /// removes that stroke only. Redo steps are dropped.
    pub fn rebase(&mut self, strokes: Vec<Stroke>) {
        self.strokes = strokes;
        self.redo_stack.clear();
    }

    /// Perform a change on the current list, returning its undo record.
    fn apply(&mut self, change: Change) -> Change {
        match change {
            Change::Added(stroke) => {
                self.strokes.push(stroke.clone());
                Change::Added(stroke)
            }
            Change::Cleared(_) => Change::Cleared(std::mem::take(&mut self.strokes)),
        }
    }

    /// Take back a change on the current list, returning its redo record.
    fn revert(&mut self, change: Change) -> Change {
        match change {
            Change::Added(stroke) => {
                match self.strokes.iter().rposition(|s| *s == stroke) {
                    Some(index) => {
                        self.strokes.remove(index);
                    }
                    None => log::debug!("Undone stroke is no longer on the canvas"),
                }
                Change::Added(stroke)
            }
            Change::Cleared(removed) => {
                let newer = std::mem::replace(&mut self.strokes, removed);
                self.strokes.extend(newer);
                Change::Cleared(Vec::new())
            }
        }
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
}

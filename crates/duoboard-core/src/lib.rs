//! Duoboard Core Library
//!
//! Platform-agnostic core of a two-person shared whiteboard: stroke capture,
//! local undo, and last-writer-wins synchronization through a pluggable
//! document store.

pub mod canvas;
pub mod config;
pub mod controller;
pub mod history;
pub mod recorder;
pub mod room;
pub mod session;
pub mod store;
pub mod stroke;
pub mod sync;

pub use canvas::{CanvasState, WhiteboardDocument};
pub use config::{ConfigError, WhiteboardConfig};
pub use controller::{GestureState, WhiteboardController, WhiteboardEvent};
pub use history::StrokeHistory;
pub use recorder::PathRecorder;
pub use room::{RoomBinding, RoomError};
pub use session::WhiteboardSession;
pub use store::{FileDocumentStore, MemoryDocumentStore};
pub use stroke::{PathCommand, PathSegment, Stroke};
pub use sync::{Subscription, SyncAdapter, SyncError, SyncOperation, SyncResult};

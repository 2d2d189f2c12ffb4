//! Contract with the shared document store.
//!
//! The whiteboard never talks to a backend directly. It goes through a
//! [`SyncAdapter`], which can be a hosted real-time database, a local file,
//! or an in-memory double in tests.

use crate::canvas::{CanvasState, WhiteboardDocument};
use crate::room::{RoomBinding, RoomError};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid room: {0}")]
    InvalidRoom(#[from] RoomError),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Called with the full document whenever the remote copy changes.
pub type UpdateCallback = Box<dyn Fn(WhiteboardDocument) + Send + Sync>;

/// Which call failed, for reporting to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    Pull,
    Push,
    Subscribe,
    Rename,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncOperation::Pull => "pull",
            SyncOperation::Push => "push",
            SyncOperation::Subscribe => "subscribe",
            SyncOperation::Rename => "rename",
        };
        f.write_str(name)
    }
}

/// Live subscription to a room. Dropping it unsubscribes.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap the action that detaches the listener.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Stop listening now rather than at drop.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Trait for shared document stores backing a whiteboard.
///
/// Writes are whole-canvas overwrites: whoever writes last wins, and no
/// attempt is made to merge concurrent edits.
pub trait SyncAdapter: Send + Sync {
    /// Fetch the room's document once. A room with no document yields an
    /// empty board rather than an error.
    fn pull(&self, room: &RoomBinding) -> BoxFuture<'_, SyncResult<WhiteboardDocument>>;

    /// Overwrite the room's canvas (`canvasColor` and `paths`). The board
    /// name is left as is.
    fn push(&self, room: &RoomBinding, canvas: &CanvasState) -> BoxFuture<'_, SyncResult<()>>;

    /// Change the board's display name.
    fn rename(&self, room: &RoomBinding, name: &str) -> BoxFuture<'_, SyncResult<()>>;

    /// Listen for changes to the room's document.
    fn subscribe(&self, room: &RoomBinding, on_update: UpdateCallback) -> SyncResult<Subscription>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscription_releases_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(subscription);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        subscription.unsubscribe();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_conversions() {
        let err: SyncError = RoomError::Empty.into();
        assert!(matches!(err, SyncError::InvalidRoom(RoomError::Empty)));

        let err: SyncError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, SyncError::Serialization(_)));
        assert_eq!(SyncOperation::Push.to_string(), "push");
    }
}

//! In-memory document store.

use super::{Subscribers, merge_canvas, merge_name};
use crate::canvas::{CanvasState, WhiteboardDocument};
use crate::config::DEFAULT_DOCUMENT_ROOT;
use crate::room::RoomBinding;
use crate::sync::{BoxFuture, Subscription, SyncAdapter, SyncError, SyncResult, UpdateCallback};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory store for tests and rooms that never leave the device.
///
/// Documents are kept as raw JSON values, the way a hosted document store
/// hands them back, so the lenient parsing path is exercised on every pull.
pub struct MemoryDocumentStore {
    root: String,
    documents: RwLock<HashMap<String, Value>>,
    subscribers: Arc<Subscribers>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    /// Create a new empty store under the default document root.
    pub fn new() -> Self {
        Self::with_root(DEFAULT_DOCUMENT_ROOT)
    }

    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            documents: RwLock::new(HashMap::new()),
            subscribers: Arc::new(Subscribers::default()),
        }
    }

    /// Store a raw value for a room, as another client might have written it.
    /// Listeners are notified.
    pub fn insert_raw(&self, room: &RoomBinding, value: Value) -> SyncResult<()> {
        let key = room.document_key(&self.root);
        let document = WhiteboardDocument::from_value(&value);
        let version = {
            let mut docs = self
                .documents
                .write()
                .map_err(|e| SyncError::Transport(format!("Lock error: {}", e)))?;
            docs.insert(key.clone(), value);
            self.subscribers.next_version()
        };
        self.subscribers.notify(&key, version, &document);
        Ok(())
    }

    /// The raw stored value for a room, if any.
    pub fn raw(&self, room: &RoomBinding) -> Option<Value> {
        let key = room.document_key(&self.root);
        self.documents.read().ok()?.get(&key).cloned()
    }

    /// Number of live subscriptions on a room.
    pub fn subscriber_count(&self, room: &RoomBinding) -> usize {
        self.subscribers.count(&room.document_key(&self.root))
    }

    fn update(
        &self,
        key: String,
        apply: impl FnOnce(&mut Value) -> SyncResult<()>,
    ) -> SyncResult<()> {
        let (version, document) = {
            let mut docs = self
                .documents
                .write()
                .map_err(|e| SyncError::Transport(format!("Lock error: {}", e)))?;
            let entry = docs.entry(key.clone()).or_insert(Value::Null);
            apply(entry)?;
            (self.subscribers.next_version(), WhiteboardDocument::from_value(entry))
        };
        self.subscribers.notify(&key, version, &document);
        Ok(())
    }
}

impl SyncAdapter for MemoryDocumentStore {
    fn pull(&self, room: &RoomBinding) -> BoxFuture<'_, SyncResult<WhiteboardDocument>> {
        let key = room.document_key(&self.root);
        Box::pin(async move {
            let docs = self
                .documents
                .read()
                .map_err(|e| SyncError::Transport(format!("Lock error: {}", e)))?;
            Ok(docs
                .get(&key)
                .map(WhiteboardDocument::from_value)
                .unwrap_or_default())
        })
    }

    fn push(&self, room: &RoomBinding, canvas: &CanvasState) -> BoxFuture<'_, SyncResult<()>> {
        let key = room.document_key(&self.root);
        let canvas = canvas.clone();
        Box::pin(async move { self.update(key, |entry| merge_canvas(entry, &canvas)) })
    }

    fn rename(&self, room: &RoomBinding, name: &str) -> BoxFuture<'_, SyncResult<()>> {
        let key = room.document_key(&self.root);
        let name = name.to_string();
        Box::pin(async move {
            self.update(key, |entry| {
                merge_name(entry, &name);
                Ok(())
            })
        })
    }

    fn subscribe(&self, room: &RoomBinding, on_update: UpdateCallback) -> SyncResult<Subscription> {
        self.subscribers.add(room.document_key(&self.root), on_update)
    }
}

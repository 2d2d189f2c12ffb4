//! File-based document store.

use super::{Subscribers, merge_canvas, merge_name};
use crate::canvas::{CanvasState, WhiteboardDocument};
use crate::config::DEFAULT_DOCUMENT_ROOT;
use crate::room::RoomBinding;
use crate::sync::{BoxFuture, Subscription, SyncAdapter, SyncError, SyncResult, UpdateCallback};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// File-based store.
///
/// Each room's document is a JSON file in a base directory. Listeners are
/// notified of writes made through this store only; changes made to the
/// files by other processes are not watched.
pub struct FileDocumentStore {
    /// Base directory for document files.
    base_path: PathBuf,
    root: String,
    /// Serializes read-modify-write cycles on the document files.
    write_lock: Mutex<()>,
    subscribers: Arc<Subscribers>,
}

impl FileDocumentStore {
    /// Create a store in the given directory, creating it if needed.
    pub fn new(base_path: PathBuf) -> SyncResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                SyncError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self {
            base_path,
            root: DEFAULT_DOCUMENT_ROOT.to_string(),
            write_lock: Mutex::new(()),
            subscribers: Arc::new(Subscribers::default()),
        })
    }

    /// Create a store in the default location.
    ///
    /// On Unix: `~/.local/share/duoboard/`
    /// On Windows: `%LOCALAPPDATA%\duoboard\`
    pub fn default_location() -> SyncResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| SyncError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("duoboard"))
    }

    /// Use a different document root than the default.
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// File holding a room's document.
    pub fn document_path(&self, room: &RoomBinding) -> PathBuf {
        let key = room.document_key(&self.root);
        let safe_key: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe_key))
    }

    fn read_value(path: &Path) -> SyncResult<Value> {
        if !path.exists() {
            return Ok(Value::Null);
        }
        let json = fs::read_to_string(path)
            .map_err(|e| SyncError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        match serde_json::from_str(&json) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!("Treating unreadable {} as empty: {}", path.display(), e);
                Ok(Value::Null)
            }
        }
    }

    fn write_value(path: &Path, value: &Value) -> SyncResult<()> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json)
            .map_err(|e| SyncError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn update(
        &self,
        room: &RoomBinding,
        apply: impl FnOnce(&mut Value) -> SyncResult<()>,
    ) -> SyncResult<()> {
        let path = self.document_path(room);
        let (version, value) = {
            let _guard = self
                .write_lock
                .lock()
                .map_err(|e| SyncError::Io(format!("Lock error: {}", e)))?;
            let mut value = Self::read_value(&path)?;
            apply(&mut value)?;
            Self::write_value(&path, &value)?;
            (self.subscribers.next_version(), value)
        };
        self.subscribers.notify(
            &room.document_key(&self.root),
            version,
            &WhiteboardDocument::from_value(&value),
        );
        Ok(())
    }
}

impl SyncAdapter for FileDocumentStore {
    fn pull(&self, room: &RoomBinding) -> BoxFuture<'_, SyncResult<WhiteboardDocument>> {
        let path = self.document_path(room);
        Box::pin(async move {
            let value = Self::read_value(&path)?;
            Ok(WhiteboardDocument::from_value(&value))
        })
    }

    fn push(&self, room: &RoomBinding, canvas: &CanvasState) -> BoxFuture<'_, SyncResult<()>> {
        let room = room.clone();
        let canvas = canvas.clone();
        Box::pin(async move { self.update(&room, |value| merge_canvas(value, &canvas)) })
    }

    fn rename(&self, room: &RoomBinding, name: &str) -> BoxFuture<'_, SyncResult<()>> {
        let room = room.clone();
        let name = name.to_string();
        Box::pin(async move {
            self.update(&room, |value| {
                merge_name(value, &name);
                Ok(())
            })
        })
    }

    fn subscribe(&self, room: &RoomBinding, on_update: UpdateCallback) -> SyncResult<Subscription> {
        self.subscribers.add(room.document_key(&self.root), on_update)
    }
}

//! Document store backends implementing [`SyncAdapter`](crate::sync::SyncAdapter).

mod file;
mod memory;

pub use file::FileDocumentStore;
pub use memory::MemoryDocumentStore;

use crate::canvas::{CanvasState, NAME_KEY, WhiteboardDocument};
use crate::sync::{Subscription, SyncError, SyncResult, UpdateCallback};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// In-process listeners, keyed by document key.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    next_version: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<(u64, Arc<UpdateCallback>)>>>,
    /// Latest version delivered per key. Held while callbacks run.
    delivered: Mutex<HashMap<String, u64>>,
}

impl Subscribers {
    pub(crate) fn add(
        self: &Arc<Self>,
        key: String,
        on_update: UpdateCallback,
    ) -> SyncResult<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .map_err(|e| SyncError::Transport(format!("Lock error: {}", e)))?
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(on_update)));
        log::debug!("Subscribed listener {} to {}", id, key);

        let registry = Arc::downgrade(self);
        Ok(Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(&key, id);
            }
        }))
    }

    fn remove(&self, key: &str, id: u64) {
        let Ok(mut listeners) = self.listeners.lock() else {
            return;
        };
        if let Some(list) = listeners.get_mut(key) {
            list.retain(|(listener_id, _)| *listener_id != id);
            if list.is_empty() {
                listeners.remove(key);
            }
        }
        log::debug!("Unsubscribed listener {} from {}", id, key);
    }

    /// Version for a write. Must be taken while the store's write lock is
    /// held so versions follow write order.
    pub(crate) fn next_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Deliver a document to every listener of `key`.
    ///
    /// Deliveries are serialized and a version older than one already
    /// delivered is dropped, so listeners always end on the latest write.
    /// Callbacks may subscribe or unsubscribe but must not write to the
    /// store that is notifying them.
    pub(crate) fn notify(&self, key: &str, version: u64, document: &WhiteboardDocument) {
        let mut delivered = match self.delivered.lock() {
            Ok(delivered) => delivered,
            Err(e) => {
                log::warn!("Cannot notify listeners of {}: {}", key, e);
                return;
            }
        };
        let last = delivered.entry(key.to_string()).or_insert(0);
        if version <= *last {
            log::debug!("Skipping stale update {} for {}", version, key);
            return;
        }
        *last = version;

        let targets: Vec<Arc<UpdateCallback>> = match self.listeners.lock() {
            Ok(listeners) => listeners
                .get(key)
                .map(|list| list.iter().map(|(_, cb)| cb.clone()).collect())
                .unwrap_or_default(),
            Err(e) => {
                log::warn!("Cannot notify listeners of {}: {}", key, e);
                return;
            }
        };
        for callback in targets {
            callback(document.clone());
        }
    }

    pub(crate) fn count(&self, key: &str) -> usize {
        self.listeners
            .lock()
            .map(|listeners| listeners.get(key).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

/// Overwrite the canvas fields of a stored value, keeping everything else.
pub(crate) fn merge_canvas(target: &mut Value, canvas: &CanvasState) -> SyncResult<()> {
    let Value::Object(fields) = serde_json::to_value(canvas)? else {
        return Err(SyncError::Serialization("canvas did not serialize to an object".into()));
    };
    object_mut(target).extend(fields);
    Ok(())
}

/// Set the board name on a stored value.
pub(crate) fn merge_name(target: &mut Value, name: &str) {
    object_mut(target).insert(NAME_KEY.to_string(), Value::String(name.to_string()));
}

fn object_mut(target: &mut Value) -> &mut Map<String, Value> {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    match target {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_merge_keeps_name() {
        let mut stored = json!({ "name": "ours", "canvasColor": "black", "extra": 1 });
        merge_canvas(&mut stored, &CanvasState::new()).unwrap();

        assert_eq!(stored["name"], "ours");
        assert_eq!(stored["canvasColor"], "white");
        assert_eq!(stored["paths"], json!([]));
        assert_eq!(stored["extra"], 1);
    }

    #[test]
    fn test_merge_into_non_object() {
        let mut stored = Value::Null;
        merge_name(&mut stored, "fresh");
        assert_eq!(stored, json!({ "name": "fresh" }));
    }

    #[test]
    fn test_notify_and_release() {
        let subscribers = Arc::new(Subscribers::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let subscription = subscribers
            .add(
                "whiteboards/a".to_string(),
                Box::new(move |_: WhiteboardDocument| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(subscribers.count("whiteboards/a"), 1);

        let doc = WhiteboardDocument::default();
        subscribers.notify("whiteboards/a", subscribers.next_version(), &doc);
        subscribers.notify("whiteboards/b", subscribers.next_version(), &doc);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        drop(subscription);
        assert_eq!(subscribers.count("whiteboards/a"), 0);
        subscribers.notify("whiteboards/a", subscribers.next_version(), &doc);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_out_of_order_notification_is_dropped() {
        let subscribers = Arc::new(Subscribers::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = subscribers
            .add(
                "whiteboards/a".to_string(),
                Box::new(move |doc: WhiteboardDocument| sink.lock().unwrap().push(doc.name)),
            )
            .unwrap();

        let older = subscribers.next_version();
        let newer = subscribers.next_version();
        let named = |name: &str| WhiteboardDocument::new(name, CanvasState::new());
        subscribers.notify("whiteboards/a", newer, &named("newer"));
        subscribers.notify("whiteboards/a", older, &named("older"));

        assert_eq!(*seen.lock().unwrap(), vec!["newer".to_string()]);
    }
}

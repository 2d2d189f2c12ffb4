//! Binding of a whiteboard controller to a room in a shared store.

use crate::canvas::WhiteboardDocument;
use crate::config::WhiteboardConfig;
use crate::controller::WhiteboardController;
use crate::room::RoomBinding;
use crate::sync::{
    Subscription, SyncAdapter, SyncError, SyncOperation, SyncResult, UpdateCallback,
};
use std::sync::{Arc, Mutex};

/// Updates received from the subscription, waiting for the owning thread.
type Inbox = Arc<Mutex<Vec<WhiteboardDocument>>>;

/// One client's view of a shared whiteboard.
///
/// Subscription callbacks may fire on any thread, so they only queue
/// documents. Call [`WhiteboardSession::sync`] (or `flush` and
/// `deliver_remote` separately) from the UI thread after each interaction.
pub struct WhiteboardSession<S: SyncAdapter> {
    /// Store backend.
    adapter: Arc<S>,
    room: RoomBinding,
    controller: WhiteboardController,
    inbox: Inbox,
    /// Live while the session is open.
    subscription: Option<Subscription>,
}

impl<S: SyncAdapter> WhiteboardSession<S> {
    pub fn new(adapter: Arc<S>, room: RoomBinding, config: &WhiteboardConfig) -> Self {
        Self {
            adapter,
            room,
            controller: WhiteboardController::new(config),
            inbox: Arc::new(Mutex::new(Vec::new())),
            subscription: None,
        }
    }

    pub fn room(&self) -> &RoomBinding {
        &self.room
    }

    pub fn adapter(&self) -> &Arc<S> {
        &self.adapter
    }

    pub fn controller(&self) -> &WhiteboardController {
        &self.controller
    }

    /// The controller, for feeding it gestures and button presses.
    pub fn controller_mut(&mut self) -> &mut WhiteboardController {
        &mut self.controller
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Number of received updates not yet handed to the controller.
    pub fn pending_updates(&self) -> usize {
        self.inbox.lock().map(|inbox| inbox.len()).unwrap_or(0)
    }

    /// Start listening for changes, then load the room's current document.
    ///
    /// Listening starts first so that writes landing while the pull is in
    /// flight are queued rather than missed. They are applied after the
    /// pulled document.
    pub async fn open(&mut self) -> SyncResult<()> {
        log::info!("Opening whiteboard room {}", self.room);
        self.subscribe()?;
        let pulled = self.adapter.pull(&self.room).await;
        let document = self.check(SyncOperation::Pull, pulled)?;
        self.controller.on_remote_update(document);
        self.deliver_remote();
        Ok(())
    }

    fn subscribe(&mut self) -> SyncResult<()> {
        if self.subscription.is_some() {
            return Ok(());
        }
        let inbox = Arc::clone(&self.inbox);
        let on_update: UpdateCallback =
            Box::new(move |document: WhiteboardDocument| match inbox.lock() {
                Ok(mut inbox) => inbox.push(document),
                Err(e) => log::warn!("Dropping remote update: {}", e),
            });
        let subscribed = self.adapter.subscribe(&self.room, on_update);
        self.subscription = Some(self.check(SyncOperation::Subscribe, subscribed)?);
        Ok(())
    }

    /// Push the local canvas if it changed. Returns whether anything was sent.
    pub async fn flush(&mut self) -> SyncResult<bool> {
        let Some(canvas) = self.controller.take_push() else {
            return Ok(false);
        };
        log::debug!(
            "Pushing {} strokes to room {}",
            canvas.strokes().len(),
            self.room
        );
        let pushed = self.adapter.push(&self.room, &canvas).await;
        self.check(SyncOperation::Push, pushed)?;
        Ok(true)
    }

    /// Hand queued remote updates to the controller in the order received.
    /// Returns how many were delivered.
    pub fn deliver_remote(&mut self) -> usize {
        let updates = match self.inbox.lock() {
            Ok(mut inbox) => std::mem::take(&mut *inbox),
            Err(e) => {
                log::warn!("Remote updates unavailable: {}", e);
                return 0;
            }
        };
        let count = updates.len();
        for document in updates {
            self.controller.on_remote_update(document);
        }
        count
    }

    /// Push local changes, then apply what arrived from the store.
    pub async fn sync(&mut self) -> SyncResult<()> {
        self.flush().await?;
        self.deliver_remote();
        Ok(())
    }

    /// Change the board's display name for both participants.
    pub async fn rename(&mut self, name: &str) -> SyncResult<()> {
        let renamed = self.adapter.rename(&self.room, name).await;
        self.check(SyncOperation::Rename, renamed)?;
        log::info!("Renamed whiteboard {} to {:?}", self.room, name);
        self.controller.set_name(name);
        Ok(())
    }

    /// Stop listening for remote changes.
    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            log::info!("Closed whiteboard room {}", self.room);
        }
    }

    fn check<T>(&mut self, operation: SyncOperation, result: SyncResult<T>) -> SyncResult<T> {
        result.map_err(|e: SyncError| {
            self.controller.report_sync_failure(operation, &e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CanvasState;
    use crate::controller::WhiteboardEvent;
    use crate::store::MemoryDocumentStore;
    use crate::sync::BoxFuture;
    use crate::stroke::Stroke;
    use kurbo::Point;
    use pollster::block_on;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn room() -> RoomBinding {
        RoomBinding::join("couple-42").unwrap()
    }

    fn open_session(store: &Arc<MemoryDocumentStore>) -> WhiteboardSession<MemoryDocumentStore> {
        let config = WhiteboardConfig::default();
        let mut session = WhiteboardSession::new(store.clone(), room(), &config);
        block_on(session.open()).unwrap();
        session
    }

    fn draw(
        session: &mut WhiteboardSession<MemoryDocumentStore>,
        color: &str,
        points: &[(f64, f64)],
    ) {
        let controller = session.controller_mut();
        controller.on_color_picked(color);
        controller.on_touch_start();
        for &(x, y) in points {
            controller.on_touch_move(x, y);
        }
        controller.on_touch_end();
    }

    fn colors(session: &WhiteboardSession<MemoryDocumentStore>) -> Vec<String> {
        session
            .controller()
            .canvas()
            .strokes()
            .iter()
            .map(|s| s.color().to_string())
            .collect()
    }

    #[test]
    fn test_open_loads_existing_board() {
        init_logging();
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .insert_raw(
                &room(),
                json!({
                    "name": "Sunday plans",
                    "canvasColor": "#fff8e7",
                    "paths": { "0": { "path": ["M1,1 ", "L2,2 "], "color": "red", "width": 3 } }
                }),
            )
            .unwrap();

        let session = open_session(&store);
        assert!(session.is_subscribed());
        assert_eq!(store.subscriber_count(&room()), 1);
        assert_eq!(session.controller().name(), "Sunday plans");
        assert_eq!(session.controller().canvas().canvas_color(), "#fff8e7");
        assert_eq!(colors(&session), vec!["red"]);
    }

    #[test]
    fn test_open_empty_room() {
        init_logging();
        let store = Arc::new(MemoryDocumentStore::new());
        let session = open_session(&store);
        assert!(session.controller().canvas().is_empty());
        assert!(store.raw(&room()).is_none());
    }

    #[test]
    fn test_flush_pushes_latest_state_once() {
        init_logging();
        let store = Arc::new(MemoryDocumentStore::new());
        let mut session = open_session(&store);

        draw(&mut session, "red", &[(0.0, 0.0), (1.0, 1.0)]);
        draw(&mut session, "blue", &[(5.0, 5.0), (6.0, 6.0)]);
        assert!(block_on(session.flush()).unwrap());
        assert!(!block_on(session.flush()).unwrap());

        let raw = store.raw(&room()).unwrap();
        assert_eq!(raw["paths"].as_array().unwrap().len(), 2);
        assert_eq!(raw["paths"][1]["color"], "blue");
    }

    #[test]
    fn test_strokes_reach_the_partner() {
        init_logging();
        let store = Arc::new(MemoryDocumentStore::new());
        let mut alice = open_session(&store);
        let mut bob = open_session(&store);

        draw(&mut alice, "red", &[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        block_on(alice.sync()).unwrap();

        assert_eq!(bob.pending_updates(), 1);
        assert_eq!(bob.deliver_remote(), 1);
        assert_eq!(colors(&bob), vec!["red"]);
        assert_eq!(bob.controller().canvas(), alice.controller().canvas());
    }

    #[test]
    fn test_last_push_wins() {
        init_logging();
        let store = Arc::new(MemoryDocumentStore::new());
        let mut alice = open_session(&store);
        let mut bob = open_session(&store);

        draw(&mut alice, "red", &[(0.0, 0.0), (1.0, 1.0)]);
        draw(&mut bob, "blue", &[(5.0, 5.0), (6.0, 6.0)]);

        block_on(alice.sync()).unwrap();
        block_on(bob.sync()).unwrap();
        block_on(alice.sync()).unwrap();

        assert_eq!(colors(&alice), vec!["blue"]);
        assert_eq!(colors(&bob), vec!["blue"]);
        let stored = WhiteboardDocument::from_value(&store.raw(&room()).unwrap());
        assert_eq!(&stored.canvas, bob.controller().canvas());
    }

    #[test]
    fn test_update_during_gesture_is_merged_under_new_stroke() {
        init_logging();
        let store = Arc::new(MemoryDocumentStore::new());
        let mut alice = open_session(&store);
        let mut bob = open_session(&store);

        bob.controller_mut().on_touch_start();
        bob.controller_mut().on_touch_move(10.0, 10.0);

        draw(&mut alice, "red", &[(0.0, 0.0), (1.0, 1.0)]);
        block_on(alice.sync()).unwrap();

        bob.deliver_remote();
        assert!(bob.controller().has_pending_remote());
        bob.controller_mut().on_color_picked("blue");
        bob.controller_mut().on_touch_move(11.0, 11.0);
        bob.controller_mut().on_touch_end();
        block_on(bob.sync()).unwrap();

        block_on(alice.sync()).unwrap();
        assert_eq!(colors(&alice), vec!["red", "blue"]);
        assert_eq!(colors(&bob), vec!["red", "blue"]);
    }

    #[test]
    fn test_rename_keeps_canvas() {
        init_logging();
        let store = Arc::new(MemoryDocumentStore::new());
        let mut session = open_session(&store);
        draw(&mut session, "red", &[(0.0, 0.0), (1.0, 1.0)]);
        block_on(session.sync()).unwrap();

        block_on(session.rename("Our board")).unwrap();
        assert_eq!(session.controller().name(), "Our board");

        draw(&mut session, "blue", &[(3.0, 3.0), (4.0, 4.0)]);
        block_on(session.sync()).unwrap();

        let stored = WhiteboardDocument::from_value(&store.raw(&room()).unwrap());
        assert_eq!(stored.name, "Our board");
        assert_eq!(stored.canvas.strokes().len(), 2);
    }

    #[test]
    fn test_close_unsubscribes() {
        init_logging();
        let store = Arc::new(MemoryDocumentStore::new());
        let mut alice = open_session(&store);
        let mut bob = open_session(&store);
        assert_eq!(store.subscriber_count(&room()), 2);

        bob.close();
        assert!(!bob.is_subscribed());
        assert_eq!(store.subscriber_count(&room()), 1);

        draw(&mut alice, "red", &[(0.0, 0.0), (1.0, 1.0)]);
        block_on(alice.sync()).unwrap();
        assert_eq!(bob.pending_updates(), 0);
    }

    struct OfflineStore;

    impl SyncAdapter for OfflineStore {
        fn pull(&self, _room: &RoomBinding) -> BoxFuture<'_, SyncResult<WhiteboardDocument>> {
            Box::pin(async { Err(SyncError::Transport("offline".into())) })
        }

        fn push(
            &self,
            _room: &RoomBinding,
            _canvas: &CanvasState,
        ) -> BoxFuture<'_, SyncResult<()>> {
            Box::pin(async { Err(SyncError::Transport("offline".into())) })
        }

        fn rename(&self, _room: &RoomBinding, _name: &str) -> BoxFuture<'_, SyncResult<()>> {
            Box::pin(async { Err(SyncError::Transport("offline".into())) })
        }

        fn subscribe(
            &self,
            _room: &RoomBinding,
            _on_update: UpdateCallback,
        ) -> SyncResult<Subscription> {
            Err(SyncError::Transport("offline".into()))
        }
    }

    #[test]
    fn test_failures_are_reported_and_local_state_kept() {
        init_logging();
        let config = WhiteboardConfig::default();
        let mut session = WhiteboardSession::new(Arc::new(OfflineStore), room(), &config);

        assert!(block_on(session.open()).is_err());
        assert!(!session.is_subscribed());

        let controller = session.controller_mut();
        controller.on_touch_start();
        controller.on_touch_move(1.0, 1.0);
        controller.on_touch_end();
        assert!(matches!(block_on(session.flush()), Err(SyncError::Transport(_))));
        assert!(block_on(session.rename("x")).is_err());

        assert_eq!(session.controller().canvas().strokes().len(), 1);
        assert_eq!(session.controller().name(), "");

        let failed: Vec<SyncOperation> = session
            .controller_mut()
            .take_events()
            .into_iter()
            .filter_map(|event| match event {
                WhiteboardEvent::SyncFailed { operation, .. } => Some(operation),
                _ => None,
            })
            .collect();
        assert_eq!(
            failed,
            vec![SyncOperation::Subscribe, SyncOperation::Push, SyncOperation::Rename]
        );
    }

    /// Memory store where the partner writes right after the first pull is read.
    struct PartnerWritesDuringPull {
        inner: MemoryDocumentStore,
        partner: CanvasState,
        written: AtomicBool,
    }

    impl SyncAdapter for PartnerWritesDuringPull {
        fn pull(&self, room: &RoomBinding) -> BoxFuture<'_, SyncResult<WhiteboardDocument>> {
            let room = room.clone();
            Box::pin(async move {
                let document = self.inner.pull(&room).await?;
                if !self.written.swap(true, Ordering::SeqCst) {
                    self.inner.push(&room, &self.partner).await?;
                }
                Ok(document)
            })
        }

        fn push(&self, room: &RoomBinding, canvas: &CanvasState) -> BoxFuture<'_, SyncResult<()>> {
            self.inner.push(room, canvas)
        }

        fn rename(&self, room: &RoomBinding, name: &str) -> BoxFuture<'_, SyncResult<()>> {
            self.inner.rename(room, name)
        }

        fn subscribe(
            &self,
            room: &RoomBinding,
            on_update: UpdateCallback,
        ) -> SyncResult<Subscription> {
            self.inner.subscribe(room, on_update)
        }
    }

    #[test]
    fn test_open_catches_write_during_initial_pull() {
        init_logging();
        let mut partner = CanvasState::new();
        partner.set_strokes(vec![Stroke::from_points(
            [Point::new(3.0, 3.0), Point::new(4.0, 4.0)],
            "purple",
            2.0,
        )]);
        let store = Arc::new(PartnerWritesDuringPull {
            inner: MemoryDocumentStore::new(),
            partner: partner.clone(),
            written: AtomicBool::new(false),
        });

        let config = WhiteboardConfig::default();
        let mut session = WhiteboardSession::new(store.clone(), room(), &config);
        block_on(session.open()).unwrap();

        let stored = block_on(store.pull(&room())).unwrap();
        assert_eq!(stored.canvas, partner);
        assert_eq!(session.controller().canvas(), &stored.canvas);
        assert_eq!(session.pending_updates(), 0);
    }
}

//! Live view of one table: bulk fetch plus change stream.
//!
//! Each `select` starts a worker thread that fetches the table, opens a
//! subscription and forwards every change event into the view's channel,
//! tagged with the selection generation. The UI thread drains the channel in
//! [`LiveView::pump`]; messages from an older generation, or arriving after
//! [`LiveView::teardown`], are dropped without touching the snapshot.

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::Snapshot;
use crate::model::{ChangeAction, ChangeEvent, RecordId, Row};
use crate::store::{LiveHandle, Store, StoreError};

/// Lifecycle of the view's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewStatus {
    /// No table selected.
    Idle,
    /// Waiting for the bulk fetch or the subscription.
    Loading,
    /// Snapshot is up to date and receiving changes.
    Live,
    /// The change stream closed; the snapshot no longer updates.
    Stale(String),
    FetchFailed(String),
    SubscribeFailed(String),
}

impl ViewStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewStatus::Loading)
    }
}

impl fmt::Display for ViewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewStatus::Idle => write!(f, "idle"),
            ViewStatus::Loading => write!(f, "loading"),
            ViewStatus::Live => write!(f, "live"),
            ViewStatus::Stale(reason) => write!(f, "stale ({})", reason),
            ViewStatus::FetchFailed(msg) => write!(f, "fetch failed: {}", msg),
            ViewStatus::SubscribeFailed(msg) => write!(f, "no live updates: {}", msg),
        }
    }
}

#[derive(Debug)]
enum SlotState {
    Pending,
    Attached(LiveHandle),
    Cancelled,
}

/// Hand-off point for the subscription handle between a worker and the view.
///
/// Whoever comes second releases the handle: the view when it cancels an
/// attached slot, the worker when it attaches to a cancelled one.
#[derive(Debug)]
struct SubscriptionSlot {
    state: Mutex<SlotState>,
}

impl SubscriptionSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
        }
    }

    /// Stores the handle. Returns `false` if the slot was already cancelled.
    fn attach(&self, handle: LiveHandle) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            SlotState::Pending => {
                *state = SlotState::Attached(handle);
                true
            }
            _ => false,
        }
    }

    /// Cancels the slot and returns the handle if one was attached.
    fn cancel(&self) -> Option<LiveHandle> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match std::mem::replace(&mut *state, SlotState::Cancelled) {
            SlotState::Attached(handle) => Some(handle),
            _ => None,
        }
    }

    fn is_cancelled(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(|e| e.into_inner()),
            SlotState::Cancelled
        )
    }
}

enum Message {
    Fetched(Result<Vec<Row>, StoreError>),
    Subscribed(Result<LiveHandle, StoreError>),
    Event(ChangeEvent),
}

struct Envelope {
    generation: u64,
    message: Message,
}

/// Synchronized view of the selected table.
pub struct LiveView {
    store: Arc<dyn Store>,
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    generation: u64,
    active: bool,
    table: Option<String>,
    snapshot: Snapshot,
    status: ViewStatus,
    slot: Option<Arc<SubscriptionSlot>>,
    handle: Option<LiveHandle>,
}

impl LiveView {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            store,
            tx,
            rx,
            generation: 0,
            active: true,
            table: None,
            snapshot: Snapshot::new(),
            status: ViewStatus::Idle,
            slot: None,
            handle: None,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn status(&self) -> &ViewStatus {
        &self.status
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether a change stream is currently attached to the view.
    pub fn has_active_subscription(&self) -> bool {
        self.handle.is_some()
    }

    /// Switches the view to `table`; an empty name clears the selection.
    ///
    /// The previous subscription is released, the snapshot is cleared, and a
    /// worker is started to fetch and subscribe. Selecting the current table
    /// again re-fetches.
    pub fn select(&mut self, table: &str) {
        self.release();
        self.generation += 1;
        self.active = true;
        self.snapshot.clear();

        if table.is_empty() {
            self.table = None;
            self.status = ViewStatus::Idle;
            return;
        }

        self.table = Some(table.to_string());
        self.status = ViewStatus::Loading;

        let slot = Arc::new(SubscriptionSlot::new());
        self.slot = Some(slot.clone());

        let store = self.store.clone();
        let tx = self.tx.clone();
        let generation = self.generation;
        let worker_table = table.to_string();
        let spawned = thread::Builder::new()
            .name(format!("rowdeck-sync-{}", generation))
            .spawn(move || run_worker(store, worker_table, generation, slot, tx));

        if let Err(e) = spawned {
            warn!(table, error = %e, "cannot start sync worker");
            self.slot = None;
            self.status = ViewStatus::FetchFailed(e.to_string());
        } else {
            debug!(table, generation, "table selected");
        }
    }

    /// Re-selects the current table.
    pub fn refresh(&mut self) {
        let table = self.table.clone().unwrap_or_default();
        self.select(&table);
    }

    /// Releases the subscription and deactivates the view.
    ///
    /// Safe to call repeatedly and while a selection is still loading.
    pub fn teardown(&mut self) {
        self.release();
        self.generation += 1;
        self.active = false;
        self.table = None;
        self.snapshot.clear();
        self.status = ViewStatus::Idle;
    }

    /// Drains pending worker messages into the snapshot.
    ///
    /// Returns the number of messages that affected the view.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(envelope) = self.rx.try_recv() {
            if self.accept(envelope) {
                applied += 1;
            }
        }
        applied
    }

    /// Like [`pump`](Self::pump), but first waits up to `timeout` for a message.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => usize::from(self.accept(envelope)) + self.pump(),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Sets the `connected` flag of a row in the snapshot.
    ///
    /// Used for outcomes of collaborators that emit no change event. Rows
    /// not in the snapshot are left alone.
    pub fn set_connected(&mut self, id: &RecordId, connected: bool) -> bool {
        self.active && self.snapshot.set_connected(id, connected)
    }

    fn release(&mut self) {
        self.handle = None;
        let Some(slot) = self.slot.take() else {
            return;
        };
        if let Some(handle) = slot.cancel() {
            if let Err(e) = self.store.kill(handle) {
                warn!(%handle, error = %e, "failed to release subscription");
            } else {
                debug!(%handle, "subscription released");
            }
        }
    }

    fn accept(&mut self, envelope: Envelope) -> bool {
        if !self.active || envelope.generation != self.generation {
            return false;
        }
        let table = self.table.as_deref().unwrap_or_default();
        match envelope.message {
            Message::Fetched(Ok(rows)) => {
                debug!(table, rows = rows.len(), "fetched");
                self.snapshot.load(rows);
                true
            }
            Message::Fetched(Err(e)) => {
                warn!(table, error = %e, "fetch failed");
                self.snapshot.clear();
                self.status = ViewStatus::FetchFailed(e.to_string());
                true
            }
            Message::Subscribed(Ok(handle)) => {
                info!(table, %handle, "live");
                self.handle = Some(handle);
                self.status = ViewStatus::Live;
                true
            }
            Message::Subscribed(Err(e)) => {
                warn!(table, error = %e, "subscribe failed");
                self.status = ViewStatus::SubscribeFailed(e.to_string());
                true
            }
            Message::Event(event) => {
                if let ChangeAction::Close(reason) = event.action {
                    warn!(table, %reason, "change stream closed");
                    self.slot = None;
                    if let Some(handle) = self.handle.take()
                        && let Err(e) = self.store.kill(handle)
                    {
                        debug!(%handle, error = %e, "closed subscription not released");
                    }
                    self.status = ViewStatus::Stale(reason.to_string());
                    return true;
                }
                self.snapshot.apply(&event)
            }
        }
    }
}

impl Drop for LiveView {
    fn drop(&mut self) {
        self.release();
    }
}

/// Fetches, subscribes and forwards events for one selection.
fn run_worker(
    store: Arc<dyn Store>,
    table: String,
    generation: u64,
    slot: Arc<SubscriptionSlot>,
    tx: Sender<Envelope>,
) {
    let send = |message: Message| {
        tx.send(Envelope {
            generation,
            message,
        })
        .is_ok()
    };

    let fetched = store.select(&table);
    let fetch_ok = fetched.is_ok();
    if !send(Message::Fetched(fetched)) || !fetch_ok || slot.is_cancelled() {
        return;
    }

    let stream = match store.live(&table) {
        Ok(stream) => stream,
        Err(e) => {
            send(Message::Subscribed(Err(e)));
            return;
        }
    };

    if !slot.attach(stream.handle) {
        debug!(table = %table, handle = %stream.handle, "selection superseded, releasing");
        if let Err(e) = store.kill(stream.handle) {
            warn!(table = %table, error = %e, "failed to release superseded subscription");
        }
        return;
    }
    if !send(Message::Subscribed(Ok(stream.handle))) {
        return;
    }

    for event in stream.events.iter() {
        let closing = matches!(event.action, ChangeAction::Close(_));
        if !send(Message::Event(event)) || closing {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Op};
    use serde_json::{Map, json};
    use std::time::Instant;

    fn row(table: &str, key: &str, name: &str) -> Row {
        Row::from_json(table, json!({"id": key, "name": name})).unwrap()
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new()
                .with_table("a", vec![row("a", "1", "one"), row("a", "2", "two")])
                .with_table("b", vec![row("b", "9", "nine")]),
        )
    }

    fn view(store: &Arc<MemoryStore>) -> LiveView {
        let dyn_store: Arc<dyn Store> = store.clone();
        LiveView::new(dyn_store)
    }

    /// Pumps until `done` holds or two seconds pass.
    fn pump_until(view: &mut LiveView, mut done: impl FnMut(&LiveView) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if done(view) {
                return true;
            }
            view.pump_timeout(Duration::from_millis(10));
        }
        done(view)
    }

    fn keys(view: &LiveView) -> Vec<String> {
        view.snapshot()
            .rows()
            .iter()
            .map(|r| r.id.key().to_string())
            .collect()
    }

    #[test]
    fn test_select_fetches_and_goes_live() {
        let store = store();
        let mut v = view(&store);
        v.select("a");
        assert_eq!(v.status(), &ViewStatus::Loading);
        assert!(pump_until(&mut v, |v| v.status() == &ViewStatus::Live));
        assert_eq!(keys(&v), vec!["1", "2"]);
        assert!(v.has_active_subscription());
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn test_server_changes_reach_snapshot_in_order() {
        let store = store();
        let mut v = view(&store);
        v.select("a");
        assert!(pump_until(&mut v, |v| v.status() == &ViewStatus::Live));

        store.insert(row("a", "3", "three"));
        store.replace(row("a", "1", "uno"));
        store.remove(&RecordId::new("a", "2"));
        assert!(pump_until(&mut v, |v| keys(v) == vec!["1", "3"]));
        let first = v.snapshot().get(&RecordId::new("a", "1")).unwrap();
        assert_eq!(first.field("name"), Some(json!("uno")));
    }

    #[test]
    fn test_reselect_keeps_single_subscription_scoped_to_new_table() {
        let store = store();
        let mut v = view(&store);
        v.select("a");
        v.select("b");
        assert!(pump_until(&mut v, |v| v.status() == &ViewStatus::Live));
        assert!(pump_until(&mut v, |_| store.subscriber_count() == 1));
        assert_eq!(keys(&v), vec!["9"]);
        assert_eq!(v.table(), Some("b"));

        // Changes to the old table never leak into the new snapshot.
        store.insert(row("a", "7", "late"));
        v.pump_timeout(Duration::from_millis(50));
        assert_eq!(keys(&v), vec!["9"]);
    }

    #[test]
    fn test_selecting_same_table_twice_refetches() {
        let store = store();
        let mut v = view(&store);
        v.select("a");
        assert!(pump_until(&mut v, |v| v.status() == &ViewStatus::Live));
        v.refresh();
        assert!(v.snapshot().is_empty());
        assert!(pump_until(&mut v, |v| v.status() == &ViewStatus::Live));
        assert_eq!(keys(&v), vec!["1", "2"]);
        assert!(pump_until(&mut v, |_| store.subscriber_count() == 1));
    }

    #[test]
    fn test_teardown_releases_and_ignores_late_events() {
        let store = store();
        let mut v = view(&store);
        v.select("a");
        assert!(pump_until(&mut v, |v| v.status() == &ViewStatus::Live));

        v.teardown();
        v.teardown();
        assert!(!v.has_active_subscription());
        assert_eq!(store.subscriber_count(), 0);

        store.insert(row("a", "3", "three"));
        v.pump_timeout(Duration::from_millis(50));
        assert!(v.snapshot().is_empty());
        assert!(!v.is_active());
    }

    #[test]
    fn test_teardown_during_load_releases_late_subscription() {
        let store = store();
        let mut v = view(&store);
        v.select("a");
        v.teardown();

        // The worker may still be between fetch and subscribe.
        thread::sleep(Duration::from_millis(50));
        let deadline = Instant::now() + Duration::from_secs(2);
        while store.subscriber_count() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(store.subscriber_count(), 0);
        v.pump();
        assert!(v.snapshot().is_empty());
        assert_eq!(v.status(), &ViewStatus::Idle);
    }

    #[test]
    fn test_fetch_failure_leaves_empty_snapshot() {
        let store = store();
        store.fail_next(Op::Select, "boom");
        let mut v = view(&store);
        v.select("a");
        assert!(pump_until(&mut v, |v| matches!(
            v.status(),
            ViewStatus::FetchFailed(_)
        )));
        assert!(v.snapshot().is_empty());
        assert!(!v.status().is_loading());
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_failure_keeps_fetched_rows() {
        let store = store();
        store.fail_next(Op::Live, "no stream");
        let mut v = view(&store);
        v.select("a");
        assert!(pump_until(&mut v, |v| matches!(
            v.status(),
            ViewStatus::SubscribeFailed(_)
        )));
        assert_eq!(keys(&v), vec!["1", "2"]);
        assert!(!v.has_active_subscription());
    }

    #[test]
    fn test_disconnect_marks_view_stale() {
        let store = store();
        let mut v = view(&store);
        v.select("a");
        assert!(pump_until(&mut v, |v| v.status() == &ViewStatus::Live));

        store.disconnect_all();
        assert!(pump_until(&mut v, |v| matches!(v.status(), ViewStatus::Stale(_))));
        assert_eq!(v.status(), &ViewStatus::Stale("disconnected".to_string()));
        assert_eq!(keys(&v), vec!["1", "2"]);
        assert!(!v.has_active_subscription());
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_empty_selection_is_idle() {
        let store = store();
        let mut v = view(&store);
        v.select("a");
        v.select("");
        assert_eq!(v.status(), &ViewStatus::Idle);
        assert_eq!(v.table(), None);
        v.pump_timeout(Duration::from_millis(50));
        assert!(v.snapshot().is_empty());
    }

    #[test]
    fn test_merge_converges_through_event() {
        let store = store();
        let mut v = view(&store);
        v.select("a");
        assert!(pump_until(&mut v, |v| v.status() == &ViewStatus::Live));

        let mut fields = Map::new();
        fields.insert("name".into(), json!("edited"));
        store.merge(&RecordId::new("a", "2"), &fields).unwrap();
        assert!(pump_until(&mut v, |v| {
            v.snapshot()
                .get(&RecordId::new("a", "2"))
                .and_then(|r| r.field("name"))
                == Some(json!("edited"))
        }));
        assert_eq!(v.snapshot().len(), 2);
    }
}

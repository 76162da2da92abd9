//! In-memory store for tests and demo mode.
//!
//! `MemoryStore` keeps tables in memory and pushes change events to live
//! subscribers whenever a row changes, whether the change comes through the
//! `Store` trait (merge, delete) or from the "server side" helpers
//! (`insert`, `replace`, `remove`). Individual operations can be made to fail
//! to exercise error paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, MutexGuard};

use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{Credentials, LiveHandle, LiveStream, SessionToken, Store, StoreError};
use crate::model::{ChangeEvent, CloseReason, RecordId, Row};

/// Store operation, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Signin,
    Authenticate,
    Tables,
    Select,
    Live,
    Kill,
    Merge,
    Delete,
}

struct Subscriber {
    table: String,
    tx: Sender<ChangeEvent>,
    /// The stream got its `Close`; the registration stays until killed.
    closed: bool,
}

#[derive(Default)]
struct Inner {
    tables: BTreeMap<String, Vec<Row>>,
    users: HashMap<String, String>,
    tokens: HashSet<String>,
    subscribers: HashMap<u64, Subscriber>,
    next_handle: u64,
    next_token: u64,
    /// One-shot failures, consumed by the next call of the operation.
    failures: HashMap<Op, String>,
    /// Records whose merge/delete always fails.
    failing_ids: HashSet<RecordId>,
}

impl Inner {
    fn take_failure(&mut self, op: Op) -> Result<(), StoreError> {
        match self.failures.remove(&op) {
            Some(msg) => Err(StoreError::Query(msg)),
            None => Ok(()),
        }
    }

    /// Sends `event` to every subscriber of `table`, dropping those whose
    /// receiver is gone.
    fn notify(&mut self, table: &str, event: ChangeEvent) {
        self.subscribers.retain(|handle, sub| {
            if sub.closed || sub.table != table {
                return true;
            }
            let delivered = sub.tx.send(event.clone()).is_ok();
            if !delivered {
                debug!(handle, table, "dropping subscriber with closed receiver");
            }
            delivered
        });
    }
}

/// In-process implementation of [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store with no tables and no users.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table with initial rows (no events are sent).
    pub fn with_table(self, name: &str, rows: Vec<Row>) -> Self {
        self.lock().tables.insert(name.to_string(), rows);
        self
    }

    /// Registers a user that can sign in.
    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.lock()
            .users
            .insert(username.to_string(), password.to_string());
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Inserts a row as if another client created it. Returns `false` if the
    /// id already exists.
    pub fn insert(&self, row: Row) -> bool {
        let mut inner = self.lock();
        let table = row.id.table().to_string();
        let rows = inner.tables.entry(table.clone()).or_default();
        if rows.iter().any(|r| r.id == row.id) {
            return false;
        }
        rows.push(row.clone());
        inner.notify(&table, ChangeEvent::create(row));
        true
    }

    /// Replaces a row wholesale as if another client updated it.
    pub fn replace(&self, row: Row) -> bool {
        let mut inner = self.lock();
        let table = row.id.table().to_string();
        let Some(slot) = inner
            .tables
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == row.id))
        else {
            return false;
        };
        *slot = row.clone();
        inner.notify(&table, ChangeEvent::update(row));
        true
    }

    /// Removes a row as if another client deleted it.
    pub fn remove(&self, id: &RecordId) -> Option<Row> {
        let mut inner = self.lock();
        let rows = inner.tables.get_mut(id.table())?;
        let pos = rows.iter().position(|r| &r.id == id)?;
        let row = rows.remove(pos);
        inner.notify(id.table(), ChangeEvent::delete(row.clone()));
        Some(row)
    }

    /// Current rows of a table.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Makes the next call of `op` fail with `message`.
    pub fn fail_next(&self, op: Op, message: &str) {
        self.lock().failures.insert(op, message.to_string());
    }

    /// Makes every merge/delete of `id` fail.
    pub fn fail_on(&self, id: RecordId) {
        self.lock().failing_ids.insert(id);
    }

    /// Closes every open stream as if the connection dropped.
    pub fn disconnect_all(&self) {
        let mut inner = self.lock();
        for sub in inner.subscribers.values_mut().filter(|s| !s.closed) {
            let _ = sub.tx.send(ChangeEvent::close(CloseReason::Disconnected));
            sub.closed = true;
        }
    }

    /// Number of registered subscriptions, closed or not, that were never killed.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Demo scenario: a `devices` table and an `operators` table, user
    /// `admin` / `admin`.
    pub fn demo_devices() -> Self {
        let now = Utc::now();
        let ts = |minutes: i64| {
            (now - ChronoDuration::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Secs, true)
        };

        let devices = vec![
            json!({"id": "devices:d1", "hostname": "living-room", "mac": "3C:22:FB:10:00:01",
                "connected": true, "valid": true, "features": ["Tidal", "QQMusic"],
                "mark": "main player", "created_at": ts(60 * 24 * 40), "last_active_at": ts(1)}),
            json!({"id": "devices:d2", "hostname": "studio", "mac": "3C:22:FB:10:00:02",
                "connected": false, "valid": true, "features": ["USB"],
                "mark": "", "created_at": ts(60 * 24 * 12), "last_active_at": ts(45)}),
            json!({"id": "devices:d3", "hostname": "kitchen", "mac": "3C:22:FB:10:00:03",
                "connected": false, "valid": false, "features": [],
                "created_at": ts(60 * 24 * 3), "last_active_at": ts(60 * 30)}),
            json!({"id": "devices:d4", "hostname": "bedroom", "mac": "3C:22:FB:10:00:04",
                "connected": false, "valid": true, "features": ["QQMusic", "Tidal", "USB"],
                "mark": "loaner", "created_at": ts(60 * 5), "last_active_at": ts(3)}),
        ];
        let operators = vec![
            json!({"id": "operators:admin", "name": "Administrator", "role": "owner"}),
            json!({"id": "operators:ops", "name": "On-call", "role": "editor"}),
        ];

        let decode = |table: &str, values: Vec<Value>| -> Vec<Row> {
            values
                .into_iter()
                .filter_map(|v| Row::from_json(table, v))
                .collect()
        };

        Self::new()
            .with_user("admin", "admin")
            .with_table("devices", decode("devices", devices))
            .with_table("operators", decode("operators", operators))
    }
}

impl Store for MemoryStore {
    fn signin(&self, credentials: &Credentials) -> Result<SessionToken, StoreError> {
        let mut inner = self.lock();
        inner.take_failure(Op::Signin)?;
        match inner.users.get(&credentials.username) {
            Some(password) if *password == credentials.password => {
                inner.next_token += 1;
                let token = format!("mem.{}.{}", inner.next_token, credentials.username);
                inner.tokens.insert(token.clone());
                Ok(SessionToken(token))
            }
            _ => Err(StoreError::Auth("invalid username or password".to_string())),
        }
    }

    fn authenticate(&self, token: &SessionToken) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.take_failure(Op::Authenticate)?;
        if inner.tokens.contains(token.as_str()) {
            Ok(())
        } else {
            Err(StoreError::Auth("unknown session token".to_string()))
        }
    }

    fn tables(&self) -> Result<Vec<String>, StoreError> {
        let mut inner = self.lock();
        inner.take_failure(Op::Tables)?;
        Ok(inner.tables.keys().cloned().collect())
    }

    fn select(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let mut inner = self.lock();
        inner.take_failure(Op::Select)?;
        inner
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("table {}", table)))
    }

    fn live(&self, table: &str) -> Result<LiveStream, StoreError> {
        let mut inner = self.lock();
        inner.take_failure(Op::Live)?;
        if !inner.tables.contains_key(table) {
            return Err(StoreError::NotFound(format!("table {}", table)));
        }
        inner.next_handle += 1;
        let handle = inner.next_handle;
        let (tx, rx) = mpsc::channel();
        inner.subscribers.insert(
            handle,
            Subscriber {
                table: table.to_string(),
                tx,
                closed: false,
            },
        );
        debug!(handle, table, "live subscription opened");
        Ok(LiveStream {
            handle: LiveHandle(handle),
            events: rx,
        })
    }

    fn kill(&self, handle: LiveHandle) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.take_failure(Op::Kill)?;
        if let Some(sub) = inner.subscribers.remove(&handle.0) {
            if !sub.closed {
                let _ = sub.tx.send(ChangeEvent::close(CloseReason::Killed));
            }
            debug!(handle = handle.0, table = %sub.table, "live subscription killed");
        }
        Ok(())
    }

    fn merge(&self, id: &RecordId, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.take_failure(Op::Merge)?;
        if inner.failing_ids.contains(id) {
            return Err(StoreError::Query(format!("merge rejected for {}", id)));
        }
        let updated = {
            let row = inner
                .tables
                .get_mut(id.table())
                .and_then(|rows| rows.iter_mut().find(|r| &r.id == id))
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            *row = row.merged(fields);
            row.clone()
        };
        inner.notify(id.table(), ChangeEvent::update(updated));
        Ok(())
    }

    fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.take_failure(Op::Delete)?;
        if inner.failing_ids.contains(id) {
            return Err(StoreError::Query(format!("delete rejected for {}", id)));
        }
        let removed = inner.tables.get_mut(id.table()).and_then(|rows| {
            let pos = rows.iter().position(|r| &r.id == id)?;
            Some(rows.remove(pos))
        });
        // Deleting a missing record succeeds.
        if let Some(row) = removed {
            inner.notify(id.table(), ChangeEvent::delete(row));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeAction;
    use std::time::Duration;

    fn row(table: &str, key: &str) -> Row {
        Row::new(RecordId::new(table, key))
    }

    #[test]
    fn test_merge_emits_update_to_subscribers() {
        let store = MemoryStore::new().with_table("t", vec![row("t", "1")]);
        let stream = store.live("t").unwrap();

        let mut fields = Map::new();
        fields.insert("mark".to_string(), json!("hello"));
        store.merge(&RecordId::new("t", "1"), &fields).unwrap();

        let event = stream.events.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(event.action, ChangeAction::Update);
        assert_eq!(event.row.unwrap().mark.as_deref(), Some("hello"));
        assert_eq!(store.rows("t")[0].mark.as_deref(), Some("hello"));
    }

    #[test]
    fn test_events_only_reach_subscribers_of_the_table() {
        let store = MemoryStore::new()
            .with_table("a", vec![])
            .with_table("b", vec![]);
        let a = store.live("a").unwrap();
        let b = store.live("b").unwrap();

        assert!(store.insert(row("a", "1")));
        assert!(!store.insert(row("a", "1")));

        assert_eq!(a.events.try_recv().unwrap().action, ChangeAction::Create);
        assert!(a.events.try_recv().is_err());
        assert!(b.events.try_recv().is_err());
    }

    #[test]
    fn test_kill_closes_stream_and_is_idempotent() {
        let store = MemoryStore::new().with_table("t", vec![]);
        let stream = store.live("t").unwrap();
        assert_eq!(store.subscriber_count(), 1);

        store.kill(stream.handle).unwrap();
        store.kill(stream.handle).unwrap();
        assert_eq!(store.subscriber_count(), 0);

        let event = stream.events.recv().unwrap();
        assert_eq!(event.action, ChangeAction::Close(CloseReason::Killed));
        assert!(stream.events.recv().is_err());
    }

    #[test]
    fn test_disconnect_all_sends_disconnected() {
        let store = MemoryStore::new().with_table("t", vec![]);
        let stream = store.live("t").unwrap();
        store.disconnect_all();
        let event = stream.events.recv().unwrap();
        assert_eq!(event.action, ChangeAction::Close(CloseReason::Disconnected));

        assert!(store.insert(row("t", "1")));
        assert!(stream.events.try_recv().is_err());
        assert_eq!(store.subscriber_count(), 1);

        store.kill(stream.handle).unwrap();
        assert_eq!(store.subscriber_count(), 0);
        assert!(stream.events.recv().is_err());
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let store = MemoryStore::new().with_table("t", vec![]);
        store.fail_next(Op::Select, "boom");
        assert_eq!(
            store.select("t"),
            Err(StoreError::Query("boom".to_string()))
        );
        assert!(store.select("t").is_ok());
    }

    #[test]
    fn test_signin_and_authenticate() {
        let store = MemoryStore::new().with_user("admin", "secret");
        let bad = Credentials {
            username: "admin".into(),
            password: "nope".into(),
        };
        assert!(matches!(store.signin(&bad), Err(StoreError::Auth(_))));

        let good = Credentials {
            username: "admin".into(),
            password: "secret".into(),
        };
        let token = store.signin(&good).unwrap();
        assert!(store.authenticate(&token).is_ok());
        assert!(store.authenticate(&SessionToken("forged".into())).is_err());
    }

    #[test]
    fn test_demo_scenario_has_one_connected_device() {
        let store = MemoryStore::demo_devices();
        let devices = store.rows("devices");
        assert_eq!(devices.len(), 4);
        assert_eq!(devices.iter().filter(|r| r.connected).count(), 1);
        assert_eq!(store.tables().unwrap(), vec!["devices", "operators"]);
    }
}

//! Store abstraction for the remote database.
//!
//! This module defines the `Store` trait that lets the console work with
//! different database backends through one interface:
//! - `MemoryStore`: in-process tables, used by tests and `--demo`
//! - `PgStore`: PostgreSQL, with `LISTEN/NOTIFY` as the change stream
//!
//! The trait is object-safe and designed to be used as `Arc<dyn Store>`.

mod memory;
mod pg;

pub use memory::{MemoryStore, Op};
pub use pg::{PgConfig, PgStore};

use std::fmt;
use std::sync::mpsc::Receiver;

use serde_json::{Map, Value};

use crate::model::{ChangeEvent, RecordId, Row};

/// Error types returned by store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Could not reach the database.
    Connection(String),
    /// Credentials or session token rejected.
    Auth(String),
    /// Statement execution failed.
    Query(String),
    /// The referenced record or table does not exist.
    NotFound(String),
    /// A result could not be decoded.
    Decode(String),
    /// The store has been shut down.
    Closed,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Connection(msg) => write!(f, "connection error: {}", msg),
            StoreError::Auth(msg) => write!(f, "authentication failed: {}", msg),
            StoreError::Query(msg) => write!(f, "query error: {}", msg),
            StoreError::NotFound(what) => write!(f, "not found: {}", what),
            StoreError::Decode(msg) => write!(f, "decode error: {}", msg),
            StoreError::Closed => write!(f, "store is closed"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Operator credentials for [`Store::signin`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Opaque session token issued by [`Store::signin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifies one open change stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LiveHandle(pub u64);

impl fmt::Display for LiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "live#{}", self.0)
    }
}

/// An open change stream: the handle used to release it, and the events.
///
/// The stream ends with a `Close` event and the sender is dropped after it.
pub struct LiveStream {
    pub handle: LiveHandle,
    pub events: Receiver<ChangeEvent>,
}

/// Contract of the database client used by the console.
pub trait Store: Send + Sync {
    /// Establishes a session with operator credentials.
    fn signin(&self, credentials: &Credentials) -> Result<SessionToken, StoreError>;

    /// Restores a session from a previously issued token.
    fn authenticate(&self, token: &SessionToken) -> Result<(), StoreError>;

    /// Lists the tables the operator can browse.
    fn tables(&self) -> Result<Vec<String>, StoreError>;

    /// Bulk fetch of every row in `table`.
    fn select(&self, table: &str) -> Result<Vec<Row>, StoreError>;

    /// Opens a push subscription on `table`.
    fn live(&self, table: &str) -> Result<LiveStream, StoreError>;

    /// Releases a subscription.
    ///
    /// Must succeed for handles that are unknown or whose connection already
    /// dropped.
    fn kill(&self, handle: LiveHandle) -> Result<(), StoreError>;

    /// Partial update: sets `fields` on the record, leaving other fields alone.
    fn merge(&self, id: &RecordId, fields: &Map<String, Value>) -> Result<(), StoreError>;

    /// Deletes the record.
    fn delete(&self, id: &RecordId) -> Result<(), StoreError>;
}

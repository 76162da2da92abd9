//! Change events pushed by a store's live subscription.

use std::fmt;

use super::Row;

/// Why a change stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The subscription was released on purpose.
    Killed,
    /// The connection carrying the stream dropped.
    Disconnected,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Killed => write!(f, "killed"),
            CloseReason::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Kind of change carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
    Close(CloseReason),
}

impl ChangeAction {
    /// Parses the action names used on the wire (`CREATE`, `INSERT`, ...).
    pub fn parse(s: &str) -> Option<ChangeAction> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" | "INSERT" => Some(ChangeAction::Create),
            "UPDATE" => Some(ChangeAction::Update),
            "DELETE" => Some(ChangeAction::Delete),
            _ => None,
        }
    }
}

/// One notification from a live subscription.
///
/// `row` is `None` for `Close`, and for row events whose payload could not be
/// decoded into a [`Row`] (for example because it had no identifier). Such
/// events are dropped when applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub action: ChangeAction,
    pub row: Option<Row>,
}

impl ChangeEvent {
    pub fn create(row: Row) -> Self {
        Self {
            action: ChangeAction::Create,
            row: Some(row),
        }
    }

    pub fn update(row: Row) -> Self {
        Self {
            action: ChangeAction::Update,
            row: Some(row),
        }
    }

    pub fn delete(row: Row) -> Self {
        Self {
            action: ChangeAction::Delete,
            row: Some(row),
        }
    }

    pub fn close(reason: CloseReason) -> Self {
        Self {
            action: ChangeAction::Close(reason),
            row: None,
        }
    }
}

//! Keeps a local copy of the selected table in step with the store.
//!
//! - `Snapshot`: the ordered rows and the event fold
//! - `LiveView`: selection lifecycle, worker thread, channel pump
//! - `connection`: the "at most one connected device" toggle

pub mod connection;
mod live_view;
mod snapshot;

pub use connection::{LinkState, ToggleError, ToggleOutcome, TogglePlan, toggle_connection};
pub use live_view::{LiveView, ViewStatus};
pub use snapshot::Snapshot;

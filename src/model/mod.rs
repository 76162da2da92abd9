//! Data model shared by stores, the synchronizer and the TUI.

mod event;
mod record;
mod row;

pub use event::{ChangeAction, ChangeEvent, CloseReason};
pub use record::{ParseRecordIdError, RecordId};
pub use row::{Row, RowPatch};

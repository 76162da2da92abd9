//! Application state management.

mod app_state;
mod forms;
mod tables;

pub use app_state::{AppState, Toast, ToastKind};
pub use forms::{EditField, EditForm, LoginField, LoginForm};
pub use tables::{RowsState, TablesState};

use crate::model::RecordId;

/// Top-level screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    /// Checking a saved session on startup.
    #[default]
    Connecting,
    Login,
    Console,
}

/// Which console pane receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    Tables,
    #[default]
    Rows,
}

impl Focus {
    pub fn toggle(self) -> Focus {
        match self {
            Focus::Tables => Focus::Rows,
            Focus::Rows => Focus::Tables,
        }
    }
}

/// Input mode for the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Filter,
}

/// Active popup state. Only one popup can be open at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PopupState {
    #[default]
    None,
    Help {
        scroll: usize,
    },
    Edit(EditForm),
    ConfirmDelete(RecordId),
    ConfirmBatchDelete(Vec<RecordId>),
    QuitConfirm,
}

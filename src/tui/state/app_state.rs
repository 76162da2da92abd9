//! Main application state.

use std::time::{Duration, Instant};

use super::{Focus, InputMode, LoginForm, PopupState, RowsState, Screen, TablesState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Error,
}

/// Transient status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub text: String,
    pub kind: ToastKind,
    pub expires_at: Instant,
}

/// Main application state.
#[derive(Debug)]
pub struct AppState {
    pub screen: Screen,
    pub focus: Focus,
    pub input_mode: InputMode,
    /// Filter input buffer.
    pub filter_input: String,
    pub login: LoginForm,
    pub tables: TablesState,
    pub rows: RowsState,
    /// Active popup state. Only one popup can be open at a time.
    pub popup: PopupState,
    pub toast: Option<Toast>,
    pub toast_ttl: Duration,
    /// Options of the `features` field in the edit popup.
    pub feature_options: Vec<String>,
    /// Signed-in operator, when known.
    pub user: Option<String>,
    /// Page size for PgUp/PgDn, updated by the renderer.
    pub page_size: usize,
}

impl AppState {
    pub fn new(feature_options: Vec<String>, toast_ttl: Duration) -> Self {
        Self {
            screen: Screen::Connecting,
            focus: Focus::Rows,
            input_mode: InputMode::Normal,
            filter_input: String::new(),
            login: LoginForm::default(),
            tables: TablesState::default(),
            rows: RowsState::default(),
            popup: PopupState::None,
            toast: None,
            toast_ttl,
            feature_options,
            user: None,
            page_size: 10,
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.show_toast(text.into(), ToastKind::Info);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.show_toast(text.into(), ToastKind::Error);
    }

    fn show_toast(&mut self, text: String, kind: ToastKind) {
        self.toast = Some(Toast {
            text,
            kind,
            expires_at: Instant::now() + self.toast_ttl,
        });
    }

    /// Drops the toast once it has expired.
    pub fn expire_toast(&mut self, now: Instant) {
        if self.toast.as_ref().is_some_and(|t| t.expires_at <= now) {
            self.toast = None;
        }
    }

    /// Clears per-table UI state when another table is selected.
    pub fn reset_rows(&mut self) {
        self.rows.reset();
        self.input_mode = InputMode::Normal;
        self.filter_input.clear();
    }

    /// Back to the login screen, forgetting everything console-related.
    pub fn reset_to_login(&mut self) {
        self.screen = Screen::Login;
        self.focus = Focus::Rows;
        self.popup = PopupState::None;
        self.tables = TablesState::default();
        self.reset_rows();
        self.user = None;
        self.login = LoginForm {
            username: std::mem::take(&mut self.login.username),
            ..LoginForm::default()
        };
    }
}

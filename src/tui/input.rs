//! Input handling and keybindings.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::navigable::NavigableTable;
use super::state::{AppState, EditForm, Focus, InputMode, PopupState, Screen};
use crate::model::{RecordId, RowPatch};

/// Result of handling a key event. Anything beyond UI state is carried out
/// by the app.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    /// No action, continue.
    None,
    Quit,
    /// Submit the login form.
    Login,
    Logout,
    /// Show the rows of a table.
    SelectTable(String),
    /// Re-fetch the current table.
    Refresh,
    /// Open the edit popup for a row.
    OpenEdit(RecordId),
    SaveEdit(RecordId, RowPatch),
    Delete(RecordId),
    DeleteBatch(Vec<RecordId>),
    ToggleConnection(RecordId),
}

/// Navigation action for unified scroll/selection dispatch.
enum NavAction {
    Up,
    Down,
    PageUp(usize),
    PageDown(usize),
    Home,
    End,
}

/// Dispatches a navigation action to the help scroll or the focused pane.
fn dispatch_navigation(state: &mut AppState, action: NavAction) {
    if let PopupState::Help { scroll } = &mut state.popup {
        match action {
            NavAction::Up => *scroll = scroll.saturating_sub(1),
            NavAction::Down => *scroll = scroll.saturating_add(1),
            NavAction::PageUp(n) => *scroll = scroll.saturating_sub(n),
            NavAction::PageDown(n) => *scroll = scroll.saturating_add(n),
            NavAction::Home => *scroll = 0,
            NavAction::End => {}
        }
        return;
    }

    let nav: &mut dyn NavigableTable = match state.focus {
        Focus::Tables => &mut state.tables,
        Focus::Rows => &mut state.rows,
    };
    match action {
        NavAction::Up => nav.select_up(),
        NavAction::Down => nav.select_down(),
        NavAction::PageUp(n) => nav.page_up(n),
        NavAction::PageDown(n) => nav.page_down(n),
        NavAction::Home => nav.home(),
        NavAction::End => nav.end(),
    }
}

fn navigation(state: &AppState, key: &KeyEvent) -> Option<NavAction> {
    let page = state.page_size.max(1);
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(NavAction::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(NavAction::Down),
        KeyCode::PageUp => Some(NavAction::PageUp(page)),
        KeyCode::PageDown => Some(NavAction::PageDown(page)),
        KeyCode::Home => Some(NavAction::Home),
        KeyCode::End => Some(NavAction::End),
        _ => None,
    }
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Handles key input and updates state.
pub fn handle_key(state: &mut AppState, key: KeyEvent) -> KeyAction {
    if key.kind == KeyEventKind::Release {
        return KeyAction::None;
    }
    if is_ctrl_c(&key) {
        return KeyAction::Quit;
    }
    match state.screen {
        Screen::Connecting => KeyAction::None,
        Screen::Login => handle_login(state, key),
        Screen::Console => match state.popup {
            PopupState::QuitConfirm => handle_quit_confirm(state, key),
            PopupState::Help { .. } => handle_help(state, key),
            PopupState::Edit(_) => handle_edit(state, key),
            PopupState::ConfirmDelete(_) | PopupState::ConfirmBatchDelete(_) => {
                handle_confirm(state, key)
            }
            PopupState::None => match state.input_mode {
                InputMode::Normal => handle_normal_mode(state, key),
                InputMode::Filter => handle_filter_mode(state, key),
            },
        },
    }
}

fn handle_login(state: &mut AppState, key: KeyEvent) -> KeyAction {
    let form = &mut state.login;
    match key.code {
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            form.next_field();
            KeyAction::None
        }
        KeyCode::Enter => {
            if form.is_complete() {
                KeyAction::Login
            } else {
                form.error = Some("Username and password are required".to_string());
                KeyAction::None
            }
        }
        KeyCode::Backspace => {
            form.backspace();
            KeyAction::None
        }
        KeyCode::Esc => {
            form.error = None;
            KeyAction::None
        }
        KeyCode::Char(c) => {
            form.input(c);
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn handle_quit_confirm(state: &mut AppState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Char('y') => {
            state.popup = PopupState::None;
            KeyAction::Quit
        }
        KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
            state.popup = PopupState::None;
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn handle_help(state: &mut AppState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => {
            state.popup = PopupState::None;
        }
        _ => {
            if let Some(nav) = navigation(state, &key) {
                dispatch_navigation(state, nav);
            }
        }
    }
    KeyAction::None
}

fn handle_confirm(state: &mut AppState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
            match std::mem::take(&mut state.popup) {
                PopupState::ConfirmDelete(id) => KeyAction::Delete(id),
                PopupState::ConfirmBatchDelete(ids) => KeyAction::DeleteBatch(ids),
                _ => KeyAction::None,
            }
        }
        KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
            state.popup = PopupState::None;
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn handle_edit(state: &mut AppState, key: KeyEvent) -> KeyAction {
    let PopupState::Edit(form) = &mut state.popup else {
        return KeyAction::None;
    };
    match key.code {
        KeyCode::Esc => {
            state.popup = PopupState::None;
            KeyAction::None
        }
        KeyCode::Enter => {
            let EditForm { id, patch, .. } = form.clone();
            state.popup = PopupState::None;
            KeyAction::SaveEdit(id, patch)
        }
        KeyCode::Tab | KeyCode::Down => {
            form.next_field();
            KeyAction::None
        }
        KeyCode::BackTab | KeyCode::Up => {
            form.prev_field();
            KeyAction::None
        }
        KeyCode::Left => {
            form.cursor_left();
            KeyAction::None
        }
        KeyCode::Right => {
            form.cursor_right();
            KeyAction::None
        }
        KeyCode::Char(' ') => {
            form.toggle();
            KeyAction::None
        }
        KeyCode::Backspace => {
            form.backspace();
            KeyAction::None
        }
        KeyCode::Char(c) => {
            form.input(c);
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

/// Handles keys in normal mode.
fn handle_normal_mode(state: &mut AppState, key: KeyEvent) -> KeyAction {
    if let Some(nav) = navigation(state, &key) {
        dispatch_navigation(state, nav);
        return KeyAction::None;
    }

    let selected = state.rows.selected_id().cloned();
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => {
            state.popup = PopupState::QuitConfirm;
            KeyAction::None
        }
        KeyCode::Char('?') => {
            state.popup = PopupState::Help { scroll: 0 };
            KeyAction::None
        }
        KeyCode::Tab | KeyCode::BackTab => {
            state.focus = state.focus.toggle();
            KeyAction::None
        }
        KeyCode::Enter if state.focus == Focus::Tables => match state.tables.highlighted() {
            Some(name) => {
                let name = name.to_string();
                state.focus = Focus::Rows;
                KeyAction::SelectTable(name)
            }
            None => KeyAction::None,
        },
        KeyCode::Char('/') => {
            state.input_mode = InputMode::Filter;
            state.filter_input = state.rows.filter.clone().unwrap_or_default();
            KeyAction::None
        }
        KeyCode::Char(' ') => {
            state.rows.toggle_mark();
            KeyAction::None
        }
        KeyCode::Char('a') => {
            state.rows.toggle_mark_all();
            KeyAction::None
        }
        KeyCode::Char('e') | KeyCode::Enter => selected.map_or(KeyAction::None, KeyAction::OpenEdit),
        KeyCode::Char('d') => {
            if let Some(id) = selected {
                state.popup = PopupState::ConfirmDelete(id);
            }
            KeyAction::None
        }
        KeyCode::Char('D') => {
            let ids = state.rows.marked_ids();
            if ids.is_empty() {
                state.info("No rows marked (Space marks a row)");
            } else {
                state.popup = PopupState::ConfirmBatchDelete(ids);
            }
            KeyAction::None
        }
        KeyCode::Char('c') => selected.map_or(KeyAction::None, KeyAction::ToggleConnection),
        KeyCode::Char('r') => KeyAction::Refresh,
        KeyCode::Char('L') => KeyAction::Logout,
        _ => KeyAction::None,
    }
}

/// Handles keys while typing a filter. The filter applies as it is typed.
fn handle_filter_mode(state: &mut AppState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Enter => {
            state.input_mode = InputMode::Normal;
        }
        KeyCode::Esc => {
            state.input_mode = InputMode::Normal;
            state.filter_input.clear();
            state.rows.filter = None;
        }
        KeyCode::Backspace => {
            state.filter_input.pop();
            apply_filter(state);
        }
        KeyCode::Char(c) => {
            state.filter_input.push(c);
            apply_filter(state);
        }
        _ => {}
    }
    KeyAction::None
}

fn apply_filter(state: &mut AppState) {
    state.rows.filter = if state.filter_input.is_empty() {
        None
    } else {
        Some(state.filter_input.clone())
    };
}

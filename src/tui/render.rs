//! Main rendering logic for TUI.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};

use crate::model::RecordId;
use crate::sync::LiveView;

use super::state::{AppState, PopupState, Screen};
use super::widgets::{
    render_confirm_delete, render_connecting, render_edit, render_footer, render_header,
    render_help, render_login, render_quit_confirm, render_rows, render_tables,
};

/// Width of the table list pane.
const TABLES_WIDTH: u16 = 24;

fn row_label(view: &LiveView, id: &RecordId) -> String {
    match view.snapshot().get(id).and_then(|r| r.hostname.as_deref()) {
        Some(host) => format!("{} ({})", host, id),
        None => id.to_string(),
    }
}

/// Main render function.
pub fn render(frame: &mut Frame, state: &mut AppState, view: &LiveView) {
    let area = frame.area();

    match state.screen {
        Screen::Connecting => {
            render_connecting(frame, area);
            return;
        }
        Screen::Login => {
            render_login(frame, area, &state.login);
            return;
        }
        Screen::Console => {}
    }

    // Main layout: header, panes, footer
    let chunks = Layout::vertical([
        Constraint::Length(1), // Header
        Constraint::Min(5),    // Panes
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, chunks[0], state, view);

    let panes =
        Layout::horizontal([Constraint::Length(TABLES_WIDTH), Constraint::Min(20)]).split(chunks[1]);
    render_tables(frame, panes[0], state);
    render_rows(frame, panes[1], state, view);

    render_footer(frame, chunks[2], state);

    // Popups are rendered last to overlay everything.
    match &mut state.popup {
        PopupState::None => {}
        PopupState::Help { scroll } => render_help(frame, area, scroll),
        PopupState::Edit(form) => render_edit(frame, area, form),
        PopupState::ConfirmDelete(id) => {
            render_confirm_delete(frame, area, &[row_label(view, id)]);
        }
        PopupState::ConfirmBatchDelete(ids) => {
            let labels: Vec<String> = ids.iter().map(|id| row_label(view, id)).collect();
            render_confirm_delete(frame, area, &labels);
        }
        PopupState::QuitConfirm => render_quit_confirm(frame, area),
    }
}

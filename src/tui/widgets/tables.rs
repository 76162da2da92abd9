//! Table list (left pane).

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem};

use crate::tui::state::{AppState, Focus};
use crate::tui::style::Styles;

pub fn render_tables(frame: &mut Frame, area: Rect, state: &mut AppState) {
    state.tables.resolve_selection();

    let active = state.tables.active.as_deref();
    let items: Vec<ListItem> = state
        .tables
        .items
        .iter()
        .map(|name| {
            let is_active = Some(name.as_str()) == active;
            let marker = if is_active { "▸ " } else { "  " };
            let style = if is_active {
                Styles::help_key()
            } else {
                Styles::default()
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Styles::dim()),
                Span::styled(name.clone(), style),
            ]))
        })
        .collect();

    let border = if state.focus == Focus::Tables {
        Styles::focused_border()
    } else {
        Styles::unfocused_border()
    };
    let list = List::new(items)
        .block(
            Block::default()
                .title(" Tables ")
                .borders(Borders::ALL)
                .border_style(border),
        )
        .highlight_style(Styles::selected());

    frame.render_stateful_widget(list, area, &mut state.tables.list_state);
}

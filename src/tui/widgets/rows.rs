//! Rows table (right pane).
//! Thin TUI wrapper over [`crate::view::rows::build_rows_view`].

use chrono::Utc;
use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap};

use crate::model::RecordId;
use crate::sync::{LiveView, ViewStatus};
use crate::tui::state::{AppState, Focus};
use crate::tui::style::Styles;
use crate::view::rows::build_rows_view;

pub fn render_rows(frame: &mut Frame, area: Rect, state: &mut AppState, view: &LiveView) {
    let border = if state.focus == Focus::Rows {
        Styles::focused_border()
    } else {
        Styles::unfocused_border()
    };
    // Borders and the header row.
    state.page_size = area.height.saturating_sub(3).max(1) as usize;

    let Some(table_name) = view.table() else {
        let block = Block::default()
            .title(" Rows ")
            .borders(Borders::ALL)
            .border_style(border);
        frame.render_widget(
            Paragraph::new("Select a table (Tab, then Enter)")
                .style(Styles::dim())
                .block(block),
            area,
        );
        state.rows.resolve_selection(&[]);
        return;
    };

    let snapshot = view.snapshot();
    if snapshot.is_empty() {
        let message = match view.status() {
            ViewStatus::Loading => "Loading…".to_string(),
            ViewStatus::FetchFailed(e) => format!("Could not load {}: {}", table_name, e),
            _ => "No rows".to_string(),
        };
        let block = Block::default()
            .title(format!(" {} ", table_name))
            .borders(Borders::ALL)
            .border_style(border);
        frame.render_widget(
            Paragraph::new(message)
                .wrap(Wrap { trim: true })
                .style(Styles::dim())
                .block(block),
            area,
        );
        state.rows.resolve_selection(&[]);
        return;
    }

    let vm = build_rows_view(
        table_name,
        snapshot.rows(),
        state.rows.filter.as_deref(),
        &state.rows.marked,
        Utc::now(),
    );

    // Resolve selection
    let row_ids: Vec<RecordId> = vm.rows.iter().map(|r| r.id.clone()).collect();
    state.rows.resolve_selection(&row_ids);

    let header = Row::new(
        vm.headers
            .iter()
            .map(|h| Span::styled(h.clone(), Styles::table_header())),
    )
    .style(Styles::table_header())
    .height(1);

    let rows: Vec<Row> = vm
        .rows
        .iter()
        .enumerate()
        .map(|(idx, vr)| {
            let base_style = if idx == state.rows.selected {
                Styles::selected()
            } else {
                Styles::from_class(vr.style)
            };
            let cells = vr.cells.iter().map(|c| match c.style {
                Some(s) => Span::styled(c.text.clone(), Styles::from_class(s)),
                None => Span::raw(c.text.clone()),
            });
            Row::new(cells).style(base_style).height(1)
        })
        .collect();

    let mut constraints: Vec<Constraint> = vm.widths.iter().map(|&w| Constraint::Length(w)).collect();
    constraints.push(Constraint::Fill(1));

    let table = Table::new(rows, constraints)
        .header(header)
        .block(
            Block::default()
                .title(vm.title)
                .borders(Borders::ALL)
                .border_style(border)
                .style(Styles::default()),
        )
        .column_spacing(1)
        .row_highlight_style(Styles::selected());

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(table, area, &mut state.rows.ratatui_state);
}

//! Header widget showing the clock, the operator and the view status.

use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::sync::{LiveView, ViewStatus};
use crate::tui::state::AppState;
use crate::tui::style::Styles;

fn status_style(status: &ViewStatus) -> Style {
    match status {
        ViewStatus::Idle => Styles::header(),
        ViewStatus::Live => Styles::live(),
        ViewStatus::Loading | ViewStatus::Stale(_) => Styles::pending(),
        ViewStatus::FetchFailed(_) | ViewStatus::SubscribeFailed(_) => Styles::failed(),
    }
}

/// Renders the header bar.
pub fn render_header(frame: &mut Frame, area: Rect, state: &AppState, view: &LiveView) {
    let chunks = Layout::horizontal([
        Constraint::Length(21), // Time
        Constraint::Min(20),    // Operator / table
        Constraint::Length(48), // Status
    ])
    .split(area);

    let time = Local::now().format(" %Y-%m-%d %H:%M:%S").to_string();
    frame.render_widget(Paragraph::new(time).style(Styles::header()), chunks[0]);

    let mut spans = vec![Span::styled(" rowdeck ", Styles::header())];
    let user = state.user.as_deref().unwrap_or("session");
    spans.push(Span::styled(format!("{} ", user), Styles::header()));
    if let Some(table) = view.table() {
        spans.push(Span::styled(format!("@ {} ", table), Styles::header()));
        spans.push(Span::styled(
            format!("({} rows) ", view.snapshot().len()),
            Styles::header(),
        ));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Styles::header()),
        chunks[1],
    );

    let status = view.status();
    let text = format!(" {} ", status.to_string().to_uppercase());
    frame.render_widget(
        Paragraph::new(text)
            .style(status_style(status))
            .alignment(ratatui::layout::Alignment::Right),
        chunks[2],
    );
}

//! Bottom line: filter input, toast, or key hints.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::state::{AppState, InputMode};
use crate::tui::style::Styles;

const HINTS: &[(&str, &str)] = &[
    ("?", "help"),
    ("/", "filter"),
    ("e", "edit"),
    ("c", "connect"),
    ("d", "delete"),
    ("Space", "mark"),
    ("q", "quit"),
];

pub fn render_footer(frame: &mut Frame, area: Rect, state: &AppState) {
    let line = if state.input_mode == InputMode::Filter {
        Line::from(vec![
            Span::styled(" Filter: ", Styles::help_key()),
            Span::styled(format!("{}▏", state.filter_input), Styles::filter_input()),
        ])
    } else if let Some(toast) = &state.toast {
        Line::from(Span::styled(format!(" {}", toast.text), Styles::toast(toast.kind)))
    } else {
        let mut spans = Vec::with_capacity(HINTS.len() * 2);
        for (key, what) in HINTS {
            spans.push(Span::styled(format!(" {}", key), Styles::help_key()));
            spans.push(Span::styled(format!(" {} ", what), Styles::help()));
        }
        if !state.rows.marked.is_empty() {
            spans.push(Span::styled(
                format!(" {} marked", state.rows.marked.len()),
                Styles::section_header(),
            ));
        }
        Line::from(spans)
    };
    frame.render_widget(Paragraph::new(line), area);
}

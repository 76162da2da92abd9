//! Edit popup for the editable fields of a row.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use super::centered;
use crate::fmt::format_bool;
use crate::tui::state::{EditField, EditForm};
use crate::tui::style::Styles;
use crate::view::common::RowStyleClass;

fn label(text: &'static str, focused: bool) -> Span<'static> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Styles::dim()
    };
    Span::styled(format!("{:>10} ", text), style)
}

pub fn render_edit(frame: &mut Frame, area: Rect, form: &EditForm) {
    let popup_width = (area.width * 60 / 100).clamp(50, 80);
    let popup_area = centered(area, popup_width, 10);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(format!(" Edit {} ", form.title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let chunks = Layout::vertical([
        Constraint::Length(1), // Spacer
        Constraint::Length(1), // valid
        Constraint::Length(1), // features
        Constraint::Length(1), // mark
        Constraint::Min(1),    // Spacer
        Constraint::Length(1), // Footer
    ])
    .split(inner);

    let valid_style = if form.patch.valid {
        Styles::from_class(RowStyleClass::Good)
    } else {
        Styles::from_class(RowStyleClass::Bad)
    };
    let valid = Line::from(vec![
        label("valid", form.field == EditField::Valid),
        Span::styled(format_bool(form.patch.valid), valid_style),
    ]);
    frame.render_widget(Paragraph::new(valid), chunks[1]);

    let on_features = form.field == EditField::Features;
    let mut features = vec![label("features", on_features)];
    for (i, option) in form.options.iter().enumerate() {
        let check = if form.has_feature(option) { "[x]" } else { "[ ]" };
        let mut style = Styles::default();
        if on_features && i == form.feature_cursor {
            style = Styles::selected();
        }
        features.push(Span::styled(format!("{} {}", check, option), style));
        features.push(Span::raw("  "));
    }
    frame.render_widget(Paragraph::new(Line::from(features)), chunks[2]);

    let on_mark = form.field == EditField::Mark;
    let mark = Line::from(vec![
        label("mark", on_mark),
        Span::styled(
            format!("{}{}", form.patch.mark, if on_mark { "▏" } else { "" }),
            Styles::filter_input(),
        ),
    ]);
    frame.render_widget(Paragraph::new(mark), chunks[3]);

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let footer = Line::from(vec![
        key("Tab"),
        Span::styled(" field  ", Styles::dim()),
        key("Space"),
        Span::styled(" toggle  ", Styles::dim()),
        key("←→"),
        Span::styled(" feature  ", Styles::dim()),
        key("Enter"),
        Span::styled(" save  ", Styles::dim()),
        key("Esc"),
        Span::styled(" cancel", Styles::dim()),
    ]);
    frame.render_widget(Paragraph::new(footer), chunks[5]);
}

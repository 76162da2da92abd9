//! Confirmation popups: quit and delete.

use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use super::centered;

fn key_hint(keys: [&'static str; 2], what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(keys[0], Style::default().fg(Color::Yellow)),
        Span::styled(" or ", Style::default().fg(Color::DarkGray)),
        Span::styled(keys[1], Style::default().fg(Color::Yellow)),
        Span::styled(what, Style::default().fg(Color::DarkGray)),
    ])
}

fn render_dialog(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    border: Color,
    content: Vec<Line<'static>>,
) {
    // 50% width, fixed height, clamped.
    let popup_width = (area.width * 50 / 100).clamp(40, 60);
    let popup_height = (content.len() as u16 + 2).clamp(7, 12);
    let popup_area = centered(area, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let paragraph = Paragraph::new(content)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, inner);
}

/// Renders a centered quit confirmation popup.
pub fn render_quit_confirm(frame: &mut Frame, area: Rect) {
    let content = vec![
        Line::from("Are you sure you want to quit?"),
        Line::from(""),
        key_hint(["Enter", "q"], " → quit"),
        key_hint(["Esc", "n"], " → cancel"),
    ];
    render_dialog(frame, area, "Exit rowdeck", Color::Cyan, content);
}

/// Asks before deleting `labels`. Long lists are cut after a few names.
pub fn render_confirm_delete(frame: &mut Frame, area: Rect, labels: &[String]) {
    const SHOWN: usize = 5;

    let question = match labels.len() {
        1 => "Delete this row?".to_string(),
        n => format!("Delete {} rows?", n),
    };
    let mut content = vec![Line::from(question), Line::from("")];
    for label in labels.iter().take(SHOWN) {
        content.push(Line::from(Span::styled(
            label.clone(),
            Style::default().fg(Color::White),
        )));
    }
    if labels.len() > SHOWN {
        content.push(Line::from(Span::styled(
            format!("… and {} more", labels.len() - SHOWN),
            Style::default().fg(Color::DarkGray),
        )));
    }
    content.push(Line::from(""));
    content.push(key_hint(["Enter", "y"], " → delete"));
    content.push(key_hint(["Esc", "n"], " → cancel"));

    render_dialog(frame, area, "Delete", Color::Red, content);
}

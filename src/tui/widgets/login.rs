//! Login and connecting screens.

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use super::centered;
use crate::tui::state::{LoginField, LoginForm};
use crate::tui::style::Styles;

pub fn render_connecting(frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 40, 5);
    frame.render_widget(Clear, popup_area);
    let block = Block::default()
        .title(" rowdeck ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let paragraph = Paragraph::new(vec![Line::from(""), Line::from("Checking saved session…")])
        .alignment(Alignment::Center)
        .block(block);
    frame.render_widget(paragraph, popup_area);
}

fn field_line<'a>(label: &'a str, value: String, focused: bool) -> Line<'a> {
    let label_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Styles::dim()
    };
    let cursor = if focused { "▏" } else { "" };
    Line::from(vec![
        Span::styled(format!("{:>10} ", label), label_style),
        Span::styled(format!("{}{}", value, cursor), Styles::filter_input()),
    ])
}

pub fn render_login(frame: &mut Frame, area: Rect, form: &LoginForm) {
    let popup_width = (area.width * 50 / 100).clamp(44, 60);
    let popup_area = centered(area, popup_width, 11);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(" Sign in ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let chunks = Layout::vertical([
        Constraint::Length(1), // Spacer
        Constraint::Length(1), // Username
        Constraint::Length(1), // Password
        Constraint::Length(1), // Spacer
        Constraint::Min(2),    // Error
        Constraint::Length(1), // Footer
    ])
    .split(inner);

    let masked = "•".repeat(form.password.chars().count());
    frame.render_widget(
        Paragraph::new(field_line(
            "username",
            form.username.clone(),
            form.field == LoginField::Username,
        )),
        chunks[1],
    );
    frame.render_widget(
        Paragraph::new(field_line(
            "password",
            masked,
            form.field == LoginField::Password,
        )),
        chunks[2],
    );

    if let Some(error) = &form.error {
        frame.render_widget(
            Paragraph::new(error.as_str())
                .style(Styles::error())
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            chunks[4],
        );
    }

    let footer = Line::from(vec![
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::styled(" switch field  ", Styles::dim()),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::styled(" sign in  ", Styles::dim()),
        Span::styled("Ctrl-C", Style::default().fg(Color::Yellow)),
        Span::styled(" quit", Styles::dim()),
    ]);
    frame.render_widget(
        Paragraph::new(footer).alignment(Alignment::Center),
        chunks[5],
    );
}

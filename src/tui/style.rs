//! Color scheme and styles.

use ratatui::style::{Color, Modifier, Style};

use crate::tui::state::ToastKind;
use crate::view::common::RowStyleClass;

/// Console color palette.
pub struct Theme;

impl Theme {
    // Background colors
    pub const BG: Color = Color::Reset;
    pub const HEADER_BG: Color = Color::Blue;
    pub const SELECTED_BG: Color = Color::DarkGray;

    // Foreground colors
    pub const FG: Color = Color::White;
    pub const FG_DIM: Color = Color::DarkGray;
    pub const HEADER_FG: Color = Color::White;

    // State colors
    pub const GOOD: Color = Color::Green;
    pub const WARN: Color = Color::Yellow;
    pub const BAD: Color = Color::Red;

    pub const ACCENT: Color = Color::Cyan;
}

/// Pre-defined styles.
pub struct Styles;

impl Styles {
    /// Default text style.
    pub fn default() -> Style {
        Style::default().fg(Theme::FG).bg(Theme::BG)
    }

    /// Header bar style.
    pub fn header() -> Style {
        Style::default()
            .fg(Theme::HEADER_FG)
            .bg(Theme::HEADER_BG)
            .add_modifier(Modifier::BOLD)
    }

    /// Selected row style.
    pub fn selected() -> Style {
        Style::default()
            .bg(Theme::SELECTED_BG)
            .add_modifier(Modifier::BOLD)
    }

    /// Table header style.
    pub fn table_header() -> Style {
        Style::default()
            .fg(Theme::HEADER_FG)
            .bg(Theme::HEADER_BG)
            .add_modifier(Modifier::BOLD)
    }

    /// Border of the focused pane.
    pub fn focused_border() -> Style {
        Style::default().fg(Theme::ACCENT)
    }

    pub fn unfocused_border() -> Style {
        Style::default().fg(Theme::FG_DIM)
    }

    /// Dimmed text style.
    pub fn dim() -> Style {
        Style::default().fg(Theme::FG_DIM)
    }

    /// Live status marker in the header.
    pub fn live() -> Style {
        Style::default()
            .fg(Theme::GOOD)
            .bg(Theme::HEADER_BG)
            .add_modifier(Modifier::BOLD)
    }

    /// Loading or stale marker in the header.
    pub fn pending() -> Style {
        Style::default()
            .fg(Theme::WARN)
            .bg(Theme::HEADER_BG)
            .add_modifier(Modifier::BOLD)
    }

    pub fn failed() -> Style {
        Style::default()
            .fg(Theme::BAD)
            .bg(Theme::HEADER_BG)
            .add_modifier(Modifier::BOLD)
    }

    /// Filter and text input style.
    pub fn filter_input() -> Style {
        Style::default()
            .fg(Theme::FG)
            .add_modifier(Modifier::UNDERLINED)
    }

    /// Section header style for popups.
    pub fn section_header() -> Style {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    }

    /// Help text style.
    pub fn help() -> Style {
        Style::default().fg(Theme::FG_DIM)
    }

    /// Help key style (highlighted keys in help line).
    pub fn help_key() -> Style {
        Style::default().fg(Theme::FG).add_modifier(Modifier::BOLD)
    }

    pub fn error() -> Style {
        Style::default().fg(Theme::BAD).add_modifier(Modifier::BOLD)
    }

    pub fn toast(kind: ToastKind) -> Style {
        match kind {
            ToastKind::Info => Style::default().fg(Theme::GOOD),
            ToastKind::Error => Self::error(),
        }
    }

    /// Maps a UI-agnostic [`RowStyleClass`] to a ratatui [`Style`].
    pub fn from_class(class: RowStyleClass) -> Style {
        match class {
            RowStyleClass::Normal => Self::default(),
            RowStyleClass::Active => Style::default()
                .fg(Theme::GOOD)
                .add_modifier(Modifier::BOLD),
            RowStyleClass::Dimmed => Style::default().fg(Theme::FG_DIM),
            RowStyleClass::Good => Style::default().fg(Theme::GOOD),
            RowStyleClass::Bad => Style::default().fg(Theme::BAD),
        }
    }
}

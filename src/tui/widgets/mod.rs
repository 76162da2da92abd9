//! TUI widgets for rowdeck.

mod confirm;
mod edit;
mod footer;
mod header;
mod help;
mod login;
mod rows;
mod tables;

use ratatui::layout::Rect;

pub use confirm::{render_confirm_delete, render_quit_confirm};
pub use edit::render_edit;
pub use footer::render_footer;
pub use header::render_header;
pub use help::render_help;
pub use login::{render_connecting, render_login};
pub use rows::render_rows;
pub use tables::render_tables;

/// Centers a `width` x `height` rectangle in `area`, shrinking it to fit.
pub(crate) fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_fits_inside() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(centered(area, 50, 10), Rect::new(25, 15, 50, 10));
        assert_eq!(centered(Rect::new(0, 0, 30, 5), 50, 10), Rect::new(0, 0, 30, 5));
    }
}

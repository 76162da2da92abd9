//! UI-agnostic view models.
//!
//! [`rows::build_rows_view`] turns the snapshot of the selected table into a
//! [`common::TableViewModel`]; the TUI maps it to ratatui widgets.

pub mod common;
pub mod rows;

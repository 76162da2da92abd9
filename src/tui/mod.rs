//! Terminal console for rowdeck.
//!
//! Lists the tables of the database, shows the rows of the selected one as
//! they change, and offers edit, delete and connection toggle actions.

mod app;
mod event;
mod input;
mod navigable;
mod render;
mod state;
mod style;
mod widgets;

pub use app::App;

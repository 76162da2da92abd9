//! rowdeck - live table console for a device fleet database.
//!
//! The library holds everything the `rowdeck` binary runs:
//! - `sync` - live view of one table (bulk fetch + change stream)
//! - `store` - database backends (PostgreSQL, in-memory)
//! - `device` - device connect/disconnect service
//! - `tui` - interactive terminal console

pub mod config;
pub mod device;
pub mod fmt;
pub mod model;
pub mod ops;
pub mod session;
pub mod store;
pub mod sync;
pub mod tui;
pub mod view;

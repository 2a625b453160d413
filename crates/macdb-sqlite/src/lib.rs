//! MACDB SQLite - mandatory access control for SQLite connections.
//!
//! [`SecureConnection`] binds a [`macdb_core::MacSession`] to a
//! `rusqlite::Connection`. Every statement is checked through the
//! authorizer hook, commits and rollbacks reset the decision cache, and
//! `label_id_of`, `label_text_of` and `check_access` are available to SQL.

mod connection;
mod error;
mod functions;
mod hooks;
mod table;

pub use connection::SecureConnection;
pub use error::{Error, Result};
pub use hooks::event_from_context;
pub use table::{quote_ident, ColumnDef};

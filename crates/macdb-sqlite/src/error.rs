//! SQLite binding errors.

use macdb_core::Denial;
use thiserror::Error;

/// Errors from a labelled SQLite connection.
#[derive(Debug, Error)]
pub enum Error {
    /// The statement was refused by the authorizer.
    #[error("{0}")]
    Denied(Denial),

    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Label bookkeeping error.
    #[error(transparent)]
    Mac(#[from] macdb_core::Error),

    /// Empty or otherwise unusable identifier.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

/// Result type alias for SQLite binding operations.
pub type Result<T> = std::result::Result<T, Error>;

//! CLI errors.

use macdb_core::ObjectClass;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Mac(#[from] macdb_core::Error),

    #[error("invalid coordinate '{coordinate}' for {class}")]
    InvalidCoordinate { coordinate: String, class: ObjectClass },

    #[error("no label store given, pass --data <dir>")]
    MissingData,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

//! Core error types.

use thiserror::Error;

use crate::object::{ObjectClass, ObjectCoordinate};

/// Errors raised by label resolution, caching and persistence.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// The policy authority rejected a label.
    #[error("invalid security label: {0}")]
    InvalidLabel(String),

    /// No rule matched and the authority could not compute a default.
    #[error("no label for {class} {coordinate}")]
    NoDefaultLabel {
        /// Class the label was requested for.
        class: ObjectClass,
        /// Object the label was requested for.
        coordinate: ObjectCoordinate,
    },

    /// A label id that was never issued by the registry, as the caller gave it.
    #[error("unknown label id {0}")]
    UnknownId(i64),

    /// The registry cannot mint another id.
    #[error("label id space exhausted")]
    IdSpaceExhausted,

    /// Malformed configuration or policy text.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A user-supplied name collides with a reserved one.
    #[error("reserved name: {0}")]
    ReservedName(String),

    /// Object class name not recognised.
    #[error("unknown object class: {0}")]
    UnknownClass(String),

    /// Operation kind name not recognised.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// Permission name not recognised, or not defined for the class.
    #[error("unknown permission {perm} for class {class}")]
    UnknownPermission {
        /// Class name as given.
        class: String,
        /// Permission name as given.
        perm: String,
    },

    /// Persisted bytes could not be decoded.
    #[error("corrupt {0} record")]
    Corrupt(&'static str),
}

/// A malformed line in a rules or policy file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    /// 1-based line number.
    pub line: usize,
    /// What was wrong with the line.
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Session configuration.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Default rule file, relative to the working directory.
pub const DEFAULT_RULES_PATH: &str = "./macdb_contexts";

/// Default database name for events that do not carry one.
pub const DEFAULT_DATABASE: &str = "main";

/// Configuration for a MAC session.
#[derive(Debug, Clone)]
pub struct MacConfig {
    /// Context rule file. `None` disables rules and every object gets the
    /// authority's default label.
    pub rules_path: Option<PathBuf>,

    /// Directory of the label store.
    pub data_path: PathBuf,

    /// Use a throwaway label store that is deleted on drop.
    pub temporary: bool,

    /// Database name assumed when an event does not name one.
    pub database_name: String,

    /// Initial capacity of the access vector cache.
    pub avc_capacity_hint: usize,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            rules_path: Some(PathBuf::from(DEFAULT_RULES_PATH)),
            data_path: PathBuf::from("./macdb_labels"),
            temporary: false,
            database_name: DEFAULT_DATABASE.to_string(),
            avc_capacity_hint: 1024,
        }
    }
}

impl MacConfig {
    /// Configuration storing labels under `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: path.into(),
            ..Default::default()
        }
    }

    /// Configuration with a temporary label store and no rule file.
    pub fn temporary() -> Self {
        Self {
            rules_path: None,
            temporary: true,
            ..Default::default()
        }
    }

    /// Set the rule file.
    pub fn rules_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_path = Some(path.into());
        self
    }

    /// Run without a rule file.
    pub fn without_rules(mut self) -> Self {
        self.rules_path = None;
        self
    }

    /// Set the default database name.
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Set the access vector cache capacity hint.
    pub fn avc_capacity_hint(mut self, capacity: usize) -> Self {
        self.avc_capacity_hint = capacity;
        self
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Open the sled database this configuration describes.
    pub fn open_store(&self) -> Result<sled::Db> {
        let db = if self.temporary {
            sled::Config::new().temporary(true).open()?
        } else {
            sled::open(&self.data_path)?
        };
        Ok(db)
    }
}

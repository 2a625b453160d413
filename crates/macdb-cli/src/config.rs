//! Session configuration from command-line arguments.

use macdb_core::{MacConfig, StaticPolicy};

use crate::error::Result;
use crate::Args;

/// Subject label used when no policy file is given.
pub const DEV_PROCESS_LABEL: &str = "system_u:system_r:macdb_cli_t:s0";

/// Object label used when no rule matches and no policy file is given.
pub const DEV_DEFAULT_LABEL: &str = "system_u:object_r:sql_object_t:s0";

impl From<&Args> for MacConfig {
    fn from(args: &Args) -> Self {
        let config = match &args.data {
            Some(path) => MacConfig::new(path),
            None => MacConfig::temporary(),
        };
        let config = match &args.rules {
            Some(path) => config.rules_path(path),
            None => config.without_rules(),
        };
        config.database_name(&args.database)
    }
}

/// The policy named on the command line, or an allow-all development policy.
pub fn load_policy(args: &Args) -> Result<StaticPolicy> {
    match &args.policy {
        Some(path) => Ok(StaticPolicy::load(path)?),
        None => Ok(StaticPolicy::permissive(DEV_PROCESS_LABEL, DEV_DEFAULT_LABEL)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::Path;

    #[test]
    fn test_config_from_args() {
        let args = Args::parse_from(["macdb", "--data", "/var/lib/macdb", "--rules", "ctx", "--db", "aux", "labels"]);
        let config = MacConfig::from(&args);
        assert!(!config.temporary);
        assert_eq!(config.data_path(), Path::new("/var/lib/macdb"));
        assert_eq!(config.rules_path.as_deref(), Some(Path::new("ctx")));
        assert_eq!(config.database_name, "aux");
    }

    #[test]
    fn test_defaults_are_temporary_without_rules() {
        let args = Args::parse_from(["macdb", "labels"]);
        let config = MacConfig::from(&args);
        assert!(config.temporary);
        assert!(config.rules_path.is_none());
        assert_eq!(config.database_name, "main");
    }
}

//! Rule file parsing.
//!
//! ```text
//! # class        origin              label
//! db_database    main                system_u:object_r:sql_db_t:s0
//! db_table       main.secret         system_u:object_r:secret_t:s0
//! db_column      main.*.*            system_u:object_r:sql_column_t:s0
//! db_tuple       *.*                 system_u:object_r:sql_tuple_t:s0
//! ```
//!
//! A bad line is logged and skipped; the rest of the file still loads.

use std::path::Path;

use tracing::{info, instrument, warn};

use super::rules::{ContextRule, RuleSet};
use crate::authority::PolicyAuthority;
use crate::error::{ConfigError, Result};
use crate::label::SecurityLabel;
use crate::object::ObjectClass;

/// Outcome of parsing a rule file.
#[derive(Debug, Default)]
pub struct ParsedRules {
    pub rules: RuleSet,
    /// Lines that were skipped and why.
    pub skipped: Vec<ConfigError>,
}

/// Parse rule text, validating every label with `authority`.
pub fn parse_rules(text: &str, authority: &dyn PolicyAuthority) -> ParsedRules {
    let mut parsed = ParsedRules::default();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match parse_line(trimmed, line, authority) {
            Ok(rule) => parsed.rules.insert(rule),
            Err(error) => {
                warn!(line, reason = %error.message, "skipping context rule");
                parsed.skipped.push(error);
            }
        }
    }

    parsed
}

fn parse_line(text: &str, line: usize, authority: &dyn PolicyAuthority) -> std::result::Result<ContextRule, ConfigError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let [keyword, origin, label] = tokens.as_slice() else {
        return Err(ConfigError::new(
            line,
            format!("expected '<class> <origin> <label>', found {} fields", tokens.len()),
        ));
    };

    let class = ObjectClass::from_name(keyword)
        .ok_or_else(|| ConfigError::new(line, format!("unknown class '{keyword}'")))?;

    if !authority.validate_label(label) {
        return Err(ConfigError::new(line, format!("invalid label '{label}'")));
    }

    ContextRule::new(class, *origin, SecurityLabel::from(*label), line)
        .ok_or_else(|| ConfigError::new(line, format!("origin '{origin}' does not fit {class}")))
}

/// Load rules from `path`. A missing file yields an empty rule set.
#[instrument(skip(authority))]
pub fn load_rules(path: &Path, authority: &dyn PolicyAuthority) -> Result<ParsedRules> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no rule file, using default labels");
            return Ok(ParsedRules::default());
        }
        Err(e) => return Err(e.into()),
    };

    let parsed = parse_rules(&text, authority);
    info!(
        path = %path.display(),
        rules = parsed.rules.len(),
        skipped = parsed.skipped.len(),
        "loaded context rules"
    );
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::StaticPolicy;
    use std::io::Write;

    const RULES: &str = "
# sample
db_database   main             db_t
db_table      main.secret      secret_t
DB_TABLE      *.*              table_t
db_column     main.secret.ssn  ssn_t
db_tuple      *.*              row_t
db_view       main.v           view_t
db_table      main.bad         two words
db_table      main             short_t
db_column     main.t.c         bad\u{7}label
";

    #[test]
    fn test_parse_skips_bad_lines() {
        let authority = StaticPolicy::new("p");
        let parsed = parse_rules(RULES, &authority);

        assert_eq!(parsed.rules.len(), 5);
        let lines: Vec<usize> = parsed.skipped.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![8, 9, 10, 11]);

        let tables = parsed.rules.rules_for(ObjectClass::Table);
        assert_eq!(tables[0].origin, "main.secret");
        assert_eq!(tables[1].origin, "*.*");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let parsed = load_rules(&dir.path().join("absent"), &StaticPolicy::new("p")).unwrap();
        assert!(parsed.rules.is_empty());
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "db_table main.t t_t").unwrap();
        writeln!(file, "nonsense").unwrap();

        let parsed = load_rules(file.path(), &StaticPolicy::new("p")).unwrap();
        assert_eq!(parsed.rules.len(), 1);
        assert_eq!(parsed.skipped.len(), 1);
    }
}

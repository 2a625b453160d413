//! The policy authority seam.
//!
//! The authority is the external oracle that owns label syntax and answers
//! access questions. [`StaticPolicy`] is a file-driven in-process authority
//! for development, tests and the CLI.

use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, Error, Result};
use crate::label::SecurityLabel;
use crate::object::{ObjectClass, Permission};

/// Decision oracle consulted on access-vector cache misses.
pub trait PolicyAuthority: Send + Sync {
    /// Whether `subject` may exercise `perm` on `object` of class `class`.
    fn check_access(
        &self,
        subject: &SecurityLabel,
        object: &SecurityLabel,
        class: ObjectClass,
        perm: Permission,
    ) -> bool;

    /// Label for a new object of `class` created by `process`, if the
    /// authority can compute one.
    fn compute_default_label(&self, process: &SecurityLabel, class: ObjectClass) -> Option<SecurityLabel>;

    /// Whether `label` is a well-formed label.
    fn validate_label(&self, label: &str) -> bool;

    /// Label of the calling process; the subject of every check.
    fn process_label(&self) -> Result<SecurityLabel>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone)]
struct AccessRule {
    effect: Effect,
    subject: Option<SecurityLabel>,
    object: Option<SecurityLabel>,
    class: Option<ObjectClass>,
    /// Empty means every permission.
    perms: Vec<Permission>,
}

impl AccessRule {
    fn matches(
        &self,
        subject: &SecurityLabel,
        object: &SecurityLabel,
        class: ObjectClass,
        perm: Permission,
    ) -> bool {
        self.subject.as_ref().map_or(true, |s| s == subject)
            && self.object.as_ref().map_or(true, |o| o == object)
            && self.class.map_or(true, |c| c == class)
            && (self.perms.is_empty() || self.perms.contains(&perm))
    }
}

/// Rule-list authority.
///
/// Deny rules win over allow rules and anything no allow rule covers is
/// denied.
///
/// ```text
/// process  user_u:user_r:user_t:s0
/// default  *          system_u:object_r:sql_db_t:s0
/// allow    *  *       *         *
/// deny     *  secret_t db_table select,update
/// ```
#[derive(Debug, Clone)]
pub struct StaticPolicy {
    process: SecurityLabel,
    defaults: Vec<(Option<ObjectClass>, SecurityLabel)>,
    rules: Vec<AccessRule>,
}

impl StaticPolicy {
    /// Empty policy (denies everything) running as `process`.
    pub fn new(process: impl Into<SecurityLabel>) -> Self {
        Self {
            process: process.into(),
            defaults: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Policy that allows everything and labels new objects `default`.
    pub fn permissive(process: impl Into<SecurityLabel>, default: impl Into<SecurityLabel>) -> Self {
        Self::new(process)
            .with_default(None, default)
            .allow(None, None, None, &[])
    }

    /// Default label for `class`, or for every class when `None`.
    pub fn with_default(mut self, class: Option<ObjectClass>, label: impl Into<SecurityLabel>) -> Self {
        self.defaults.push((class, label.into()));
        self
    }

    /// Allow `perms` (all when empty). `None` matches anything.
    pub fn allow(
        mut self,
        subject: Option<&str>,
        object: Option<&str>,
        class: Option<ObjectClass>,
        perms: &[Permission],
    ) -> Self {
        self.rules.push(AccessRule {
            effect: Effect::Allow,
            subject: subject.map(SecurityLabel::from),
            object: object.map(SecurityLabel::from),
            class,
            perms: perms.to_vec(),
        });
        self
    }

    /// Deny `perms` (all when empty). `None` matches anything.
    pub fn deny(
        mut self,
        subject: Option<&str>,
        object: Option<&str>,
        class: Option<ObjectClass>,
        perms: &[Permission],
    ) -> Self {
        self.rules.push(AccessRule {
            effect: Effect::Deny,
            subject: subject.map(SecurityLabel::from),
            object: object.map(SecurityLabel::from),
            class,
            perms: perms.to_vec(),
        });
        self
    }

    /// Read a policy file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse policy text. Unlike rule files, any malformed line is an error.
    pub fn parse(text: &str) -> Result<Self> {
        let mut process = None;
        let mut policy = Self::new("");

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            let keyword = tokens[0].to_ascii_lowercase();

            match (keyword.as_str(), tokens.len()) {
                ("process", 2) => {
                    process = Some(checked_label(tokens[1], line)?);
                }
                ("default", 3) => {
                    let class = parse_class(tokens[1], line)?;
                    let label = checked_label(tokens[2], line)?;
                    policy.defaults.push((class, label));
                }
                ("allow" | "deny", 5) => {
                    let class = parse_class(tokens[3], line)?;
                    let perms = parse_perms(tokens[4], class, line)?;
                    policy.rules.push(AccessRule {
                        effect: if keyword == "allow" {
                            Effect::Allow
                        } else {
                            Effect::Deny
                        },
                        subject: parse_pattern(tokens[1], line)?,
                        object: parse_pattern(tokens[2], line)?,
                        class,
                        perms,
                    });
                }
                ("process" | "default" | "allow" | "deny", n) => {
                    return Err(ConfigError::new(line, format!("wrong number of fields ({n}) for {keyword}")).into());
                }
                _ => {
                    return Err(ConfigError::new(line, format!("unknown keyword '{}'", tokens[0])).into());
                }
            }
        }

        policy.process = process.ok_or_else(|| ConfigError::new(0, "policy defines no process label"))?;
        debug!(
            rules = policy.rules.len(),
            defaults = policy.defaults.len(),
            "parsed static policy"
        );
        Ok(policy)
    }
}

fn is_well_formed(label: &str) -> bool {
    !label.is_empty() && !label.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn checked_label(text: &str, line: usize) -> Result<SecurityLabel> {
    if is_well_formed(text) {
        Ok(SecurityLabel::from(text))
    } else {
        Err(ConfigError::new(line, format!("malformed label '{text}'")).into())
    }
}

fn parse_pattern(text: &str, line: usize) -> Result<Option<SecurityLabel>> {
    if text == "*" {
        Ok(None)
    } else {
        checked_label(text, line).map(Some)
    }
}

fn parse_class(text: &str, line: usize) -> Result<Option<ObjectClass>> {
    if text == "*" {
        return Ok(None);
    }
    ObjectClass::from_name(text)
        .map(Some)
        .ok_or_else(|| ConfigError::new(line, format!("unknown class '{text}'")).into())
}

fn parse_perms(text: &str, class: Option<ObjectClass>, line: usize) -> Result<Vec<Permission>> {
    if text == "*" {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|name| {
            let perm = Permission::from_name(name)
                .ok_or_else(|| Error::from(ConfigError::new(line, format!("unknown permission '{name}'"))))?;
            match class {
                Some(class) if !class.supports(perm) => Err(ConfigError::new(
                    line,
                    format!("permission '{name}' is not defined for {class}"),
                )
                .into()),
                _ => Ok(perm),
            }
        })
        .collect()
}

impl PolicyAuthority for StaticPolicy {
    fn check_access(
        &self,
        subject: &SecurityLabel,
        object: &SecurityLabel,
        class: ObjectClass,
        perm: Permission,
    ) -> bool {
        let mut allowed = false;
        for rule in self.rules.iter().filter(|r| r.matches(subject, object, class, perm)) {
            match rule.effect {
                Effect::Deny => return false,
                Effect::Allow => allowed = true,
            }
        }
        allowed
    }

    fn compute_default_label(&self, _process: &SecurityLabel, class: ObjectClass) -> Option<SecurityLabel> {
        self.defaults
            .iter()
            .find(|(c, _)| *c == Some(class))
            .or_else(|| self.defaults.iter().find(|(c, _)| c.is_none()))
            .map(|(_, label)| label.clone())
    }

    fn validate_label(&self, label: &str) -> bool {
        is_well_formed(label)
    }

    fn process_label(&self) -> Result<SecurityLabel> {
        Ok(self.process.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "
        # development policy
        process  user_t
        default  db_tuple  row_t
        default  *         object_t
        allow    *  *          *         *
        deny     *  secret_t   db_table  select,update
        DENY     *  *          db_database drop
    ";

    #[test]
    fn test_parse_and_decide() {
        let policy = StaticPolicy::parse(POLICY).unwrap();
        let subject = policy.process_label().unwrap();
        assert_eq!(subject.as_str(), "user_t");

        let secret = SecurityLabel::from("secret_t");
        let public = SecurityLabel::from("public_t");
        assert!(!policy.check_access(&subject, &secret, ObjectClass::Table, Permission::Select));
        assert!(policy.check_access(&subject, &secret, ObjectClass::Table, Permission::Insert));
        assert!(policy.check_access(&subject, &secret, ObjectClass::Column, Permission::Select));
        assert!(policy.check_access(&subject, &public, ObjectClass::Table, Permission::Select));
        assert!(!policy.check_access(&subject, &public, ObjectClass::Database, Permission::Drop));
    }

    #[test]
    fn test_defaults() {
        let policy = StaticPolicy::parse(POLICY).unwrap();
        let process = policy.process_label().unwrap();
        assert_eq!(
            policy.compute_default_label(&process, ObjectClass::Tuple).unwrap().as_str(),
            "row_t"
        );
        assert_eq!(
            policy.compute_default_label(&process, ObjectClass::Column).unwrap().as_str(),
            "object_t"
        );
        assert!(StaticPolicy::new("p")
            .compute_default_label(&process, ObjectClass::Table)
            .is_none());
    }

    #[test]
    fn test_no_allow_means_deny() {
        let policy = StaticPolicy::new("p").allow(Some("p"), Some("o"), Some(ObjectClass::Table), &[Permission::Select]);
        let p = SecurityLabel::from("p");
        let o = SecurityLabel::from("o");
        assert!(policy.check_access(&p, &o, ObjectClass::Table, Permission::Select));
        assert!(!policy.check_access(&p, &o, ObjectClass::Table, Permission::Delete));
        assert!(!policy.check_access(&o, &o, ObjectClass::Table, Permission::Select));
    }

    #[test]
    fn test_validate_label() {
        let policy = StaticPolicy::new("p");
        assert!(policy.validate_label("system_u:object_r:sql_t:s0"));
        assert!(!policy.validate_label(""));
        assert!(!policy.validate_label("two words"));
        assert!(!policy.validate_label("tab\there"));
    }

    #[test]
    fn test_parse_errors() {
        let err = StaticPolicy::parse("process p\nallow * * db_column delete").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError { line: 2, .. })));

        let err = StaticPolicy::parse("process p\npermit * * * *").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError { line: 2, .. })));

        let err = StaticPolicy::parse("allow * * * *").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError { line: 0, .. })));
    }
}

//! Coordinate to label resolution.

use std::sync::Arc;

use tracing::{debug, warn};

use super::rules::RuleSet;
use crate::authority::PolicyAuthority;
use crate::error::{Error, Result};
use crate::label::SecurityLabel;
use crate::object::{ObjectClass, ObjectCoordinate};

/// Maps schema objects to labels using the loaded rules, falling back to
/// the authority's default label for the class.
pub struct ContextResolver {
    rules: RuleSet,
    authority: Arc<dyn PolicyAuthority>,
    process_label: SecurityLabel,
}

impl ContextResolver {
    pub fn new(rules: RuleSet, authority: Arc<dyn PolicyAuthority>) -> Result<Self> {
        let process_label = authority.process_label()?;
        Ok(Self {
            rules,
            authority,
            process_label,
        })
    }

    /// Label for `coordinate` viewed as an object of `class`.
    pub fn resolve(&self, coordinate: &ObjectCoordinate, class: ObjectClass) -> Result<SecurityLabel> {
        if let Some(rule) = self.rules.first_match(class, coordinate) {
            debug!(
                class = %class,
                coordinate = %coordinate,
                origin = %rule.origin,
                line = rule.line,
                "matched context rule"
            );
            return Ok(rule.label.clone());
        }

        match self.authority.compute_default_label(&self.process_label, class) {
            Some(label) => {
                debug!(class = %class, coordinate = %coordinate, label = %label, "using default label");
                Ok(label)
            }
            None => {
                warn!(class = %class, coordinate = %coordinate, "no rule and no default label");
                Err(Error::NoDefaultLabel {
                    class,
                    coordinate: coordinate.clone(),
                })
            }
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Swap in a freshly loaded rule set.
    pub fn replace_rules(&mut self, rules: RuleSet) {
        self.rules = rules;
    }

    pub fn process_label(&self) -> &SecurityLabel {
        &self.process_label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::StaticPolicy;
    use crate::context::parse_rules;

    fn resolver(rules: &str, authority: StaticPolicy) -> ContextResolver {
        let parsed = parse_rules(rules, &authority);
        ContextResolver::new(parsed.rules, Arc::new(authority)).unwrap()
    }

    #[test]
    fn test_specific_rule_beats_wildcard() {
        let r = resolver(
            "db_table *.* ctx_default\ndb_table db1.t1 ctx_special",
            StaticPolicy::new("p"),
        );
        let label = r
            .resolve(&ObjectCoordinate::table("db1", "t1"), ObjectClass::Table)
            .unwrap();
        assert_eq!(label.as_str(), "ctx_special");
        let label = r
            .resolve(&ObjectCoordinate::table("db1", "t2"), ObjectClass::Table)
            .unwrap();
        assert_eq!(label.as_str(), "ctx_default");
    }

    #[test]
    fn test_wildcard_only() {
        let r = resolver("db_table *.* ctx_default", StaticPolicy::new("p"));
        for (db, table) in [("main", "a"), ("other", "b"), ("X", "Y")] {
            let label = r
                .resolve(&ObjectCoordinate::table(db, table), ObjectClass::Table)
                .unwrap();
            assert_eq!(label.as_str(), "ctx_default");
        }
    }

    #[test]
    fn test_default_label_fallback() {
        let r = resolver("", StaticPolicy::new("p").with_default(Some(ObjectClass::Column), "col_t"));
        let label = r
            .resolve(&ObjectCoordinate::column("main", "t", "c"), ObjectClass::Column)
            .unwrap();
        assert_eq!(label.as_str(), "col_t");
    }

    #[test]
    fn test_no_default_fails_closed() {
        let r = resolver("db_table main.t t_t", StaticPolicy::new("p"));
        let err = r
            .resolve(&ObjectCoordinate::table("main", "other"), ObjectClass::Table)
            .unwrap_err();
        assert!(matches!(err, Error::NoDefaultLabel { class: ObjectClass::Table, .. }));
    }

    #[test]
    fn test_tuple_rules_ignore_column() {
        let r = resolver(
            "db_tuple main.t row_t\ndb_column main.t.* col_t",
            StaticPolicy::new("p"),
        );
        let rowid = ObjectCoordinate::rowid("main", "t");
        assert_eq!(r.resolve(&rowid, ObjectClass::Tuple).unwrap().as_str(), "row_t");
        assert_eq!(r.resolve(&rowid, ObjectClass::Column).unwrap().as_str(), "col_t");
    }
}

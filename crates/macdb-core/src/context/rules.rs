//! Ordered context rules.

use std::cmp::Ordering;

use serde::Serialize;

use crate::label::SecurityLabel;
use crate::object::{ObjectClass, ObjectCoordinate};

/// Pattern segment matching any name.
pub const WILDCARD: &str = "*";

/// One `<class> <origin> <label>` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextRule {
    pub class: ObjectClass,
    /// Origin pattern as written, e.g. `main.*`.
    pub origin: String,
    pub label: SecurityLabel,
    /// Line the rule came from.
    pub line: usize,
    #[serde(skip)]
    segments: Vec<String>,
}

impl ContextRule {
    /// Build a rule. Returns `None` if the origin does not have exactly the
    /// number of segments the class needs.
    pub fn new(
        class: ObjectClass,
        origin: impl Into<String>,
        label: SecurityLabel,
        line: usize,
    ) -> Option<Self> {
        let origin = origin.into();
        let segments: Vec<String> = origin.split('.').map(str::to_string).collect();
        if segments.len() != segment_count(class) || segments.iter().any(String::is_empty) {
            return None;
        }
        Some(Self {
            class,
            origin,
            label,
            line,
            segments,
        })
    }

    /// Whether this rule covers `coordinate`.
    pub fn matches(&self, coordinate: &ObjectCoordinate) -> bool {
        let names = [
            Some(coordinate.database_name()),
            coordinate.table_name(),
            coordinate.column_name(),
        ];
        self.segments
            .iter()
            .zip(names)
            .all(|(pattern, name)| match name {
                Some(name) => pattern == WILDCARD || pattern.eq_ignore_ascii_case(name),
                None => false,
            })
    }
}

fn segment_count(class: ObjectClass) -> usize {
    match class {
        ObjectClass::Database => 1,
        ObjectClass::Table | ObjectClass::Tuple => 2,
        ObjectClass::Column => 3,
    }
}

fn cmp_ignore_ascii_case(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|b| b.to_ascii_lowercase())
        .cmp(b.bytes().map(|b| b.to_ascii_lowercase()))
}

/// Rule lists for all four classes, each in match order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    lists: [Vec<ContextRule>; 4],
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule and restore match order for its class.
    ///
    /// Origins sort in descending case-insensitive order, so a literal name
    /// comes before `*` at the same position. Among equal origins the rule
    /// added last comes first.
    pub fn insert(&mut self, rule: ContextRule) {
        let list = &mut self.lists[rule.class.code() as usize];
        let at = list
            .iter()
            .position(|existing| cmp_ignore_ascii_case(&rule.origin, &existing.origin) != Ordering::Less)
            .unwrap_or(list.len());
        list.insert(at, rule);
    }

    /// Rules for `class` in match order.
    pub fn rules_for(&self, class: ObjectClass) -> &[ContextRule] {
        &self.lists[class.code() as usize]
    }

    /// First rule for `class` covering `coordinate`.
    pub fn first_match(&self, class: ObjectClass, coordinate: &ObjectCoordinate) -> Option<&ContextRule> {
        self.rules_for(class).iter().find(|rule| rule.matches(coordinate))
    }

    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }

    /// All rules, class by class, each class in match order.
    pub fn iter(&self) -> impl Iterator<Item = &ContextRule> {
        self.lists.iter().flatten()
    }
}

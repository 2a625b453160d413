//! Rule-driven label resolution for schema objects.
//!
//! Rules come from a line-oriented file that maps origin patterns such as
//! `main.*` to labels, one ordered list per object class. Objects no rule
//! covers get the policy authority's default label for their class.

mod parser;
mod resolver;
mod rules;

pub use parser::{load_rules, parse_rules, ParsedRules};
pub use resolver::ContextResolver;
pub use rules::{ContextRule, RuleSet};

//! MACDB Core - mandatory access control for relational schema objects.
//!
//! Labels databases, tables, columns and rows from a rule file, keeps a
//! persistent label-id registry, caches authority decisions per transaction
//! and turns host authorizer callbacks into access checks.

pub mod authority;
pub mod authorizer;
pub mod avc;
pub mod config;
pub mod context;
pub mod error;
pub mod label;
pub mod object;
pub mod schema;
pub mod session;

pub use authority::{PolicyAuthority, StaticPolicy};
pub use authorizer::{authorize, AccessChecker, AuthorizationEvent, Decision, Denial, OperationKind};
pub use avc::{AccessDecision, AccessKey, AccessVectorCache, AvcStats};
pub use config::MacConfig;
pub use context::{load_rules, parse_rules, ContextResolver, ContextRule, ParsedRules, RuleSet};
pub use error::{ConfigError, Error, Result};
pub use label::{LabelId, LabelRegistry, SecurityLabel};
pub use object::{ObjectClass, ObjectCoordinate, ObjectRef, Permission, ROWID_COLUMN};
pub use schema::{
    LabelColumn, ObjectLabelStore, ObjectRow, SchemaChange, SchemaJournal, TableLabels, LABEL_COLUMN,
};
pub use session::{MacSession, SharedSession};

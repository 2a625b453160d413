//! Per-operation authorization.
//!
//! [`authorize`] turns one intercepted operation into the access checks it
//! needs and combines their outcomes. Checks run in order and the first
//! denial ends the evaluation.

mod event;

use std::borrow::Cow;
use std::fmt;

use tracing::{debug, warn};

pub use event::{AuthorizationEvent, OperationKind};

use crate::error::Result;
use crate::object::{ObjectClass, ObjectCoordinate, ObjectRef, Permission};

/// Why an operation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// The authority refused the permission.
    Policy {
        class: ObjectClass,
        perm: Permission,
        target: ObjectCoordinate,
    },
    /// The object's label could not be determined.
    Unlabelled {
        class: ObjectClass,
        perm: Permission,
        target: ObjectCoordinate,
        cause: String,
    },
    /// Attaching or detaching another database.
    MultipleDatabases { name: String },
    /// Turning on `writable_schema`.
    WritableSchema,
    /// The event lacked the object name its checks need.
    MissingArgument { operation: OperationKind },
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::Policy { class, perm, target } => {
                write!(f, "permission denied: {class}:{perm} on {target}")
            }
            Denial::Unlabelled {
                class,
                perm,
                target,
                cause,
            } => write!(f, "permission denied: {class}:{perm} on {target} ({cause})"),
            Denial::MultipleDatabases { name } => {
                write!(f, "cannot attach or detach '{name}': multiple databases are not supported")
            }
            Denial::WritableSchema => f.write_str("pragma writable_schema is not allowed"),
            Denial::MissingArgument { operation } => {
                write!(f, "permission denied: {operation} without an object name")
            }
        }
    }
}

/// Outcome of an authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Run `next` only if this decision allows.
    pub fn and_then(self, next: impl FnOnce() -> Decision) -> Decision {
        match self {
            Decision::Allow => next(),
            deny => deny,
        }
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Decision::Allow => None,
            Decision::Deny(denial) => Some(denial),
        }
    }
}

/// What the dispatch needs from a session.
pub trait AccessChecker {
    /// Check one permission on one object.
    fn check(&mut self, target: ObjectRef<'_>, class: ObjectClass, perm: Permission) -> Decision;

    /// Registered columns of a table, or `None` if the table is not registered.
    fn columns_of(&mut self, database: &str, table: &str) -> Result<Option<Vec<String>>>;

    /// Database assumed when an event names none.
    fn default_database(&self) -> &str;
}

/// Decide one intercepted operation.
pub fn authorize<C: AccessChecker + ?Sized>(checker: &mut C, event: &AuthorizationEvent<'_>) -> Decision {
    let decision = match event.database {
        Some(database) => checker.check(
            ObjectRef::database(database),
            ObjectClass::Database,
            Permission::Access,
        ),
        None => Decision::Allow,
    }
    .and_then(|| dispatch(checker, event));

    match &decision {
        Decision::Allow => debug!(operation = %event.kind, arg1 = ?event.arg1, arg2 = ?event.arg2, "allowed"),
        Decision::Deny(denial) => warn!(operation = %event.kind, %denial, "denied"),
    }
    decision
}

fn dispatch<C: AccessChecker + ?Sized>(checker: &mut C, event: &AuthorizationEvent<'_>) -> Decision {
    use OperationKind::*;

    let database = match event.database {
        Some(database) => Cow::Borrowed(database),
        None => Cow::Owned(checker.default_database().to_string()),
    };
    let db = database.as_ref();

    match event.kind {
        CreateTable | CreateTempTable | CreateView | CreateTempView => {
            check_table(checker, event.kind, db, event.arg1, Permission::Create)
        }
        CreateTrigger | CreateTempTrigger | DropTrigger | DropTempTrigger | CreateIndex
        | CreateTempIndex | DropIndex | DropTempIndex => {
            check_table(checker, event.kind, db, event.arg2, Permission::Setattr)
        }
        DropTable | DropTempTable | DropView | DropTempView | DropVtable => {
            check_table(checker, event.kind, db, event.arg1, Permission::Drop)
                .and_then(|| check_all_columns(checker, event.kind, db, event.arg1, Permission::Drop))
        }
        Insert => check_table(checker, event.kind, db, event.arg1, Permission::Insert)
            .and_then(|| check_all_columns(checker, event.kind, db, event.arg1, Permission::Insert)),
        Delete => check_table(checker, event.kind, db, event.arg1, Permission::Delete),
        Read => check_table(checker, event.kind, db, event.arg1, Permission::Select)
            .and_then(|| check_column(checker, db, event.arg1, event.arg2, Permission::Select)),
        Update => match (event.arg1, event.arg2) {
            (Some(table), Some(column)) if !column.is_empty() => checker.check(
                ObjectRef::column(db, table, column),
                ObjectClass::Column,
                Permission::Update,
            ),
            _ => Decision::Deny(Denial::MissingArgument {
                operation: event.kind,
            }),
        },
        AlterTable => {
            let database = event.arg1.unwrap_or(db);
            check_table(checker, event.kind, database, event.arg2, Permission::Getattr)
        }
        Attach | Detach => match event.arg1 {
            Some(name) if !name.is_empty() => Decision::Deny(Denial::MultipleDatabases {
                name: name.to_string(),
            }),
            _ => Decision::Allow,
        },
        Pragma => match event.arg1 {
            Some(pragma) if pragma.eq_ignore_ascii_case("writable_schema") => {
                Decision::Deny(Denial::WritableSchema)
            }
            _ => Decision::Allow,
        },
        Select | Transaction | Reindex | Analyze | CreateVtable | Function | Savepoint | Copy
        | Recursive => Decision::Allow,
        Unknown(code) => {
            debug!(code, "unmodelled operation allowed");
            Decision::Allow
        }
    }
}

fn check_table<C: AccessChecker + ?Sized>(
    checker: &mut C,
    operation: OperationKind,
    database: &str,
    table: Option<&str>,
    perm: Permission,
) -> Decision {
    match table {
        Some(table) if !table.is_empty() => {
            checker.check(ObjectRef::table(database, table), ObjectClass::Table, perm)
        }
        _ => Decision::Deny(Denial::MissingArgument { operation }),
    }
}

/// Column check for a read. A read naming no column (e.g. `count(*)`) only
/// needs the table check.
fn check_column<C: AccessChecker + ?Sized>(
    checker: &mut C,
    database: &str,
    table: Option<&str>,
    column: Option<&str>,
    perm: Permission,
) -> Decision {
    match (table, column) {
        (Some(table), Some(column)) if !column.is_empty() => checker.check(
            ObjectRef::column(database, table, column),
            ObjectClass::Column,
            perm,
        ),
        _ => Decision::Allow,
    }
}

/// Schema tables the host writes while compiling DDL. They carry no column
/// labels of their own.
const CATALOG_TABLES: [&str; 2] = ["sqlite_master", "sqlite_temp_master"];

fn is_catalog(table: &str) -> bool {
    CATALOG_TABLES.iter().any(|name| name.eq_ignore_ascii_case(table))
}

/// Check `perm` on every column of a table. A table whose columns are not
/// known cannot be scanned and is denied.
fn check_all_columns<C: AccessChecker + ?Sized>(
    checker: &mut C,
    operation: OperationKind,
    database: &str,
    table: Option<&str>,
    perm: Permission,
) -> Decision {
    let Some(table) = table else {
        return Decision::Deny(Denial::MissingArgument { operation });
    };
    if is_catalog(table) {
        return Decision::Allow;
    }
    let unlabelled = |cause: String| {
        Decision::Deny(Denial::Unlabelled {
            class: ObjectClass::Column,
            perm,
            target: ObjectCoordinate::table(database, table),
            cause,
        })
    };
    let columns = match checker.columns_of(database, table) {
        Ok(Some(columns)) => columns,
        Ok(None) => return unlabelled("table is not registered".to_string()),
        Err(e) => return unlabelled(e.to_string()),
    };

    for column in columns {
        let decision = checker.check(
            ObjectRef::column(database, table, &column),
            ObjectClass::Column,
            perm,
        );
        if !decision.is_allowed() {
            return decision;
        }
    }
    Decision::Allow
}

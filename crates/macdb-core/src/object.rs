//! Object classes, permissions and schema-object coordinates.
//!
//! Every access check names an object class (database, table, column or
//! tuple), a permission defined for that class, and the coordinate of the
//! schema object being touched.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Reserved column name for a table's implicit row identifier.
pub const ROWID_COLUMN: &str = "ROWID";

/// Kind of schema object a label is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    /// A whole database.
    Database,
    /// A table.
    Table,
    /// A column of a table.
    Column,
    /// The rows of a table.
    Tuple,
}

impl ObjectClass {
    /// All classes, in code order.
    pub const ALL: [ObjectClass; 4] = [
        ObjectClass::Database,
        ObjectClass::Table,
        ObjectClass::Column,
        ObjectClass::Tuple,
    ];

    /// Numeric class code used in access-vector keys.
    pub const fn code(self) -> u8 {
        match self {
            ObjectClass::Database => 0,
            ObjectClass::Table => 1,
            ObjectClass::Column => 2,
            ObjectClass::Tuple => 3,
        }
    }

    /// Class name as used in rules and by the policy authority.
    pub const fn name(self) -> &'static str {
        match self {
            ObjectClass::Database => "db_database",
            ObjectClass::Table => "db_table",
            ObjectClass::Column => "db_column",
            ObjectClass::Tuple => "db_tuple",
        }
    }

    /// Look up a class by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|class| class.name().eq_ignore_ascii_case(name))
    }

    /// Permissions defined for this class.
    pub const fn permissions(self) -> &'static [Permission] {
        use Permission::*;
        match self {
            ObjectClass::Database => &[
                Create,
                Drop,
                Getattr,
                Setattr,
                RelabelFrom,
                RelabelTo,
                Access,
            ],
            ObjectClass::Table => &[
                Create,
                Drop,
                Getattr,
                Setattr,
                RelabelFrom,
                RelabelTo,
                Select,
                Update,
                Insert,
                Delete,
            ],
            ObjectClass::Column => &[
                Create,
                Drop,
                Getattr,
                Setattr,
                RelabelFrom,
                RelabelTo,
                Select,
                Update,
                Insert,
            ],
            ObjectClass::Tuple => &[RelabelFrom, RelabelTo, Select, Update, Insert, Delete],
        }
    }

    /// Whether `perm` is defined for this class.
    pub fn supports(self, perm: Permission) -> bool {
        self.permissions().contains(&perm)
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| Error::UnknownClass(s.to_string()))
    }
}

/// An operation on an object class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Create,
    Drop,
    Getattr,
    Setattr,
    RelabelFrom,
    RelabelTo,
    Select,
    Update,
    Insert,
    Delete,
    Access,
}

impl Permission {
    /// All permissions, in code order.
    pub const ALL: [Permission; 11] = [
        Permission::Create,
        Permission::Drop,
        Permission::Getattr,
        Permission::Setattr,
        Permission::RelabelFrom,
        Permission::RelabelTo,
        Permission::Select,
        Permission::Update,
        Permission::Insert,
        Permission::Delete,
        Permission::Access,
    ];

    /// Numeric permission code used in access-vector keys.
    pub const fn code(self) -> u8 {
        match self {
            Permission::Create => 0,
            Permission::Drop => 1,
            Permission::Getattr => 2,
            Permission::Setattr => 3,
            Permission::RelabelFrom => 4,
            Permission::RelabelTo => 5,
            Permission::Select => 6,
            Permission::Update => 7,
            Permission::Insert => 8,
            Permission::Delete => 9,
            Permission::Access => 10,
        }
    }

    /// Permission name as used by the policy authority.
    pub const fn name(self) -> &'static str {
        match self {
            Permission::Create => "create",
            Permission::Drop => "drop",
            Permission::Getattr => "getattr",
            Permission::Setattr => "setattr",
            Permission::RelabelFrom => "relabelfrom",
            Permission::RelabelTo => "relabelto",
            Permission::Select => "select",
            Permission::Update => "update",
            Permission::Insert => "insert",
            Permission::Delete => "delete",
            Permission::Access => "access",
        }
    }

    /// Look up a permission by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|perm| perm.name().eq_ignore_ascii_case(name))
    }

    /// Resolve a permission name that must be defined for `class`.
    pub fn for_class(class: ObjectClass, name: &str) -> Result<Self, Error> {
        Self::from_name(name)
            .filter(|perm| class.supports(*perm))
            .ok_or_else(|| Error::UnknownPermission {
                class: class.name().to_string(),
                perm: name.to_string(),
            })
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Location of a schema object: database, optional table, optional column.
///
/// Names compare and hash without regard to ASCII case, matching how the
/// host engine treats identifiers. The original spelling is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectCoordinate {
    database: String,
    table: Option<String>,
    column: Option<String>,
}

impl ObjectCoordinate {
    /// Coordinate of a database.
    pub fn database(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: None,
            column: None,
        }
    }

    /// Coordinate of a table (also used for its tuples).
    pub fn table(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: Some(table.into()),
            column: None,
        }
    }

    /// Coordinate of a column.
    pub fn column(
        database: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            table: Some(table.into()),
            column: Some(column.into()),
        }
    }

    /// Coordinate of a table's implicit row-identifier column.
    pub fn rowid(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self::column(database, table, ROWID_COLUMN)
    }

    /// Parse dotted `db[.table[.column]]` text.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.splitn(3, '.');
        let database = parts.next().filter(|s| !s.is_empty())?;
        let table = parts.next();
        let column = parts.next();
        if table.is_some_and(str::is_empty) || column.is_some_and(str::is_empty) {
            return None;
        }
        Some(Self {
            database: database.to_string(),
            table: table.map(str::to_string),
            column: column.map(str::to_string),
        })
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn column_name(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// Whether this names the implicit row-identifier column.
    pub fn is_rowid(&self) -> bool {
        self.column
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(ROWID_COLUMN))
    }

    /// Same coordinate moved to another table name.
    pub fn with_table(&self, table: &str) -> Self {
        Self {
            database: self.database.clone(),
            table: Some(table.to_string()),
            column: self.column.clone(),
        }
    }

    /// Borrowed view of this coordinate.
    pub fn borrowed(&self) -> ObjectRef<'_> {
        ObjectRef {
            database: &self.database,
            table: self.table.as_deref(),
            column: self.column.as_deref(),
        }
    }

    /// Normalized storage key: lowercase segments separated by NUL.
    pub fn storage_key(&self) -> Vec<u8> {
        self.borrowed().storage_key()
    }

    /// Key prefix shared by every object of a database.
    pub fn database_prefix(database: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(database.len() + 1);
        key.extend(database.bytes().map(|b| b.to_ascii_lowercase()));
        key.push(0);
        key
    }

    /// Key prefix shared by a table's row and all its columns.
    pub fn table_prefix(database: &str, table: &str) -> Vec<u8> {
        let mut key = Self::database_prefix(database);
        key.reserve(table.len() + 1);
        key.extend(table.bytes().map(|b| b.to_ascii_lowercase()));
        key.push(0);
        key
    }
}

impl PartialEq for ObjectCoordinate {
    fn eq(&self, other: &Self) -> bool {
        self.borrowed() == other.borrowed()
    }
}

impl Eq for ObjectCoordinate {}

impl Hash for ObjectCoordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.borrowed().hash(state);
    }
}

impl fmt::Display for ObjectCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.borrowed().fmt(f)
    }
}

/// Borrowed form of an [`ObjectCoordinate`].
///
/// Access checks are made against borrowed names so that a cached decision
/// costs no allocation. Compares and hashes exactly like the owned form.
#[derive(Debug, Clone, Copy)]
pub struct ObjectRef<'a> {
    database: &'a str,
    table: Option<&'a str>,
    column: Option<&'a str>,
}

impl<'a> ObjectRef<'a> {
    pub fn database(database: &'a str) -> Self {
        Self {
            database,
            table: None,
            column: None,
        }
    }

    pub fn table(database: &'a str, table: &'a str) -> Self {
        Self {
            database,
            table: Some(table),
            column: None,
        }
    }

    pub fn column(database: &'a str, table: &'a str, column: &'a str) -> Self {
        Self {
            database,
            table: Some(table),
            column: Some(column),
        }
    }

    pub fn database_name(&self) -> &'a str {
        self.database
    }

    pub fn table_name(&self) -> Option<&'a str> {
        self.table
    }

    pub fn column_name(&self) -> Option<&'a str> {
        self.column
    }

    /// Owned copy.
    pub fn to_coordinate(&self) -> ObjectCoordinate {
        ObjectCoordinate {
            database: self.database.to_string(),
            table: self.table.map(str::to_string),
            column: self.column.map(str::to_string),
        }
    }

    /// Normalized storage key: lowercase segments separated by NUL.
    pub fn storage_key(&self) -> Vec<u8> {
        let mut key = ObjectCoordinate::table_prefix(self.database, self.table.unwrap_or(""));
        if let Some(column) = self.column {
            key.extend(column.bytes().map(|b| b.to_ascii_lowercase()));
        }
        key
    }
}

impl<'a> From<&'a ObjectCoordinate> for ObjectRef<'a> {
    fn from(coordinate: &'a ObjectCoordinate) -> Self {
        coordinate.borrowed()
    }
}

fn eq_opt(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    }
}

fn hash_ci<H: Hasher>(value: Option<&str>, state: &mut H) {
    match value {
        Some(s) => {
            state.write_u8(1);
            for b in s.bytes() {
                state.write_u8(b.to_ascii_lowercase());
            }
            state.write_u8(0xff);
        }
        None => state.write_u8(0),
    }
}

impl PartialEq for ObjectRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.database.eq_ignore_ascii_case(other.database)
            && eq_opt(self.table, other.table)
            && eq_opt(self.column, other.column)
    }
}

impl Eq for ObjectRef<'_> {}

impl Hash for ObjectRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_ci(Some(self.database), state);
        hash_ci(self.table, state);
        hash_ci(self.column, state);
    }
}

impl fmt::Display for ObjectRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.database)?;
        if let Some(table) = self.table {
            write!(f, ".{table}")?;
        }
        if let Some(column) = self.column {
            write!(f, ".{column}")?;
        }
        Ok(())
    }
}

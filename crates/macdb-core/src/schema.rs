//! Persisted object labels and schema-change bookkeeping.
//!
//! Every labelled schema object has a row `(coordinate, class) -> label id`
//! in the `objects:labels` tree. Rows are written when tables and columns
//! are created and removed or moved when they are dropped or renamed.

use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

use crate::error::{Error, Result};
use crate::label::LabelId;
use crate::object::{ObjectClass, ObjectCoordinate, ObjectRef, ROWID_COLUMN};

/// Name of the per-row label column added to every user table.
pub const LABEL_COLUMN: &str = "security_context";

/// Tree holding object label rows.
const OBJECTS_TREE: &str = "objects:labels";

/// One persisted object label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRow {
    pub coordinate: ObjectCoordinate,
    pub class: ObjectClass,
    pub label: LabelId,
}

impl ObjectRow {
    pub fn new(coordinate: ObjectCoordinate, class: ObjectClass, label: LabelId) -> Self {
        Self {
            coordinate,
            class,
            label,
        }
    }

    fn key(&self) -> Vec<u8> {
        row_key(self.coordinate.borrowed(), self.class)
    }
}

fn row_key(coordinate: ObjectRef<'_>, class: ObjectClass) -> Vec<u8> {
    let mut key = coordinate.storage_key();
    key.push(0);
    key.push(class.code());
    key
}

/// Sled-backed table of object labels.
#[derive(Clone)]
pub struct ObjectLabelStore {
    tree: Tree,
}

impl ObjectLabelStore {
    /// Open the store.
    pub fn open(db: &Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree(OBJECTS_TREE)?,
        })
    }

    /// Label of an object, if recorded.
    pub fn get<'c>(&self, coordinate: impl Into<ObjectRef<'c>>, class: ObjectClass) -> Result<Option<LabelId>> {
        match self.tree.get(row_key(coordinate.into(), class))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?.label)),
            None => Ok(None),
        }
    }

    /// Record a row, returning the row it replaced.
    pub fn put(&self, row: &ObjectRow) -> Result<Option<ObjectRow>> {
        let previous = self.tree.insert(row.key(), Self::encode(row)?)?;
        previous.map(|bytes| Self::decode(&bytes)).transpose()
    }

    /// Remove a row, returning it.
    pub fn remove(&self, coordinate: &ObjectCoordinate, class: ObjectClass) -> Result<Option<ObjectRow>> {
        let previous = self.tree.remove(row_key(coordinate.borrowed(), class))?;
        previous.map(|bytes| Self::decode(&bytes)).transpose()
    }

    /// All rows of one table: the table itself, its tuples and columns.
    pub fn table_rows(&self, database: &str, table: &str) -> Result<Vec<ObjectRow>> {
        self.tree
            .scan_prefix(ObjectCoordinate::table_prefix(database, table))
            .map(|item| {
                let (_, value) = item?;
                Self::decode(&value)
            })
            .collect()
    }

    /// Registered column names of a table, excluding the row identifier.
    pub fn columns_of(&self, database: &str, table: &str) -> Result<Vec<String>> {
        Ok(self
            .table_rows(database, table)?
            .into_iter()
            .filter(|row| row.class == ObjectClass::Column && !row.coordinate.is_rowid())
            .filter_map(|row| row.coordinate.column_name().map(str::to_string))
            .collect())
    }

    /// Whether the table has been registered.
    pub fn has_table(&self, database: &str, table: &str) -> Result<bool> {
        Ok(self.get(ObjectRef::table(database, table), ObjectClass::Table)?.is_some())
    }

    /// Names of the registered tables of a database.
    pub fn tables(&self, database: &str) -> Result<Vec<String>> {
        let mut tables = Vec::new();
        for item in self.tree.scan_prefix(ObjectCoordinate::database_prefix(database)) {
            let (_, value) = item?;
            let row = Self::decode(&value)?;
            if row.class == ObjectClass::Table {
                if let Some(table) = row.coordinate.table_name() {
                    tables.push(table.to_string());
                }
            }
        }
        Ok(tables)
    }

    /// Remove every row of a table, returning what was removed.
    pub fn remove_table(&self, database: &str, table: &str) -> Result<Vec<ObjectRow>> {
        let rows = self.table_rows(database, table)?;
        for row in &rows {
            self.tree.remove(row.key())?;
        }
        Ok(rows)
    }

    /// Every row in key order.
    pub fn rows(&self) -> Result<Vec<ObjectRow>> {
        self.tree
            .iter()
            .map(|item| {
                let (_, value) = item?;
                Self::decode(&value)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn encode(row: &ObjectRow) -> Result<Vec<u8>> {
        serde_json::to_vec(row).map_err(|_| Error::Corrupt("object label"))
    }

    fn decode(bytes: &[u8]) -> Result<ObjectRow> {
        serde_json::from_slice(bytes).map_err(|_| Error::Corrupt("object label"))
    }
}

/// Declaration of the per-row label column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelColumn {
    /// Tuple label id new rows receive by default.
    pub default: LabelId,
}

impl LabelColumn {
    pub const NAME: &'static str = LABEL_COLUMN;
    pub const SQL_TYPE: &'static str = "INT";

    /// Column definition for a `CREATE TABLE` column list.
    pub fn definition(&self) -> String {
        format!("{} {} DEFAULT {}", Self::NAME, Self::SQL_TYPE, self.default)
    }
}

/// Labels for a table being created.
///
/// Produced by [`crate::session::MacSession::table_labels`] while the
/// column list is assembled, so the label column default is known before
/// the table exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLabels {
    pub database: String,
    pub table: String,
    pub table_label: LabelId,
    pub tuple_label: LabelId,
    /// Declared columns in order, then the label column when present.
    pub columns: Vec<(String, LabelId)>,
    pub rowid_label: LabelId,
    pub label_column: Option<LabelColumn>,
}

impl TableLabels {
    /// Rows to persist for this table.
    pub fn rows(&self) -> Vec<ObjectRow> {
        let mut rows = Vec::with_capacity(self.columns.len() + 3);
        let table = ObjectCoordinate::table(&self.database, &self.table);
        rows.push(ObjectRow::new(table.clone(), ObjectClass::Table, self.table_label));
        rows.push(ObjectRow::new(table, ObjectClass::Tuple, self.tuple_label));
        for (column, label) in &self.columns {
            rows.push(ObjectRow::new(
                ObjectCoordinate::column(&self.database, &self.table, column),
                ObjectClass::Column,
                *label,
            ));
        }
        rows.push(ObjectRow::new(
            ObjectCoordinate::column(&self.database, &self.table, ROWID_COLUMN),
            ObjectClass::Column,
            self.rowid_label,
        ));
        rows
    }
}

/// A schema change the host reports after executing DDL.
#[derive(Debug, Clone)]
pub enum SchemaChange {
    CreateTable(TableLabels),
    DropTable {
        database: String,
        table: String,
    },
    RenameTable {
        database: String,
        from: String,
        to: String,
    },
    AddColumn {
        database: String,
        table: String,
        column: String,
    },
}

#[derive(Debug, Clone)]
enum UndoOp {
    Remove(ObjectCoordinate, ObjectClass),
    Restore(ObjectRow),
}

/// Undo log for schema changes made inside an open transaction.
#[derive(Debug, Default)]
pub struct SchemaJournal {
    ops: Vec<UndoOp>,
}

impl SchemaJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that `row` was written over `previous`.
    pub fn record_put(&mut self, row: &ObjectRow, previous: Option<ObjectRow>) {
        self.ops.push(match previous {
            Some(previous) => UndoOp::Restore(previous),
            None => UndoOp::Remove(row.coordinate.clone(), row.class),
        });
    }

    /// Note that `row` was removed.
    pub fn record_remove(&mut self, row: ObjectRow) {
        self.ops.push(UndoOp::Restore(row));
    }

    /// Revert every recorded change, newest first.
    pub fn undo(&mut self, store: &ObjectLabelStore) -> Result<usize> {
        let count = self.ops.len();
        while let Some(op) = self.ops.pop() {
            match op {
                UndoOp::Remove(coordinate, class) => {
                    store.remove(&coordinate, class)?;
                }
                UndoOp::Restore(row) => {
                    store.put(&row)?;
                }
            }
        }
        Ok(count)
    }

    /// Forget recorded changes; they are now durable.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

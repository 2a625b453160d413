//! Column declarations and `CREATE TABLE` assembly.

use macdb_core::TableLabels;

use crate::error::{Error, Result};

/// A user column of a table to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// Type and constraints, inserted verbatim after the name.
    pub declaration: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaration: None,
        }
    }

    /// Column with a type or constraint clause, e.g. `TEXT NOT NULL`.
    pub fn typed(name: impl Into<String>, declaration: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaration: Some(declaration.into()),
        }
    }

    pub(crate) fn sql(&self) -> Result<String> {
        let name = quote_ident(&self.name)?;
        Ok(match &self.declaration {
            Some(declaration) => format!("{name} {declaration}"),
            None => name,
        })
    }
}

/// Quote an identifier for SQLite.
pub fn quote_ident(name: &str) -> Result<String> {
    if name.is_empty() || name.contains('\0') {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// `CREATE TABLE` statement for `columns` plus the label column.
pub(crate) fn create_table_sql(labels: &TableLabels, columns: &[ColumnDef]) -> Result<String> {
    let mut parts = columns.iter().map(ColumnDef::sql).collect::<Result<Vec<_>>>()?;
    if let Some(label_column) = &labels.label_column {
        parts.push(label_column.definition());
    }
    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_ident(&labels.table)?,
        parts.join(", ")
    ))
}

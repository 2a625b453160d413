//! Labelled SQLite connection.

use macdb_core::{Denial, MacSession, SchemaChange, SharedSession, TableLabels};
use rusqlite::{Batch, Connection, ErrorCode, Params, Statement};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::table::{create_table_sql, quote_ident, ColumnDef};
use crate::{functions, hooks};

/// Name SQLite gives the database holding temporary tables.
const TEMP_DATABASE: &str = "temp";

/// A SQLite connection with mandatory access control.
pub struct SecureConnection {
    conn: Connection,
    session: SharedSession,
}

impl SecureConnection {
    /// Bind `session` to `conn` and install the hooks and SQL functions.
    pub fn open(conn: Connection, session: MacSession) -> Result<Self> {
        Self::with_shared(conn, session.into_shared())
    }

    /// Bind an already shared session.
    pub fn with_shared(conn: Connection, session: SharedSession) -> Result<Self> {
        hooks::install(&conn, &session);
        functions::register(&conn, &session)?;
        info!(
            subject = %session.lock().subject_label(),
            "secure connection ready"
        );
        Ok(Self { conn, session })
    }

    /// In-memory database bound to `session`.
    pub fn open_in_memory(session: MacSession) -> Result<Self> {
        Self::open(Connection::open_in_memory()?, session)
    }

    /// The underlying connection. Statements run on it are still checked,
    /// but refusals surface as plain SQLite errors.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Execute one statement; a refusal is reported as [`Error::Denied`].
    ///
    /// Tables the statement creates or drops get their labels registered or
    /// removed before this returns.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        let before = self.schema_version()?;
        let outcome = self.run(|conn| conn.execute(sql, params));
        let synced = self.sync_if_changed(before);
        let changes = outcome?;
        synced?;
        Ok(changes)
    }

    /// Execute several statements separated by semicolons. Each statement is
    /// compiled only after the labels of tables created or dropped by the
    /// previous ones are in place.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let mut batch = Batch::new(&self.conn, sql);
        loop {
            let before = self.schema_version()?;
            self.session.lock().take_last_denial();
            let Some(mut stmt) = batch.next().map_err(|e| self.explain(e))? else {
                return Ok(());
            };
            let outcome = run_to_completion(&mut stmt).map_err(|e| self.explain(e));
            drop(stmt);
            let synced = self.sync_if_changed(before);
            outcome?;
            synced?;
        }
    }

    /// Query a single row, reporting a refusal as [`Error::Denied`].
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<T>
    where
        P: Params,
        F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        self.run(|conn| conn.query_row(sql, params, f))
    }

    /// Reason of the most recent denial.
    pub fn last_denial(&self) -> Option<Denial> {
        self.session.lock().last_denial().cloned()
    }

    /// Create a table with the label column appended and register its labels.
    #[instrument(skip(self, columns))]
    pub fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Result<TableLabels> {
        let labels = {
            let mut session = self.session.lock();
            let database = session.config().database_name.clone();
            session.table_labels(&database, table, columns.iter().map(|c| c.name.as_str()))?
        };

        let sql = create_table_sql(&labels, columns)?;
        debug!(%sql, "creating labelled table");
        self.run(|conn| conn.execute(&sql, []))?;
        self.record(SchemaChange::CreateTable(labels.clone()))?;
        Ok(labels)
    }

    /// Drop a table and its labels.
    #[instrument(skip(self))]
    pub fn drop_table(&self, table: &str) -> Result<()> {
        let sql = format!("DROP TABLE {}", quote_ident(table)?);
        self.run(|conn| conn.execute(&sql, []))?;
        let database = self.database_name();
        self.record(SchemaChange::DropTable {
            database,
            table: table.to_string(),
        })
    }

    /// Rename a table, carrying its labels along.
    #[instrument(skip(self))]
    pub fn rename_table(&self, from: &str, to: &str) -> Result<()> {
        let sql = format!("ALTER TABLE {} RENAME TO {}", quote_ident(from)?, quote_ident(to)?);
        self.run(|conn| conn.execute(&sql, []))?;
        let database = self.database_name();
        self.record(SchemaChange::RenameTable {
            database,
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Add a column and register its label.
    #[instrument(skip(self))]
    pub fn add_column(&self, table: &str, column: &ColumnDef) -> Result<()> {
        if column.name.eq_ignore_ascii_case(macdb_core::LABEL_COLUMN) {
            return Err(macdb_core::Error::ReservedName(column.name.clone()).into());
        }
        let sql = format!("ALTER TABLE {} ADD COLUMN {}", quote_ident(table)?, column.sql()?);
        self.run(|conn| conn.execute(&sql, []))?;
        let database = self.database_name();
        self.record(SchemaChange::AddColumn {
            database,
            table: table.to_string(),
            column: column.name.clone(),
        })
    }

    /// Bring the label store in line with the schema: register tables and
    /// views that have no labels yet and forget the labels of ones that no
    /// longer exist. Returns how many tables were registered or forgotten.
    #[instrument(skip(self))]
    pub fn sync_schema(&self) -> Result<usize> {
        let database = self.database_name();
        let changed = self.sync_catalog(&database, "sqlite_master")?
            + self.sync_catalog(TEMP_DATABASE, "sqlite_temp_master")?;
        if changed > 0 {
            info!(changed, "label store synchronised with schema");
        }
        Ok(changed)
    }

    fn sync_catalog(&self, database: &str, catalog: &str) -> Result<usize> {
        let present: Vec<String> = {
            let sql = format!(
                "SELECT name FROM {catalog} WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'"
            );
            let mut stmt = self.conn.prepare(&sql).map_err(|e| self.explain(e))?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut changed = 0;
        for table in &present {
            if self.session.lock().objects().has_table(database, table)? {
                continue;
            }
            let columns = self.table_columns(database, table)?;
            let labels = self
                .session
                .lock()
                .existing_table_labels(database, table, &columns)?;
            self.record(SchemaChange::CreateTable(labels))?;
            debug!(database, table, "registered table labels");
            changed += 1;
        }

        let registered = self.session.lock().objects().tables(database)?;
        for table in registered {
            if present.iter().any(|name| name.eq_ignore_ascii_case(&table)) {
                continue;
            }
            debug!(database, %table, "forgetting labels of missing table");
            self.record(SchemaChange::DropTable {
                database: database.to_string(),
                table,
            })?;
            changed += 1;
        }
        Ok(changed)
    }

    /// Run `VACUUM` with per-object checks suspended.
    pub fn vacuum(&self) -> Result<()> {
        self.session.lock().set_vacuum(true);
        let outcome = self.conn.execute_batch("VACUUM");
        self.session.lock().set_vacuum(false);
        outcome.map_err(|e| self.explain(e))
    }

    fn table_columns(&self, database: &str, table: &str) -> Result<Vec<String>> {
        let sql = format!("PRAGMA {}.table_info({})", quote_ident(database)?, quote_ident(table)?);
        let mut stmt = self.conn.prepare(&sql).map_err(|e| self.explain(e))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Run `op`, reporting a refusal as [`Error::Denied`].
    fn run<T>(&self, op: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        self.session.lock().take_last_denial();
        op(&self.conn).map_err(|e| self.explain(e))
    }

    /// Schema cookies of the main and temp databases.
    fn schema_version(&self) -> Result<(i64, i64)> {
        let read = |sql: &str| self.conn.query_row(sql, [], |row| row.get::<_, i64>(0));
        let main = read("PRAGMA main.schema_version").map_err(|e| self.explain(e))?;
        let temp = read("PRAGMA temp.schema_version").map_err(|e| self.explain(e))?;
        Ok((main, temp))
    }

    fn sync_if_changed(&self, before: (i64, i64)) -> Result<()> {
        if self.schema_version()? != before {
            self.sync_schema()?;
        }
        Ok(())
    }

    fn database_name(&self) -> String {
        self.session.lock().config().database_name.clone()
    }

    /// Journal the change while a transaction is open, otherwise apply it.
    fn record(&self, change: SchemaChange) -> Result<()> {
        let mut session = self.session.lock();
        if self.conn.is_autocommit() {
            session.apply_schema_change(change)?;
        } else {
            session.on_schema_change(change)?;
        }
        Ok(())
    }

    fn explain(&self, e: rusqlite::Error) -> Error {
        let refused = matches!(
            &e,
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::AuthorizationForStatementDenied
        );
        if refused {
            if let Some(denial) = self.session.lock().take_last_denial() {
                warn!(%denial, "statement refused");
                return Error::Denied(denial);
            }
        }
        Error::Sqlite(e)
    }
}

/// Step a statement until it is done, discarding any rows.
fn run_to_completion(stmt: &mut Statement<'_>) -> rusqlite::Result<()> {
    let mut rows = stmt.raw_query();
    while rows.next()?.is_some() {}
    Ok(())
}

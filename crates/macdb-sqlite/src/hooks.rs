//! Authorizer and transaction hooks.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use macdb_core::{AuthorizationEvent, Decision, OperationKind, SharedSession};
use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
use rusqlite::Connection;
use tracing::trace;

/// Translate a SQLite authorizer callback into an event.
pub fn event_from_context<'c>(ctx: &AuthContext<'c>) -> AuthorizationEvent<'c> {
    use OperationKind as Op;

    let (kind, arg1, arg2) = match ctx.action {
        AuthAction::Unknown { code, arg1, arg2 } => (Op::from_code(code), arg1, arg2),
        AuthAction::CreateIndex {
            index_name,
            table_name,
        } => (Op::CreateIndex, Some(index_name), Some(table_name)),
        AuthAction::CreateTable { table_name } => (Op::CreateTable, Some(table_name), None),
        AuthAction::CreateTempIndex {
            index_name,
            table_name,
        } => (Op::CreateTempIndex, Some(index_name), Some(table_name)),
        AuthAction::CreateTempTable { table_name } => (Op::CreateTempTable, Some(table_name), None),
        AuthAction::CreateTempTrigger {
            trigger_name,
            table_name,
        } => (Op::CreateTempTrigger, Some(trigger_name), Some(table_name)),
        AuthAction::CreateTempView { view_name } => (Op::CreateTempView, Some(view_name), None),
        AuthAction::CreateTrigger {
            trigger_name,
            table_name,
        } => (Op::CreateTrigger, Some(trigger_name), Some(table_name)),
        AuthAction::CreateView { view_name } => (Op::CreateView, Some(view_name), None),
        AuthAction::Delete { table_name } => (Op::Delete, Some(table_name), None),
        AuthAction::DropIndex {
            index_name,
            table_name,
        } => (Op::DropIndex, Some(index_name), Some(table_name)),
        AuthAction::DropTable { table_name } => (Op::DropTable, Some(table_name), None),
        AuthAction::DropTempIndex {
            index_name,
            table_name,
        } => (Op::DropTempIndex, Some(index_name), Some(table_name)),
        AuthAction::DropTempTable { table_name } => (Op::DropTempTable, Some(table_name), None),
        AuthAction::DropTempTrigger {
            trigger_name,
            table_name,
        } => (Op::DropTempTrigger, Some(trigger_name), Some(table_name)),
        AuthAction::DropTempView { view_name } => (Op::DropTempView, Some(view_name), None),
        AuthAction::DropTrigger {
            trigger_name,
            table_name,
        } => (Op::DropTrigger, Some(trigger_name), Some(table_name)),
        AuthAction::DropView { view_name } => (Op::DropView, Some(view_name), None),
        AuthAction::Insert { table_name } => (Op::Insert, Some(table_name), None),
        AuthAction::Pragma {
            pragma_name,
            pragma_value,
        } => (Op::Pragma, Some(pragma_name), pragma_value),
        AuthAction::Read {
            table_name,
            column_name,
        } => (Op::Read, Some(table_name), Some(column_name)),
        AuthAction::Select => (Op::Select, None, None),
        AuthAction::Transaction { .. } => (Op::Transaction, None, None),
        AuthAction::Update {
            table_name,
            column_name,
        } => (Op::Update, Some(table_name), Some(column_name)),
        AuthAction::Attach { filename } => (Op::Attach, Some(filename), None),
        AuthAction::Detach { database_name } => (Op::Detach, Some(database_name), None),
        AuthAction::AlterTable {
            database_name,
            table_name,
        } => (Op::AlterTable, Some(database_name), Some(table_name)),
        AuthAction::Reindex { index_name } => (Op::Reindex, Some(index_name), None),
        AuthAction::Analyze { table_name } => (Op::Analyze, Some(table_name), None),
        AuthAction::CreateVtable {
            table_name,
            module_name,
        } => (Op::CreateVtable, Some(table_name), Some(module_name)),
        AuthAction::DropVtable {
            table_name,
            module_name,
        } => (Op::DropVtable, Some(table_name), Some(module_name)),
        AuthAction::Function { function_name } => (Op::Function, None, Some(function_name)),
        AuthAction::Savepoint { savepoint_name, .. } => (Op::Savepoint, None, Some(savepoint_name)),
        AuthAction::Recursive => (Op::Recursive, None, None),
        _ => (Op::Unknown(-1), None, None),
    };

    AuthorizationEvent {
        kind,
        arg1,
        arg2,
        database: ctx.database_name,
    }
}

/// Install the authorizer, commit and rollback hooks on `conn`.
///
/// Callbacks lock the session only for their own duration.
pub(crate) fn install(conn: &Connection, session: &SharedSession) {
    let shared = AssertUnwindSafe(Arc::clone(session));
    conn.authorizer(Some(move |ctx: AuthContext<'_>| {
        let session = &shared;
        let event = event_from_context(&ctx);
        match session.lock().authorize(&event) {
            Decision::Allow => Authorization::Allow,
            Decision::Deny(_) => Authorization::Deny,
        }
    }));

    let shared = Arc::clone(session);
    conn.commit_hook(Some(move || {
        shared.lock().on_commit();
        trace!("commit hook");
        false
    }));

    let shared = Arc::clone(session);
    conn.rollback_hook(Some(move || {
        shared.lock().on_rollback();
        trace!("rollback hook");
    }));
}

//! Label functions callable from SQL.
//!
//! ```sql
//! SELECT label_id_of('system_u:object_r:secret_t:s0');
//! SELECT label_text_of(security_context) FROM people;
//! SELECT * FROM people WHERE check_access(security_context, 'db_tuple', 'select', 'people');
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use macdb_core::SharedSession;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

fn user_error(e: macdb_core::Error) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(Box::new(e))
}

/// Register `label_id_of`, `label_text_of` and `check_access` on `conn`.
pub(crate) fn register(conn: &Connection, session: &SharedSession) -> rusqlite::Result<()> {
    let shared = AssertUnwindSafe(Arc::clone(session));
    conn.create_scalar_function("label_id_of", 1, FunctionFlags::SQLITE_UTF8, move |ctx| {
        let session = &shared;
        let text: String = ctx.get(0)?;
        let id = session.lock().label_id_of(&text).map_err(user_error)?;
        Ok(i64::from(id.get()))
    })?;

    let shared = AssertUnwindSafe(Arc::clone(session));
    conn.create_scalar_function("label_text_of", 1, FunctionFlags::SQLITE_UTF8, move |ctx| {
        let session = &shared;
        let id: i64 = ctx.get(0)?;
        let label = session.lock().label_text_of(id).map_err(user_error)?;
        Ok(label.into_string())
    })?;

    let shared = AssertUnwindSafe(Arc::clone(session));
    conn.create_scalar_function("check_access", 4, FunctionFlags::SQLITE_UTF8, move |ctx| {
        let session = &shared;
        let Some(id) = ctx.get::<Option<i64>>(0)? else {
            // unlabelled rows are never visible
            return Ok(false);
        };
        let class: String = ctx.get(1)?;
        let perm: String = ctx.get(2)?;
        let table: String = ctx.get(3)?;
        session
            .lock()
            .check_access(id, &class, &perm, &table)
            .map_err(user_error)
    })?;

    Ok(())
}

mod connection;
mod migrations;

pub use connection::{is_unique_violation, open_connection};
pub use migrations::{run_migrations, schema_version};

use rusqlite::Connection;

/// Execute a prepared statement, collect all rows with `f`, and return a Vec.
pub(crate) fn collect_rows<T, F>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    f: F,
) -> rusqlite::Result<Vec<T>>
where
    F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, f)?;
    rows.collect()
}

/// Run a `SELECT COUNT(*) … WHERE …` query and return `count > 0`.
pub(crate) fn exists_query(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(count > 0)
}

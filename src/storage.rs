//! Row-level access to the active SQLite database.
//!
//! Uploaded databases carry any subset of three fixed tables, each with the
//! columns PackageName, Uid, Pids, Metrics. Cells are loosely typed (a Uid
//! may arrive as INTEGER or TEXT depending on the producer), so everything
//! is normalized to text on read.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use std::ops::ControlFlow;

/// Fixed source tables, always scanned in this order.
pub const SOURCE_TABLES: [&str; 3] = ["processes1", "processes2", "processes3"];

const ROW_PROJECTION: &str = "SELECT PackageName, Uid, Pids, Metrics FROM ";

/// One unparsed storage row. `pids` is opaque to the pipeline and only
/// surfaced by the debug sample endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RawRow {
    pub package_name: String,
    pub uid: String,
    pub pids: String,
    pub metrics_blob: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub sql: Option<String>,
}

/// Table Catalog: whether the active database carries the named table.
pub fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name=? LIMIT 1")?;
    stmt.exists([name])
}

fn cell_to_string(cell: ValueRef<'_>) -> String {
    match cell {
        ValueRef::Null => String::new(),
        ValueRef::Integer(v) => v.to_string(),
        ValueRef::Real(v) => v.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        package_name: cell_to_string(row.get_ref(0)?),
        uid: cell_to_string(row.get_ref(1)?),
        pids: cell_to_string(row.get_ref(2)?),
        metrics_blob: cell_to_string(row.get_ref(3)?),
    })
}

/// Stream one table's rows in storage order, handing each to `f` until it
/// breaks. The break is reported back so a multi-table scan can stop
/// without touching the remaining tables.
pub fn scan_rows<F>(conn: &Connection, table: &str, mut f: F) -> rusqlite::Result<ControlFlow<()>>
where
    F: FnMut(RawRow) -> ControlFlow<()>,
{
    // Table names come from SOURCE_TABLES, never from user input.
    let mut stmt = conn.prepare(&format!("{ROW_PROJECTION}{table}"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        if f(read_row(row)?).is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }
    Ok(ControlFlow::Continue(()))
}

/// Every table in the active database together with its CREATE statement.
pub fn list_tables(conn: &Connection) -> rusqlite::Result<Vec<TableInfo>> {
    let mut stmt = conn.prepare("SELECT name, sql FROM sqlite_master WHERE type='table'")?;
    let rows = stmt.query_map([], |row| {
        Ok(TableInfo {
            name: row.get(0)?,
            sql: row.get(1)?,
        })
    })?;
    rows.collect()
}

/// A small unprocessed peek at one source table.
pub fn sample_rows(conn: &Connection, table: &str, limit: usize) -> rusqlite::Result<Vec<RawRow>> {
    let mut stmt = conn.prepare(&format!("{ROW_PROJECTION}{table} LIMIT ?"))?;
    let rows = stmt.query_map([limit as i64], |row| read_row(row))?;
    rows.collect()
}

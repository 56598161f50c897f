use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use rusqlite::{Connection, OpenFlags};

use super::DatabaseError;

/// Column order of the document table, as created by `ensure_document_table`.
pub const DOCUMENT_COLUMNS: &[&str] = &[
    "ID",
    "Title",
    "Authors",
    "DOI",
    "Citations",
    "Abstract",
    "Body",
    "Date",
    "Record_Number",
    "Refs",
    "Journal",
    "Source_File",
];

/// Open (or create) a SQLite database at the given path
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    Ok(conn)
}

/// Open an existing database without write access (inspection, ad-hoc queries)
pub fn open_read_only(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch("PRAGMA journal_mode=DELETE;")?;
    Ok(())
}

/// Reject anything that is not a plain SQL identifier.
///
/// Table names are spliced into statements, so only `[A-Za-z_][A-Za-z0-9_]*` passes.
pub fn validate_table_name(name: &str) -> Result<(), DatabaseError> {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let ident = IDENT.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    });
    if ident.is_match(name) {
        Ok(())
    } else {
        Err(DatabaseError::InvalidTableName(name.to_string()))
    }
}

/// Create the document table if it does not exist yet (idempotent)
pub fn ensure_document_table(conn: &Connection, table: &str) -> Result<(), DatabaseError> {
    validate_table_name(table)?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            ID INTEGER PRIMARY KEY,
            Title TEXT,
            Authors TEXT,
            DOI TEXT,
            Citations TEXT,
            Abstract TEXT,
            Body TEXT,
            Date TEXT,
            Record_Number TEXT,
            Refs TEXT,
            Journal TEXT,
            Source_File TEXT
        );"
    ))?;
    Ok(())
}

/// Whether a table with exactly this name exists
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Highest ID in the table, `None` when the table is empty
pub fn max_document_id(conn: &Connection, table: &str) -> Result<Option<i64>, DatabaseError> {
    validate_table_name(table)?;
    let max = conn.query_row(&format!("SELECT MAX(ID) FROM {table}"), [], |row| {
        row.get::<_, Option<i64>>(0)
    })?;
    Ok(max)
}

/// Row count of the table
pub fn count_rows(conn: &Connection, table: &str) -> Result<i64, DatabaseError> {
    validate_table_name(table)?;
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count)
}

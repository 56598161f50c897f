//! Read-only inspection of a document store: structure, counts, samples, and
//! ad-hoc queries for checking what an ingestion run produced.

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;

use super::sqlite::{count_rows, open_read_only, table_exists, validate_table_name};
use super::DatabaseError;

/// Rows shown in the sample section.
const SAMPLE_ROWS: usize = 15;

/// Rows shown in each ranked section.
const TOP_ROWS: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
}

/// Column names plus rows rendered as text.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub record_count: i64,
    pub sample: QueryResult,
    pub unique_authors: i64,
    pub dates: Vec<String>,
    pub journals: Vec<String>,
    pub recent: QueryResult,
    pub longest_abstracts: QueryResult,
}

/// Summarize the document table of the store at `path`.
pub fn inspect_store(path: &Path, table: &str) -> Result<StoreSummary, DatabaseError> {
    validate_table_name(table)?;
    let conn = open_read_only(path)?;
    if !table_exists(&conn, table)? {
        return Err(DatabaseError::TableNotFound(table.to_string()));
    }

    let columns = table_columns(&conn, table)?;
    let record_count = count_rows(&conn, table)?;
    let sample = query(
        &conn,
        &format!("SELECT ID, Title, Authors, Date, Source_File FROM {table} LIMIT {SAMPLE_ROWS}"),
    )?;
    let unique_authors = conn.query_row(
        &format!("SELECT COUNT(DISTINCT Authors) FROM {table}"),
        [],
        |row| row.get::<_, i64>(0),
    )?;
    let dates = single_column(&query(
        &conn,
        &format!("SELECT DISTINCT Date FROM {table} ORDER BY Date"),
    )?);
    let journals = single_column(&query(
        &conn,
        &format!("SELECT DISTINCT Journal FROM {table}"),
    )?);
    let recent = query(
        &conn,
        &format!("SELECT Title, Date FROM {table} ORDER BY Date DESC LIMIT {TOP_ROWS}"),
    )?;
    let longest_abstracts = query(
        &conn,
        &format!(
            "SELECT Title, LENGTH(Abstract) AS AbsLength FROM {table}
             ORDER BY AbsLength DESC LIMIT {TOP_ROWS}"
        ),
    )?;

    Ok(StoreSummary {
        table: table.to_string(),
        columns,
        record_count,
        sample,
        unique_authors,
        dates,
        journals,
        recent,
        longest_abstracts,
    })
}

/// Run a caller-supplied statement against the store at `path`.
///
/// The connection is read-only and statements that would write are refused
/// before execution.
pub fn run_query(path: &Path, sql: &str) -> Result<QueryResult, DatabaseError> {
    let conn = open_read_only(path)?;
    query(&conn, sql)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                declared_type: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn query(conn: &Connection, sql: &str) -> Result<QueryResult, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    if !stmt.readonly() {
        return Err(DatabaseError::NotReadOnly);
    }
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut rendered = Vec::with_capacity(width);
        for idx in 0..width {
            rendered.push(render_value(row.get_ref(idx)?));
        }
        rows.push(rendered);
    }

    Ok(QueryResult { columns, rows })
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".into(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}

fn single_column(result: &QueryResult) -> Vec<String> {
    result
        .rows
        .iter()
        .filter_map(|row| row.first().cloned())
        .collect()
}

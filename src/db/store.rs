//! Persisted document store: one SQLite file, one document table.
//!
//! Owns schema creation, the append-vs-overwrite decision, identifier
//! allocation, and row insertion. Each insert runs in autocommit mode so
//! rows written before a crash stay written.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::sqlite::{
    count_rows, ensure_document_table, max_document_id, open_database, open_memory_database,
    table_exists, validate_table_name,
};
use super::{DatabaseError, StoreError};
use crate::models::DocumentRecord;

/// How the store file was obtained at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOpenMode {
    /// No store existed; a new file was created.
    Created,
    /// An existing store was deleted and recreated.
    Overwritten,
    /// An existing store was opened; allocation continues after its highest ID.
    Appended { next_id: i64 },
    /// An existing store was opened but its highest ID could not be read;
    /// allocation restarts at 1.
    AppendedWithoutMaxId { reason: String },
}

/// Handle over the document store for the duration of one run.
///
/// The connection is released when the handle is dropped, whatever happened before.
pub struct DocumentStore {
    conn: Connection,
    path: PathBuf,
    table: String,
    next_id: i64,
    open_mode: StoreOpenMode,
}

impl DocumentStore {
    /// Create or open the store at `path`.
    ///
    /// With `overwrite`, an existing file is removed first. Otherwise an existing
    /// file is opened and the allocator is seeded at `MAX(ID) + 1` of `table`.
    /// The table is created if absent in every case.
    pub fn initialize(path: &Path, table: &str, overwrite: bool) -> Result<Self, StoreError> {
        validate_table_name(table)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let existed = path.exists();
        if existed && overwrite {
            tracing::info!(path = %path.display(), "Removing existing store");
            std::fs::remove_file(path).map_err(|source| StoreError::Deletion {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let conn = open_database(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let (next_id, open_mode) = match (existed, overwrite) {
            (false, _) => (1, StoreOpenMode::Created),
            (true, true) => (1, StoreOpenMode::Overwritten),
            (true, false) => match read_next_id(&conn, table) {
                Ok(next_id) => (next_id, StoreOpenMode::Appended { next_id }),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Could not read max ID from existing store, starting at 1"
                    );
                    (
                        1,
                        StoreOpenMode::AppendedWithoutMaxId {
                            reason: e.to_string(),
                        },
                    )
                }
            },
        };

        ensure_document_table(&conn, table).map_err(|source| StoreError::Schema {
            table: table.to_string(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            table,
            next_id,
            mode = ?open_mode,
            "Document store ready"
        );

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            table: table.to_string(),
            next_id,
            open_mode,
        })
    }

    /// Fresh in-memory store (for testing)
    pub fn in_memory(table: &str) -> Result<Self, StoreError> {
        let conn = open_memory_database()?;
        ensure_document_table(&conn, table).map_err(|source| StoreError::Schema {
            table: table.to_string(),
            source,
        })?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
            table: table.to_string(),
            next_id: 1,
            open_mode: StoreOpenMode::Created,
        })
    }

    /// Return the current allocator value and advance it.
    ///
    /// Single owner per run; not meant for concurrent callers.
    pub fn next_identifier(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The value the next call to `next_identifier` will return.
    pub fn peek_identifier(&self) -> i64 {
        self.next_id
    }

    /// Insert one record; commits immediately.
    pub fn insert(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} (ID, Title, Authors, DOI, Citations, Abstract, Body, Date,
                     Record_Number, Refs, Journal, Source_File)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    self.table
                ),
                params![
                    record.id,
                    record.title,
                    record.authors,
                    record.doi,
                    record.citations,
                    record.abstract_text,
                    record.body,
                    record.date,
                    record.record_number,
                    record.refs,
                    record.journal,
                    record.source_file,
                ],
            )
            .map_err(|source| StoreError::Write {
                id: record.id,
                source,
            })?;
        Ok(())
    }

    /// Total rows in the table; `None` (logged) if the count cannot be computed.
    pub fn final_count(&self) -> Option<i64> {
        match count_rows(&self.conn, &self.table) {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(table = %self.table, error = %e, "Could not count store rows");
                None
            }
        }
    }

    /// Fetch a record by ID.
    pub fn get(&self, id: i64) -> Result<Option<DocumentRecord>, DatabaseError> {
        let result = self.conn.query_row(
            &format!(
                "SELECT ID, Title, Authors, DOI, Citations, Abstract, Body, Date,
                 Record_Number, Refs, Journal, Source_File
                 FROM {} WHERE ID = ?1",
                self.table
            ),
            params![id],
            |row| {
                Ok(DocumentRecord {
                    id: row.get(0)?,
                    title: text_column(row, 1)?,
                    authors: text_column(row, 2)?,
                    doi: text_column(row, 3)?,
                    citations: text_column(row, 4)?,
                    abstract_text: text_column(row, 5)?,
                    body: text_column(row, 6)?,
                    date: text_column(row, 7)?,
                    record_number: text_column(row, 8)?,
                    refs: text_column(row, 9)?,
                    journal: text_column(row, 10)?,
                    source_file: text_column(row, 11)?,
                })
            },
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All IDs in ascending order.
    pub fn ids(&self) -> Result<Vec<i64>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT ID FROM {} ORDER BY ID", self.table))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn open_mode(&self) -> &StoreOpenMode {
        &self.open_mode
    }

    /// Release the handle, surfacing a close failure instead of swallowing it in `Drop`.
    pub fn close(self) -> Result<(), StoreError> {
        let path = self.path;
        self.conn.close().map_err(|(_, e)| StoreError::Open {
            path,
            source: DatabaseError::Sqlite(e),
        })
    }
}

/// Read `MAX(ID) + 1` from an existing table; 1 when the table is absent or empty.
fn read_next_id(conn: &Connection, table: &str) -> Result<i64, DatabaseError> {
    if !table_exists(conn, table)? {
        return Ok(1);
    }
    Ok(max_document_id(conn, table)?.map_or(1, |max| max + 1))
}

/// Text columns written by other tools may be NULL; map those to "".
fn text_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, title: &str) -> DocumentRecord {
        DocumentRecord {
            id,
            title: title.into(),
            source_file: "paper.pdf".into(),
            ..Default::default()
        }
    }

    #[test]
    fn fresh_store_allocates_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.db");

        let mut store = DocumentStore::initialize(&path, "document_table", false).unwrap();
        assert_eq!(store.open_mode(), &StoreOpenMode::Created);
        assert_eq!(store.next_identifier(), 1);
        assert_eq!(store.next_identifier(), 2);
        assert_eq!(store.peek_identifier(), 3);
    }

    #[test]
    fn append_continues_after_max_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.db");

        {
            let store = DocumentStore::initialize(&path, "document_table", true).unwrap();
            store.insert(&record(1, "A")).unwrap();
            store.insert(&record(5, "B")).unwrap();
            store.close().unwrap();
        }

        let mut store = DocumentStore::initialize(&path, "document_table", false).unwrap();
        assert_eq!(store.open_mode(), &StoreOpenMode::Appended { next_id: 6 });
        assert_eq!(store.next_identifier(), 6);
        assert_eq!(store.final_count(), Some(2));
    }

    #[test]
    fn overwrite_discards_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.db");

        {
            let store = DocumentStore::initialize(&path, "document_table", false).unwrap();
            store.insert(&record(1, "A")).unwrap();
            store.insert(&record(2, "B")).unwrap();
        }

        let mut store = DocumentStore::initialize(&path, "document_table", true).unwrap();
        assert_eq!(store.open_mode(), &StoreOpenMode::Overwritten);
        assert_eq!(store.next_identifier(), 1);
        assert_eq!(store.final_count(), Some(0));
    }

    #[test]
    fn append_to_store_without_table_starts_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE other (x INTEGER);").unwrap();
        }

        let mut store = DocumentStore::initialize(&path, "document_table", false).unwrap();
        assert_eq!(store.open_mode(), &StoreOpenMode::Appended { next_id: 1 });
        assert_eq!(store.next_identifier(), 1);
    }

    #[test]
    fn unreadable_max_id_falls_back_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.db");
        {
            // Same name, no ID column: MAX(ID) fails.
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE document_table (Title TEXT);").unwrap();
        }

        let mut store = DocumentStore::initialize(&path, "document_table", false).unwrap();
        assert!(matches!(
            store.open_mode(),
            StoreOpenMode::AppendedWithoutMaxId { .. }
        ));
        assert_eq!(store.next_identifier(), 1);
    }

    #[test]
    fn initialize_creates_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out").join("papers.db");
        let store = DocumentStore::initialize(&path, "document_table", false).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn invalid_table_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.db");
        let result = DocumentStore::initialize(&path, "docs;--", false);
        assert!(matches!(
            result,
            Err(StoreError::Database(DatabaseError::InvalidTableName(_)))
        ));
    }

    #[test]
    fn duplicate_id_is_write_error() {
        let store = DocumentStore::in_memory("document_table").unwrap();
        store.insert(&record(1, "A")).unwrap();
        let err = store.insert(&record(1, "again")).unwrap_err();
        assert!(matches!(err, StoreError::Write { id: 1, .. }));
        assert_eq!(store.final_count(), Some(1));
    }

    #[test]
    fn inserted_record_round_trips() {
        let store = DocumentStore::in_memory("document_table").unwrap();
        let rec = DocumentRecord {
            id: 3,
            title: "Deep Learning".into(),
            authors: "Ada Lovelace; Alan Turing".into(),
            doi: "10.1000/xyz".into(),
            citations: "12".into(),
            abstract_text: "Short".into(),
            body: "Long body".into(),
            date: "2020-01-01".into(),
            record_number: String::new(),
            refs: " * Index: 0 | Title: X\\|".into(),
            journal: "Nature".into(),
            source_file: "dl.pdf".into(),
        };
        store.insert(&rec).unwrap();
        assert_eq!(store.get(3).unwrap(), Some(rec));
        assert_eq!(store.get(4).unwrap(), None);
        assert_eq!(store.ids().unwrap(), vec![3]);
    }
}

pub mod inspect;
pub mod sqlite;
pub mod store;

pub use inspect::*;
pub use sqlite::*;
pub use store::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Only read-only statements are allowed")]
    NotReadOnly,
}

/// Failures of the persisted document store.
///
/// `Deletion`, `CreateDir`, `Open` and `Schema` end a run; `Write` only drops
/// the record being inserted.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Could not create store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error removing existing database {path}: {source}")]
    Deletion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not open database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: DatabaseError,
    },

    #[error("Error creating/ensuring table '{table}': {source}")]
    Schema {
        table: String,
        #[source]
        source: DatabaseError,
    },

    #[error("Failed to insert record {id}: {source}")]
    Write {
        id: i64,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

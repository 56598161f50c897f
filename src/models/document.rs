use serde::{Deserialize, Serialize};

/// One persisted document row.
///
/// Every text field is non-null; absent values are empty strings. `citations`
/// stays text because the extraction service may hand back placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub title: String,
    pub authors: String,
    pub doi: String,
    pub citations: String,
    pub abstract_text: String,
    pub body: String,
    pub date: String,
    pub record_number: String,
    pub refs: String,
    pub journal: String,
    pub source_file: String,
}

//! Record Normalizer: raw extracted or parsed fields into a `DocumentRecord`.

use super::extraction::RawExtractionResult;
use super::text_records::ParsedTextRecord;
use crate::models::DocumentRecord;

/// Build a record from an extraction result. PDFs carry no record number.
pub fn from_extraction(raw: &RawExtractionResult, source_file: &str, id: i64) -> DocumentRecord {
    DocumentRecord {
        id,
        title: raw.title.clone(),
        authors: raw.authors.clone(),
        doi: raw.doi.clone(),
        citations: raw.citations.clone(),
        abstract_text: raw.abstract_text.clone(),
        body: raw.body.clone(),
        date: raw.date.clone(),
        record_number: String::new(),
        refs: raw.refs.clone(),
        journal: raw.journal.clone(),
        source_file: source_file.to_string(),
    }
}

/// Build a record from one parsed text block; unset keys become empty strings.
pub fn from_text_record(record: &ParsedTextRecord, source_file: &str, id: i64) -> DocumentRecord {
    DocumentRecord {
        id,
        title: record.get("Title").to_string(),
        authors: record.get("Authors").to_string(),
        doi: record.get("DOI").to_string(),
        citations: record.get("Citations").to_string(),
        abstract_text: record.get("Abstract").to_string(),
        body: record.get("Body").to_string(),
        date: record.get("Date").to_string(),
        record_number: record.get("Record_Number").to_string(),
        refs: record.get("Refs").to_string(),
        journal: record.get("Journal").to_string(),
        source_file: source_file.to_string(),
    }
}

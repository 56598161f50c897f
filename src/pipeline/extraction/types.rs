use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Sentinels stored when the service omits a field.
pub const NO_TITLE: &str = "No Title";
pub const NO_AUTHORS: &str = "No Authors";
pub const NO_DOI: &str = "No DOI";
pub const NO_ABSTRACT: &str = "No Abstract";
pub const NO_BODY: &str = "No Body";
pub const NO_DATE: &str = "No Date";
pub const NO_JOURNAL: &str = "No Journal";

/// Named boolean options forwarded to the extraction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOptions {
    pub generate_ids: bool,
    pub consolidate_header: bool,
    pub consolidate_citations: bool,
    pub include_raw_citations: bool,
    pub include_raw_affiliations: bool,
    pub layout_coordinates: bool,
    pub segment_sentences: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            generate_ids: true,
            consolidate_header: true,
            consolidate_citations: true,
            include_raw_citations: true,
            include_raw_affiliations: true,
            layout_coordinates: true,
            segment_sentences: true,
        }
    }
}

impl ExtractionOptions {
    /// Form fields for the full-text endpoint, as `"1"`/`"0"` flags.
    /// Layout coordinates are sent separately, one field per element.
    pub fn form_flags(&self) -> [(&'static str, &'static str); 6] {
        let flag = |b: bool| if b { "1" } else { "0" };
        [
            ("generateIDs", flag(self.generate_ids)),
            ("consolidateHeader", flag(self.consolidate_header)),
            ("consolidateCitations", flag(self.consolidate_citations)),
            ("includeRawCitations", flag(self.include_raw_citations)),
            ("includeRawAffiliations", flag(self.include_raw_affiliations)),
            ("segmentSentences", flag(self.segment_sentences)),
        ]
    }
}

/// Raw answer of the service: HTTP-like status plus the markup (or error text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: String,
}

/// Black-box document-structure extraction service.
pub trait ExtractionService {
    /// Where the service lives, for status messages.
    fn endpoint(&self) -> String;

    /// Probe the service; fails with `ServiceUnavailable` when it cannot be reached.
    fn check_alive(&self) -> Result<(), ExtractionError>;

    /// Submit one document for full-text processing.
    fn process_fulltext(
        &self,
        path: &Path,
        options: &ExtractionOptions,
    ) -> Result<ServiceResponse, ExtractionError>;
}

/// Fields extracted from one PDF, sentinels already substituted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExtractionResult {
    pub title: String,
    pub authors: String,
    pub doi: String,
    pub citations: String,
    pub abstract_text: String,
    pub body: String,
    pub date: String,
    pub journal: String,
    pub refs: String,
    /// Data-quality notes for the status log (e.g. bibliography parse failure).
    pub warnings: Vec<String>,
}

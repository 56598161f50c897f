//! Extraction Service Adapter.
//!
//! Wraps the external document-structure-extraction service (GROBID-compatible
//! HTTP API), turns its TEI response into a `RawExtractionResult`, and maps its
//! failures into `ExtractionError`.

pub mod adapter;
pub mod grobid;
pub mod references;
pub mod tei;
pub mod types;

pub use adapter::PdfExtractor;
pub use grobid::{GrobidClient, MockExtractionService};
pub use references::{
    check_bibliography, format_bibliography, NO_REFERENCES, REFERENCES_PARSE_ERROR,
};
pub use tei::{parse_document, Biblio, TeiDocument, TeiHeader};
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The service could not be reached at startup; PDF processing is disabled for the run.
    #[error("Extraction service unavailable at {url}: {reason}")]
    ServiceUnavailable { url: String, reason: String },

    /// One document came back with a non-success status or no content.
    #[error("Extraction failed for {file} (status {status}) or no text extracted")]
    Failure { file: String, status: u16 },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed TEI markup: {0}")]
    Markup(String),

    /// A bibliography entry carries no usable data. Only the `Refs` field is affected.
    #[error("Bibliography entry {index} has neither a title nor authors")]
    EmptyCitation { index: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    /// Transport-level failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::HttpClient(_))
    }
}

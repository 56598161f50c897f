use std::path::Path;

use super::references::{
    check_bibliography, format_bibliography, NO_REFERENCES, REFERENCES_PARSE_ERROR,
};
use super::tei::parse_document;
use super::types::{
    ExtractionOptions, ExtractionService, RawExtractionResult, ServiceResponse, NO_ABSTRACT,
    NO_AUTHORS, NO_BODY, NO_DATE, NO_DOI, NO_JOURNAL, NO_TITLE,
};
use super::ExtractionError;

/// Turns one PDF into a `RawExtractionResult` through an extraction service.
/// Uses a trait object for the service, enabling dependency injection.
pub struct PdfExtractor<'a> {
    service: &'a dyn ExtractionService,
    options: ExtractionOptions,
}

impl<'a> PdfExtractor<'a> {
    pub fn new(service: &'a dyn ExtractionService, options: ExtractionOptions) -> Self {
        Self { service, options }
    }

    pub fn extract(&self, path: &Path) -> Result<RawExtractionResult, ExtractionError> {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        tracing::debug!(file = %file, "Submitting document to extraction service");
        let response = self.service.process_fulltext(path, &self.options)?;
        map_response(&file, &response)
    }
}

/// Map a service answer into raw fields, substituting sentinels for absent values.
pub fn map_response(
    file: &str,
    response: &ServiceResponse,
) -> Result<RawExtractionResult, ExtractionError> {
    if response.status != 200 || response.body.trim().is_empty() {
        return Err(ExtractionError::Failure {
            file: file.to_string(),
            status: response.status,
        });
    }

    let doc = parse_document(&response.body)?;
    let header = doc.header;

    let authors = if header.authors.is_empty() {
        NO_AUTHORS.to_string()
    } else {
        header.authors.join("; ")
    };

    let mut warnings = Vec::new();
    let refs = match check_bibliography(&doc.citations) {
        Ok(()) if doc.citations.is_empty() => NO_REFERENCES.to_string(),
        Ok(()) => format_bibliography(&doc.citations),
        Err(e) => {
            tracing::warn!(file = %file, error = %e, "Bibliography could not be parsed");
            warnings.push(format!("Citation parsing error for {file}: {e}"));
            REFERENCES_PARSE_ERROR.to_string()
        }
    };

    Ok(RawExtractionResult {
        title: header.title.unwrap_or_else(|| NO_TITLE.to_string()),
        authors,
        doi: header.doi.unwrap_or_else(|| NO_DOI.to_string()),
        citations: doc.citations.len().to_string(),
        abstract_text: doc.abstract_text.unwrap_or_else(|| NO_ABSTRACT.to_string()),
        body: doc.body.unwrap_or_else(|| NO_BODY.to_string()),
        date: header.date.unwrap_or_else(|| NO_DATE.to_string()),
        journal: header.journal.unwrap_or_else(|| NO_JOURNAL.to_string()),
        refs,
        warnings,
    })
}

use super::tei::Biblio;
use super::ExtractionError;

/// Stored in `Refs` when the document has no bibliography.
pub const NO_REFERENCES: &str = "No references found by parser";

/// Stored in `Refs` when the bibliography could not be parsed.
pub const REFERENCES_PARSE_ERROR: &str = "Error parsing references";

/// Render a bibliography in the single-line format downstream readers split on.
///
/// Each entry looks like
/// ` * Index: 0 | Title: .. | Authors: A; B | Date: .. | Volume: .. | Pages: .. | Journal: .. | Doi: ..\|`
/// and entries are joined with `*`. Missing values print as `None`.
pub fn format_bibliography(biblios: &[Biblio]) -> String {
    biblios
        .iter()
        .map(format_entry)
        .collect::<Vec<_>>()
        .join("*")
}

/// Reject a bibliography with an entry that has neither a title nor any author.
///
/// Such entries come from citation strings the service could not segment; the
/// rendered list would carry nothing but `None` for them.
pub fn check_bibliography(biblios: &[Biblio]) -> Result<(), ExtractionError> {
    match biblios
        .iter()
        .find(|b| b.title.is_none() && b.authors.is_empty())
    {
        Some(b) => Err(ExtractionError::EmptyCitation { index: b.index }),
        None => Ok(()),
    }
}

fn format_entry(b: &Biblio) -> String {
    format!(
        " * Index: {} | Title: {} | Authors: {} | Date: {} | Volume: {} | Pages: {} | Journal: {} | Doi: {}\\|",
        b.index,
        or_none(&b.title),
        b.authors.join("; "),
        or_none(&b.date),
        or_none(&b.volume),
        or_none(&b.pages),
        or_none(&b.journal),
        or_none(&b.doi),
    )
}

fn or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

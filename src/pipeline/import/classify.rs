use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::format::{FileKind, ProcessingMode};
use super::ImportError;

/// One file selected for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub path: PathBuf,
    pub name: String,
    pub kind: FileKind,
}

impl InputFile {
    fn new(path: PathBuf, kind: FileKind) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name, kind }
    }
}

/// Select the files a run will process.
///
/// A directory yields its PDFs (when the mode extracts) followed by its text
/// files (when the mode parses text), each group sorted by file name. A single
/// file must match the mode. Subdirectories are not descended into.
pub fn classify_input(input: &Path, mode: ProcessingMode) -> Result<Vec<InputFile>, ImportError> {
    if input.is_file() {
        return match FileKind::from_path(input) {
            Some(kind) if mode.accepts(kind) => Ok(vec![InputFile::new(input.to_path_buf(), kind)]),
            _ => Err(ImportError::UnsupportedFile {
                path: input.to_path_buf(),
                mode,
            }),
        };
    }

    if !input.is_dir() {
        return Err(ImportError::NotFound(input.to_path_buf()));
    }

    let entries = std::fs::read_dir(input)?.map(|entry| entry.map(|e| e.path()));
    let files = select_entries(entries, mode);
    if files.is_empty() {
        return Err(ImportError::NoCompatibleFiles);
    }

    tracing::debug!(
        input = %input.display(),
        mode = mode.as_str(),
        files = files.len(),
        "Classified input directory"
    );
    Ok(files)
}

/// Order directory entries PDFs first, then text files. Entries that cannot be
/// read are skipped with a warning.
fn select_entries(
    entries: impl IntoIterator<Item = std::io::Result<PathBuf>>,
    mode: ProcessingMode,
) -> Vec<InputFile> {
    let mut pdfs = Vec::new();
    let mut texts = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        match FileKind::from_path(&path) {
            Some(FileKind::Pdf) if mode.accepts(FileKind::Pdf) => {
                pdfs.push(InputFile::new(path, FileKind::Pdf))
            }
            Some(FileKind::Text) if mode.accepts(FileKind::Text) => {
                texts.push(InputFile::new(path, FileKind::Text))
            }
            _ => {}
        }
    }

    pdfs.sort_by(|a, b| a.name.cmp(&b.name));
    texts.sort_by(|a, b| a.name.cmp(&b.name));
    pdfs.extend(texts);
    pdfs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    fn names(files: &[InputFile]) -> Vec<&str> {
        files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn directory_both_lists_pdfs_then_texts_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "z.pdf", "a.txt", "m.PDF", "ignored.docx"] {
            touch(dir.path(), name);
        }
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let files = classify_input(dir.path(), ProcessingMode::Both).unwrap();
        assert_eq!(names(&files), vec!["m.PDF", "z.pdf", "a.txt", "b.txt"]);
        assert_eq!(files[0].kind, FileKind::Pdf);
        assert_eq!(files[2].kind, FileKind::Text);
    }

    #[test]
    fn directory_respects_mode() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "p.pdf");
        touch(dir.path(), "t.txt");

        let pdf_only = classify_input(dir.path(), ProcessingMode::Extraction).unwrap();
        assert_eq!(names(&pdf_only), vec!["p.pdf"]);

        let text_only = classify_input(dir.path(), ProcessingMode::Text).unwrap();
        assert_eq!(names(&text_only), vec!["t.txt"]);
    }

    #[test]
    fn no_matching_files_is_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "p.pdf");
        let err = classify_input(dir.path(), ProcessingMode::Text).unwrap_err();
        assert!(matches!(err, ImportError::NoCompatibleFiles));
    }

    #[test]
    fn single_file_must_match_mode() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes.txt");
        let path = dir.path().join("notes.txt");

        let files = classify_input(&path, ProcessingMode::Both).unwrap();
        assert_eq!(names(&files), vec!["notes.txt"]);

        let err = classify_input(&path, ProcessingMode::Extraction).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFile { .. }));
    }

    #[test]
    fn unknown_extension_single_file_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "slides.pptx");
        let err = classify_input(&dir.path().join("slides.pptx"), ProcessingMode::Both).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFile { .. }));
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = classify_input(&dir.path().join("nope"), ProcessingMode::Both).unwrap_err();
        assert!(matches!(err, ImportError::NotFound(_)));
    }

    #[test]
    fn unreadable_entry_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.txt");
        touch(dir.path(), "a.pdf");
        let entries = vec![
            Ok(dir.path().join("b.txt")),
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")),
            Ok(dir.path().join("a.pdf")),
        ];

        let files = select_entries(entries, ProcessingMode::Both);
        assert_eq!(names(&files), vec!["a.pdf", "b.txt"]);
    }
}

//! Ingestion Orchestrator.
//!
//! Drives one run: classify input → open store → per file
//! (extract or parse → normalize → persist) → finalize.
//!
//! Per-file failures land in the status log and the run moves on. Only
//! input classification and store initialization end a run early.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::DEFAULT_TABLE_NAME;
use crate::db::{DocumentStore, StoreError, StoreOpenMode};
use crate::pipeline::extraction::{
    ExtractionError, ExtractionOptions, ExtractionService, PdfExtractor,
};
use crate::pipeline::import::{classify_input, FileKind, ImportError, InputFile, ProcessingMode};
use crate::pipeline::normalize::{from_extraction, from_text_record};
use crate::pipeline::text_records::{parse_text_file, TextParseError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Conditions that end a run before or instead of processing files.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Input(#[from] ImportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why one file (or one record of it) was not stored.
#[derive(Debug, thiserror::Error)]
pub enum FileFailure {
    #[error("extraction service unavailable, PDF skipped")]
    ServiceDisabled,

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    TextParse(#[from] TextParseError),

    #[error(transparent)]
    Persist(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Request / report types
// ---------------------------------------------------------------------------

/// Parameters of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Store file stem; the store lives at `output_dir/{store_name}.db`.
    pub store_name: String,
    pub table: String,
    pub mode: ProcessingMode,
    pub overwrite: bool,
    pub options: ExtractionOptions,
}

impl IngestRequest {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, store_name: &str) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            store_name: store_name.to_string(),
            table: DEFAULT_TABLE_NAME.to_string(),
            mode: ProcessingMode::Both,
            overwrite: false,
            options: ExtractionOptions::default(),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        let stem = self
            .store_name
            .strip_suffix(".db")
            .unwrap_or(&self.store_name);
        self.output_dir.join(format!("{stem}.db"))
    }
}

/// What happened to one input file.
#[derive(Debug)]
pub struct FileOutcome {
    pub file: String,
    pub kind: FileKind,
    /// IDs of the records stored from this file.
    pub stored_ids: Vec<i64>,
    pub failures: Vec<FileFailure>,
}

impl FileOutcome {
    fn new(file: &InputFile) -> Self {
        Self {
            file: file.name.clone(),
            kind: file.kind,
            stored_ids: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.stored_ids.is_empty() && self.failures.is_empty()
    }
}

/// Result of a run: status log, per-file outcomes, and the store path when
/// the run got far enough to have one.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status_log: Vec<String>,
    pub store_path: Option<PathBuf>,
    pub outcomes: Vec<FileOutcome>,
    pub final_count: Option<i64>,
    pub cancelled: bool,
    /// Set when the run ended early.
    pub error: Option<IngestError>,
}

impl RunReport {
    /// Status log as one newline-separated string.
    pub fn joined(&self) -> String {
        self.status_log.join("\n")
    }

    pub fn stored_records(&self) -> usize {
        self.outcomes.iter().map(|o| o.stored_ids.len()).sum()
    }

    pub fn failed_files(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.failures.is_empty())
    }
}

/// Cooperative cancellation, checked before each file.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress callback: fraction done in `[0, 1]` and a label.
pub type ProgressFn<'a> = &'a dyn Fn(f32, &str);

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs ingestion against an injected extraction service.
pub struct Ingestor<'a> {
    service: &'a dyn ExtractionService,
}

impl<'a> Ingestor<'a> {
    pub fn new(service: &'a dyn ExtractionService) -> Self {
        Self { service }
    }

    pub fn run(
        &self,
        request: &IngestRequest,
        progress: Option<ProgressFn<'_>>,
        cancel: Option<&CancelFlag>,
    ) -> RunReport {
        let mut run = RunState::new();
        tracing::info!(
            run_id = %run.run_id,
            input = %request.input.display(),
            mode = request.mode.as_str(),
            overwrite = request.overwrite,
            "Starting ingestion run"
        );

        let files = match classify_input(&request.input, request.mode) {
            Ok(files) => files,
            Err(e) => return run.abort(e.into()),
        };

        let store_path = request.store_path();
        if store_path.exists() {
            if request.overwrite {
                run.log(format!("Overwriting existing database: {}", store_path.display()));
            } else {
                run.log(format!("Appending to existing database: {}", store_path.display()));
            }
        }

        let mut store = match DocumentStore::initialize(&store_path, &request.table, request.overwrite) {
            Ok(store) => store,
            Err(e) => return run.abort(e.into()),
        };
        if let StoreOpenMode::AppendedWithoutMaxId { reason } = store.open_mode() {
            run.log(format!(
                "Could not read max ID from '{}' ({reason}); starting IDs at 1",
                request.table
            ));
        }
        run.log(format!(
            "Ensured table '{}' exists in {}",
            request.table,
            store_path.display()
        ));

        let service_ready = if files.iter().any(|f| f.kind == FileKind::Pdf) {
            self.init_service(&mut run)
        } else {
            false
        };
        let extractor = PdfExtractor::new(self.service, request.options);

        let total = files.len();
        for (i, file) in files.iter().enumerate() {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                tracing::warn!(run_id = %run.run_id, processed = i, total, "Run cancelled");
                run.log(format!("Run cancelled after {i} of {total} files"));
                run.cancelled = true;
                break;
            }

            if let Some(progress) = progress {
                progress(
                    i as f32 / total as f32,
                    &format!("Processing {} ({}/{})", file.name, i + 1, total),
                );
            }
            run.log(format!("Processing {}...", file.name));

            let outcome = match file.kind {
                FileKind::Pdf => self.ingest_pdf(file, service_ready, &extractor, &mut store, &mut run),
                FileKind::Text => self.ingest_text(file, &mut store, &mut run),
            };
            run.outcomes.push(outcome);
        }

        let final_count = store.final_count();
        match final_count {
            Some(n) => run.log(format!("Total records in '{}': {n}", request.table)),
            None => run.log("Error getting final count from DB.".to_string()),
        }
        if let Err(e) = store.close() {
            tracing::warn!(error = %e, "Failed to close document store");
            run.log(format!("Warning: {e}"));
        }

        if let Some(progress) = progress {
            progress(1.0, "Processing complete.");
        }

        run.finish(store_path, final_count)
    }

    /// Probe the service once per run. A failure disables PDF processing.
    fn init_service(&self, run: &mut RunState) -> bool {
        match self.service.check_alive() {
            Ok(()) => {
                run.log(format!(
                    "Extraction service initialized ({})",
                    self.service.endpoint()
                ));
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Extraction service unavailable, skipping PDFs");
                run.log(format!(
                    "Extraction service initialization failed: {e}. PDF processing will be skipped."
                ));
                false
            }
        }
    }

    fn ingest_pdf(
        &self,
        file: &InputFile,
        service_ready: bool,
        extractor: &PdfExtractor<'_>,
        store: &mut DocumentStore,
        run: &mut RunState,
    ) -> FileOutcome {
        let mut outcome = FileOutcome::new(file);

        if !service_ready {
            run.log(format!("Skipping PDF {}: extraction service unavailable", file.name));
            outcome.failures.push(FileFailure::ServiceDisabled);
            return outcome;
        }

        let raw = match extractor.extract(&file.path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "PDF extraction failed");
                run.log(format!("Error processing PDF {}: {e}", file.name));
                outcome.failures.push(e.into());
                return outcome;
            }
        };
        for warning in &raw.warnings {
            run.log(warning.clone());
        }

        let record = from_extraction(&raw, &file.name, store.next_identifier());
        match store.insert(&record) {
            Ok(()) => {
                tracing::info!(file = %file.name, id = record.id, "Stored PDF record");
                run.log(format!("Successfully processed and stored PDF: {}", file.name));
                outcome.stored_ids.push(record.id);
            }
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "Failed to store PDF record");
                run.log(format!("Error processing PDF {}: {e}", file.name));
                outcome.failures.push(e.into());
            }
        }
        outcome
    }

    fn ingest_text(
        &self,
        file: &InputFile,
        store: &mut DocumentStore,
        run: &mut RunState,
    ) -> FileOutcome {
        let mut outcome = FileOutcome::new(file);

        let parsed = match parse_text_file(&file.path) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "Text file unreadable");
                run.log(format!("Error processing TXT {}: {e}", file.name));
                outcome.failures.push(e.into());
                return outcome;
            }
        };

        if parsed.untitled_blocks > 0 {
            run.log(format!(
                "Skipped {} block(s) without Title in {}",
                parsed.untitled_blocks, file.name
            ));
        }

        if parsed.records.is_empty() {
            run.log(format!("No records found or parsed from TXT: {}", file.name));
            return outcome;
        }

        for text_record in &parsed.records {
            let record = from_text_record(text_record, &file.name, store.next_identifier());
            match store.insert(&record) {
                Ok(()) => outcome.stored_ids.push(record.id),
                Err(e) => {
                    tracing::warn!(file = %file.name, error = %e, "Failed to store text record");
                    run.log(format!("Error storing record from TXT {}: {e}", file.name));
                    outcome.failures.push(e.into());
                }
            }
        }

        if !outcome.stored_ids.is_empty() {
            tracing::info!(
                file = %file.name,
                records = outcome.stored_ids.len(),
                "Stored text records"
            );
            run.log(format!(
                "Successfully processed and stored TXT: {} ({} records)",
                file.name,
                outcome.stored_ids.len()
            ));
        }
        outcome
    }
}

/// Mutable bookkeeping for one run.
struct RunState {
    run_id: String,
    started_at: DateTime<Utc>,
    status_log: Vec<String>,
    outcomes: Vec<FileOutcome>,
    cancelled: bool,
}

impl RunState {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            status_log: Vec::new(),
            outcomes: Vec::new(),
            cancelled: false,
        }
    }

    fn log(&mut self, line: String) {
        tracing::debug!(run_id = %self.run_id, status = %line);
        self.status_log.push(line);
    }

    fn abort(mut self, error: IngestError) -> RunReport {
        tracing::error!(run_id = %self.run_id, error = %error, "Ingestion run failed");
        self.log(error.to_string());
        self.into_report(None, None, Some(error))
    }

    fn finish(self, store_path: PathBuf, final_count: Option<i64>) -> RunReport {
        tracing::info!(
            run_id = %self.run_id,
            files = self.outcomes.len(),
            final_count = ?final_count,
            cancelled = self.cancelled,
            "Ingestion run finished"
        );
        self.into_report(Some(store_path), final_count, None)
    }

    fn into_report(
        self,
        store_path: Option<PathBuf>,
        final_count: Option<i64>,
        error: Option<IngestError>,
    ) -> RunReport {
        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            status_log: self.status_log,
            store_path,
            outcomes: self.outcomes,
            final_count,
            cancelled: self.cancelled,
            error,
        }
    }
}

/// Shorthand for a run over `input` with defaults and no callbacks.
pub fn ingest(
    service: &dyn ExtractionService,
    input: &Path,
    output_dir: &Path,
    store_name: &str,
    mode: ProcessingMode,
    overwrite: bool,
) -> RunReport {
    let request = IngestRequest {
        mode,
        overwrite,
        ..IngestRequest::new(input, output_dir, store_name)
    };
    Ingestor::new(service).run(&request, None, None)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::pipeline::extraction::tei::tests::SAMPLE_TEI;
    use crate::pipeline::extraction::MockExtractionService;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn store_path_appends_db_extension_once() {
        let req = IngestRequest::new("in", "/out", "papers");
        assert_eq!(req.store_path(), PathBuf::from("/out/papers.db"));
        let req = IngestRequest::new("in", "/out", "papers.db");
        assert_eq!(req.store_path(), PathBuf::from("/out/papers.db"));
    }

    #[test]
    fn text_only_run_stores_records() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(input.path(), "a.txt", "Title: One\n\nTitle: Two\nAbstract: Abs");

        let mock = MockExtractionService::new(SAMPLE_TEI);
        let report = ingest(&mock, input.path(), output.path(), "db", ProcessingMode::Text, true);

        assert!(report.error.is_none());
        assert_eq!(report.store_path, Some(output.path().join("db.db")));
        assert_eq!(report.final_count, Some(2));
        assert_eq!(report.outcomes[0].stored_ids, vec![1, 2]);
        assert!(report
            .status_log
            .contains(&"Successfully processed and stored TXT: a.txt (2 records)".to_string()));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn service_is_not_checked_without_pdfs() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(input.path(), "a.txt", "Title: One");

        let mock = MockExtractionService::unreachable();
        let report = ingest(&mock, input.path(), output.path(), "db", ProcessingMode::Both, true);
        assert!(!report.joined().contains("Extraction service"));
        assert_eq!(report.final_count, Some(1));
    }

    #[test]
    fn unreachable_service_skips_pdfs_but_keeps_text() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(input.path(), "p.pdf", "%PDF-1.4");
        write(input.path(), "n.txt", "Title: Note");

        let mock = MockExtractionService::unreachable();
        let report = ingest(&mock, input.path(), output.path(), "db", ProcessingMode::Both, true);

        assert!(report.joined().contains("PDF processing will be skipped"));
        assert!(matches!(
            report.outcomes[0].failures.as_slice(),
            [FileFailure::ServiceDisabled]
        ));
        assert_eq!(report.outcomes[1].stored_ids, vec![1]);
        assert_eq!(report.final_count, Some(1));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn empty_text_file_logs_no_records() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(input.path(), "empty.txt", "Authors: Nobody\n");

        let mock = MockExtractionService::new(SAMPLE_TEI);
        let report = ingest(&mock, input.path(), output.path(), "db", ProcessingMode::Text, true);
        assert_eq!(
            report.status_log[2..4],
            [
                "Skipped 1 block(s) without Title in empty.txt".to_string(),
                "No records found or parsed from TXT: empty.txt".to_string(),
            ]
        );
        assert!(report.outcomes[0].stored_ids.is_empty());
        assert!(report.outcomes[0].failures.is_empty());
        assert!(report.store_path.is_some());
    }

    #[test]
    fn invalid_table_name_is_run_fatal() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(input.path(), "a.txt", "Title: One");

        let mock = MockExtractionService::new(SAMPLE_TEI);
        let request = IngestRequest {
            table: "docs; DROP TABLE x".into(),
            ..IngestRequest::new(input.path(), output.path(), "db")
        };
        let report = Ingestor::new(&mock).run(&request, None, None);
        assert!(report.store_path.is_none());
        assert!(matches!(report.error, Some(IngestError::Store(_))));
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn progress_reports_fractions_and_completion() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(input.path(), "a.txt", "Title: A");
        write(input.path(), "b.txt", "Title: B");

        let seen = RefCell::new(Vec::new());
        let progress = |fraction: f32, label: &str| {
            seen.borrow_mut().push((fraction, label.to_string()));
        };
        let mock = MockExtractionService::new(SAMPLE_TEI);
        let request = IngestRequest::new(input.path(), output.path(), "db");
        Ingestor::new(&mock).run(&request, Some(&progress), None);

        let seen = seen.into_inner();
        assert_eq!(
            seen,
            vec![
                (0.0, "Processing a.txt (1/2)".to_string()),
                (0.5, "Processing b.txt (2/2)".to_string()),
                (1.0, "Processing complete.".to_string()),
            ]
        );
    }

    #[test]
    fn run_has_id_and_ordered_timestamps() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(input.path(), "a.txt", "Title: A");

        let mock = MockExtractionService::new(SAMPLE_TEI);
        let report = ingest(&mock, input.path(), output.path(), "db", ProcessingMode::Text, true);
        assert!(Uuid::parse_str(&report.run_id).is_ok());
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn pdf_run_checks_service_and_stores_record() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(input.path(), "p.pdf", "%PDF-1.4");

        let mock = MockExtractionService::new(SAMPLE_TEI);
        let report = ingest(&mock, input.path(), output.path(), "db", ProcessingMode::Extraction, true);
        assert!(report.outcomes[0].is_success());
        assert!(report.joined().contains("Extraction service initialized (mock://extraction)"));
        assert!(report
            .status_log
            .contains(&"Successfully processed and stored PDF: p.pdf".to_string()));
    }
}

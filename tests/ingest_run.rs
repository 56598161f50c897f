//! End-to-end ingestion runs against a temp directory and the mock extraction service.

use std::path::Path;

use paperbase_lib::db::{inspect_store, run_query, DocumentStore};
use paperbase_lib::pipeline::extraction::MockExtractionService;
use paperbase_lib::pipeline::import::ProcessingMode;
use paperbase_lib::pipeline::processor::{
    ingest, CancelFlag, FileFailure, IngestError, IngestRequest, Ingestor,
};

const TEI: &str = r#"<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <fileDesc>
      <titleStmt><title level="a" type="main">Sparse Retrieval Revisited</title></titleStmt>
      <sourceDesc>
        <biblStruct>
          <analytic>
            <author><persName><forename>Lin</forename><surname>Chen</surname></persName></author>
            <author><persName><forename>Maria</forename><surname>Garcia</surname></persName></author>
          </analytic>
          <monogr>
            <title level="j">Journal of IR</title>
            <imprint><date type="published" when="2022-05-01"/></imprint>
          </monogr>
          <idno type="DOI">10.1000/jir.2022.7</idno>
        </biblStruct>
      </sourceDesc>
    </fileDesc>
    <profileDesc><abstract><p>We revisit BM25.</p></abstract></profileDesc>
  </teiHeader>
  <text>
    <body><div><p>Body text.</p></div></body>
    <back>
      <listBibl>
        <biblStruct>
          <analytic><title level="a">Okapi at TREC</title></analytic>
          <monogr><imprint><date when="1994"/></imprint></monogr>
        </biblStruct>
      </listBibl>
    </back>
  </text>
</TEI>"#;

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn ids(db: &Path) -> Vec<i64> {
    let store = DocumentStore::initialize(db, "document_table", false).unwrap();
    store.ids().unwrap()
}

#[test]
fn mixed_directory_with_one_bad_pdf() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "paper1.pdf", "%PDF-1.4 valid");
    write(input.path(), "paper2.pdf", "%PDF-1.4 slow");
    write(
        input.path(),
        "notes.txt",
        "Title: Field Notes\nAuthor: Ada Lovelace\nAbstract: Observations.\n\nAuthors: Untitled Block\nJournal: Nowhere",
    );

    let mock = MockExtractionService::new(TEI).with_timeout("paper2.pdf");
    let report = ingest(&mock, input.path(), output.path(), "library", ProcessingMode::Both, true);

    let db = output.path().join("library.db");
    assert_eq!(report.store_path.as_deref(), Some(db.as_path()));
    assert!(report.error.is_none());
    assert_eq!(report.stored_records(), 2);
    assert_eq!(report.final_count, Some(2));

    assert_eq!(report.outcomes.len(), 3);
    let names: Vec<&str> = report.outcomes.iter().map(|o| o.file.as_str()).collect();
    assert_eq!(names, vec!["paper1.pdf", "paper2.pdf", "notes.txt"]);

    let failed: Vec<_> = report.failed_files().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].file, "paper2.pdf");
    assert!(matches!(failed[0].failures[0], FileFailure::Extraction(_)));

    let log = report.joined();
    assert!(log.contains("Successfully processed and stored PDF: paper1.pdf"));
    assert!(log.contains("Error processing PDF paper2.pdf"));
    assert!(log.contains("Skipped 1 block(s) without Title in notes.txt"));
    assert!(log.contains("Successfully processed and stored TXT: notes.txt (1 records)"));
    assert!(log.contains("Total records in 'document_table': 2"));

    let rows = run_query(
        &db,
        "SELECT ID, Title, Authors, Citations, Record_Number, Source_File FROM document_table ORDER BY ID",
    )
    .unwrap();
    assert_eq!(
        rows.rows,
        vec![
            vec!["1", "Sparse Retrieval Revisited", "Lin Chen; Maria Garcia", "1", "", "paper1.pdf"],
            vec!["2", "Field Notes", "Ada Lovelace", "", "", "notes.txt"],
        ]
    );

    let body = run_query(&db, "SELECT Body, Refs FROM document_table WHERE ID = 2").unwrap();
    assert_eq!(body.rows[0][0], "Observations.");
    let refs = run_query(&db, "SELECT Refs FROM document_table WHERE ID = 1").unwrap();
    assert_eq!(
        refs.rows[0][0],
        " * Index: 0 | Title: Okapi at TREC | Authors:  | Date: 1994 | Volume: None | Pages: None | Journal: None | Doi: None\\|"
    );
}

#[test]
fn overwrite_restarts_ids_and_append_continues() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "a.txt", "Title: One\n\nTitle: Two");
    let mock = MockExtractionService::new(TEI);
    let db = output.path().join("s.db");

    ingest(&mock, input.path(), output.path(), "s", ProcessingMode::Text, true);
    assert_eq!(ids(&db), vec![1, 2]);

    let appended = ingest(&mock, input.path(), output.path(), "s", ProcessingMode::Text, false);
    assert!(appended
        .joined()
        .contains(&format!("Appending to existing database: {}", db.display())));
    assert_eq!(appended.outcomes[0].stored_ids, vec![3, 4]);
    assert_eq!(ids(&db), vec![1, 2, 3, 4]);

    let overwritten = ingest(&mock, input.path(), output.path(), "s", ProcessingMode::Text, true);
    assert!(overwritten.joined().contains("Overwriting existing database"));
    assert_eq!(ids(&db), vec![1, 2]);
}

#[test]
fn no_matching_files_returns_no_store() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "paper.pdf", "%PDF");

    let mock = MockExtractionService::new(TEI);
    let report = ingest(&mock, input.path(), output.path(), "s", ProcessingMode::Text, true);

    assert!(report.store_path.is_none());
    assert_eq!(
        report.status_log,
        vec!["No compatible files found to process with the selected mode.".to_string()]
    );
    assert!(matches!(report.error, Some(IngestError::Input(_))));
    assert!(!output.path().join("s.db").exists());
}

#[test]
fn single_file_mode_mismatch_fails_run() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "notes.txt", "Title: x");

    let mock = MockExtractionService::new(TEI);
    let report = ingest(
        &mock,
        &input.path().join("notes.txt"),
        output.path(),
        "s",
        ProcessingMode::Extraction,
        true,
    );
    assert!(report.store_path.is_none());
    assert_eq!(report.status_log.len(), 1);
    assert!(report.status_log[0]
        .starts_with("Unsupported file type or processing mode for single file"));
}

#[test]
fn missing_input_fails_run() {
    let output = tempfile::tempdir().unwrap();
    let mock = MockExtractionService::new(TEI);
    let report = ingest(
        &mock,
        &output.path().join("missing"),
        output.path(),
        "s",
        ProcessingMode::Both,
        true,
    );
    assert!(report.store_path.is_none());
    assert!(report.status_log[0].starts_with("Input path does not exist"));
}

#[test]
fn cancellation_stops_between_files_and_finalizes() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "a.txt", "Title: A");
    write(input.path(), "b.txt", "Title: B");
    write(input.path(), "c.txt", "Title: C");

    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    let progress = move |_fraction: f32, label: &str| {
        if label.starts_with("Processing a.txt") {
            flag.cancel();
        }
    };

    let mock = MockExtractionService::new(TEI);
    let request = IngestRequest {
        mode: ProcessingMode::Text,
        overwrite: true,
        ..IngestRequest::new(input.path(), output.path(), "s")
    };
    let report = Ingestor::new(&mock).run(&request, Some(&progress), Some(&cancel));

    assert!(report.cancelled);
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.status_log.contains(&"Run cancelled after 1 of 3 files".to_string()));
    assert_eq!(report.final_count, Some(1));
    assert!(report.store_path.is_some());
}

#[test]
fn ingested_store_can_be_inspected() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(
        input.path(),
        "refs.txt",
        "Title: A\nAuthors: X\nDate: 2020\nJournal: J1\n\nTitle: B\nAuthors: Y\nDate: 2021\nJournal: J2\nAbstract: Longer abstract here",
    );
    let mock = MockExtractionService::new(TEI);
    let report = ingest(&mock, input.path(), output.path(), "s", ProcessingMode::Text, true);
    let db = report.store_path.unwrap();

    let summary = inspect_store(&db, "document_table").unwrap();
    assert_eq!(summary.record_count, 2);
    assert_eq!(summary.columns.len(), 12);
    assert_eq!(summary.unique_authors, 2);
    assert_eq!(summary.dates, vec!["2020", "2021"]);
    assert_eq!(summary.sample.rows.len(), 2);
    assert!(run_query(&db, "DELETE FROM document_table").is_err());
}

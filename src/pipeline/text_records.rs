//! Text-Record Parser.
//!
//! Flat `Key: Value` files, one record per blank-line-separated block.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Keys every parsed record carries after backfill.
pub const CANONICAL_KEYS: [&str; 10] = [
    "Title",
    "Authors",
    "DOI",
    "Abstract",
    "Date",
    "Journal",
    "Record_Number",
    "Citations",
    "Body",
    "Refs",
];

/// Source key spellings mapped onto canonical names.
const KEY_RENAMES: &[(&str, &str)] = &[("Record Number", "Record_Number"), ("Author", "Authors")];

#[derive(Error, Debug)]
pub enum TextParseError {
    #[error("Cannot read text file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One block of a text-record file, keyed by canonical field names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTextRecord {
    fields: BTreeMap<String, String>,
}

impl ParsedTextRecord {
    /// Value of `key`, empty when the block did not set it.
    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn title(&self) -> &str {
        self.get("Title")
    }
}

/// Records of one text file plus the number of blocks dropped for lacking a title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRecordFile {
    pub records: Vec<ParsedTextRecord>,
    pub untitled_blocks: usize,
}

/// Read and parse a text-record file.
pub fn parse_text_file(path: &Path) -> Result<TextRecordFile, TextParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| TextParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = parse_text_blocks(&content);
    tracing::debug!(
        file = %path.display(),
        records = parsed.records.len(),
        untitled = parsed.untitled_blocks,
        "Parsed text-record file"
    );
    Ok(parsed)
}

/// Parse text-record content. Never fails: lines without a colon are skipped
/// and blocks without a title are dropped and counted.
pub fn parse_text_blocks(content: &str) -> TextRecordFile {
    let content = content.replace("\r\n", "\n");
    let mut parsed = TextRecordFile::default();
    for block in content.split("\n\n").filter(|b| !b.trim().is_empty()) {
        match parse_block(block) {
            Some(record) => parsed.records.push(record),
            None => parsed.untitled_blocks += 1,
        }
    }
    parsed
}

/// Records only, see [`parse_text_blocks`].
pub fn parse_text_records(content: &str) -> Vec<ParsedTextRecord> {
    parse_text_blocks(content).records
}

fn parse_block(block: &str) -> Option<ParsedTextRecord> {
    let mut fields = BTreeMap::new();
    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = canonical_key(key.trim());
        fields.insert(key.to_string(), value.trim().to_string());
    }

    for key in CANONICAL_KEYS {
        fields.entry(key.to_string()).or_default();
    }

    if fields.get("Body").is_some_and(|b| b.is_empty()) {
        if let Some(abstract_text) = fields.get("Abstract").filter(|a| !a.is_empty()).cloned() {
            fields.insert("Body".to_string(), abstract_text);
        }
    }

    let record = ParsedTextRecord { fields };
    (!record.title().is_empty()).then_some(record)
}

fn canonical_key(key: &str) -> &str {
    KEY_RENAMES
        .iter()
        .find(|(from, _)| *from == key)
        .map(|(_, to)| *to)
        .unwrap_or(key)
}

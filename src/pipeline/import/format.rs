use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Input file kinds the pipeline handles, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Pdf,
    Text,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
        }
    }

    /// Classify by extension, case-insensitively. `None` for anything else.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Which file kinds a run processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// PDFs through the extraction service.
    #[value(name = "grobid", alias = "extraction")]
    #[serde(rename = "grobid", alias = "extraction")]
    Extraction,
    /// Text-record files only.
    Text,
    /// Both PDFs and text-record files.
    Both,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "grobid",
            Self::Text => "text",
            Self::Both => "both",
        }
    }

    pub fn accepts(&self, kind: FileKind) -> bool {
        matches!(
            (self, kind),
            (Self::Both, _) | (Self::Extraction, FileKind::Pdf) | (Self::Text, FileKind::Text)
        )
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grobid" | "extraction" => Ok(Self::Extraction),
            "text" => Ok(Self::Text),
            "both" => Ok(Self::Both),
            other => Err(format!("Unknown processing mode: {other}")),
        }
    }
}

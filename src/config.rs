use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Paperbase";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default name of the single document table.
pub const DEFAULT_TABLE_NAME: &str = "document_table";

/// Default settings file name, resolved under the application data directory.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "paperbase=info,paperbase_lib=info,warn"
}

/// Get the application data directory
/// ~/Paperbase/ on all platforms, current directory if home cannot be resolved
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the settings file
pub fn default_settings_path() -> PathBuf {
    app_data_dir().join(SETTINGS_FILE_NAME)
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ═══════════════════════════════════════════════════════════
// Settings file
// ═══════════════════════════════════════════════════════════

/// User settings persisted as a flat JSON object.
///
/// The five path/name keys are typed; every other key is carried in `extra`
/// so a load/save cycle never drops what another tool wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_collection_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// Never fails: a missing, unreadable, or non-object file yields empty
    /// settings. Unrecognized keys are kept and logged as warnings.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Settings file does not exist");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not read settings file");
                return Self::default();
            }
        };

        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Settings file is not valid JSON");
                return Self::default();
            }
        };

        if !value.is_object() {
            tracing::warn!(path = %path.display(), "Settings file is not a JSON object");
            return Self::default();
        }

        // Typed keys holding non-string values are treated like an unreadable file.
        let settings: Settings = match serde_json::from_value(value) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Settings file has unexpected value types");
                return Self::default();
            }
        };

        tracing::info!(path = %path.display(), "Settings loaded");
        for (key, value) in &settings.extra {
            tracing::warn!(key = %key, value = %value, "Unrecognized setting preserved");
        }
        settings
    }

    /// Write settings as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Keys present in the file that are not one of the known settings.
    pub fn unrecognized_keys(&self) -> Vec<&str> {
        self.extra.keys().map(String::as_str).collect()
    }

    /// Store name to use when none is given: `database_name`, then `base_name`.
    pub fn store_name(&self) -> Option<&str> {
        self.database_name
            .as_deref()
            .or(self.base_name.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

// ═══════════════════════════════════════════════════════════
// Extraction service config
// ═══════════════════════════════════════════════════════════

/// Connection settings for the GROBID-compatible extraction service.
///
/// Same file shape the service's reference client reads, so an existing
/// `config.json` can be reused as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrobidConfig {
    pub grobid_server: String,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Elements for which layout coordinates are requested.
    pub coordinates: Vec<String>,
}

impl Default for GrobidConfig {
    fn default() -> Self {
        Self {
            grobid_server: "http://localhost:8070".into(),
            timeout: 180,
            max_retries: 2,
            retry_backoff_ms: 500,
            coordinates: ["persName", "figure", "ref", "biblStruct", "formula", "s"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl GrobidConfig {
    /// Load from `path`; a missing file yields defaults, a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No extraction service config, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`GrobidConfig::load`], but when the run has no use for the service
    /// a broken file only logs a warning and yields defaults.
    pub fn load_for_run(path: &Path, service_required: bool) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(e) if !service_required => {
                tracing::warn!(error = %e, "Ignoring extraction service config for text-only run");
                Ok(Self::default())
            }
            result => result,
        }
    }
}

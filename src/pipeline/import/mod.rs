pub mod classify;
pub mod format;

pub use classify::*;
pub use format::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input path does not exist or is not a file/directory: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported file type or processing mode for single file: {} (mode {mode})", .path.display())]
    UnsupportedFile { path: PathBuf, mode: ProcessingMode },

    #[error("No compatible files found to process with the selected mode.")]
    NoCompatibleFiles,
}

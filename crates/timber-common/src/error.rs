//! Error types for Timber Lens.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level error type for save, settings, metrics and history operations.
#[derive(Debug, Error)]
pub enum TimberError {
    /// The container is not a readable archive.
    #[error("Invalid save container: {0}")]
    Format(String),

    /// The save was written by a game version this crate does not understand.
    #[error("Unsupported save version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version string found in the save
        found: String,
        /// Human readable list of supported version lines
        supported: String,
    },

    /// A required section is missing or structurally invalid.
    #[error("Corrupt data in {section}: {reason}")]
    CorruptData {
        /// Section or file the problem was found in
        section: String,
        /// What was wrong
        reason: String,
    },

    /// The directory holds no save files.
    #[error("No save files found in {}", directory.display())]
    NoSaveFiles {
        /// Directory that was scanned
        directory: PathBuf,
    },

    /// Filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A setting value violates its constraint.
    #[error("Invalid value for setting '{key}': {constraint}")]
    Validation {
        /// Offending setting key
        key: String,
        /// Constraint that was violated
        constraint: String,
    },

    /// A setting key is not recognized.
    #[error("Unknown setting '{0}'")]
    UnknownSetting(String),

    /// Grid access outside of the terrain bounds.
    #[error("Tile ({row}, {col}) is outside the {rows}x{cols} grid")]
    Index {
        /// Requested row
        row: usize,
        /// Requested column
        col: usize,
        /// Grid row count
        rows: usize,
        /// Grid column count
        cols: usize,
    },
}

impl TimberError {
    /// Builds an I/O error bound to a path.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Builds a corrupt data error for a section.
    pub fn corrupt(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptData {
            section: section.into(),
            reason: reason.into(),
        }
    }

    /// Builds a validation error for a setting key.
    pub fn validation(key: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            constraint: constraint.into(),
        }
    }
}

/// Result type alias for Timber Lens operations.
pub type TimberResult<T> = Result<T, TimberError>;

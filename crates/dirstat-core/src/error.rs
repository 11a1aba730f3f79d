//! Error types for walking and tree operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by tree operations and JSON decoding.
#[derive(Debug, Error)]
pub enum TreeError {
    /// No child matched a segment of a selection path.
    #[error("Path segment not found: {segment}")]
    PathSegmentNotFound { segment: String },

    /// Rollup was requested on a tree that is already rolled up.
    #[error("Tree is already aggregated")]
    AlreadyAggregated,

    /// Malformed serialized tree.
    #[error("Invalid tree JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl TreeError {
    pub(crate) fn segment_not_found(segment: &str) -> Self {
        Self::PathSegmentNotFound {
            segment: segment.to_string(),
        }
    }
}

/// Errors that can occur while producing a tree from disk.
#[derive(Debug, Error)]
pub enum WalkError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Path is neither a directory nor a serialized tree.
    #[error("Not a directory or JSON file: {path}")]
    NotADirectoryOrJson { path: PathBuf },

    /// An exclusion pattern failed to compile.
    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// Nothing was left to analyze after exclusions.
    #[error("Nothing found in directory {path}")]
    EmptyResult { path: PathBuf },

    /// The walking thread went away without delivering a result.
    #[error("Walk interrupted")]
    Interrupted,

    /// Tree operation or decoding failure.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl WalkError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Kind of walk warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Error reading a directory listing.
    ReadError,
    /// Error reading metadata.
    MetadataError,
}

/// Non-fatal problem absorbed during a walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl WalkWarning {
    /// Create a new walk warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a permission denied warning.
    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Permission denied: {}", path.display()),
            path,
            kind: WarningKind::PermissionDenied,
        }
    }

    /// Create a read error warning.
    pub fn read_error(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        Self {
            path: path.into(),
            message: format!("Read error: {error}"),
            kind: WarningKind::ReadError,
        }
    }
}

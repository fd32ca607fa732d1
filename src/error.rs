//! Error types for recipebox operations.
//!
//! The store and index layers return [`RecipeError`] so callers can
//! distinguish failure modes (missing recipe, duplicate source, corrupt
//! file, broken index). The binary boundary wraps these in `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using RecipeError.
pub type Result<T> = std::result::Result<T, RecipeError>;

#[derive(Error, Debug)]
pub enum RecipeError {
    /// The requested slug has no file on disk.
    #[error("recipe not found: {slug}")]
    NotFound { slug: String },

    /// A recipe with this source URL is already stored; `slug` names it.
    #[error("recipe already exists: {slug}")]
    Duplicate { slug: String },

    /// The file exists but its frontmatter or body sections are malformed.
    #[error("malformed recipe file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// Filesystem write/rename/read failure. Fatal for the triggering
    /// request; other files are unaffected.
    #[error("storage error: {0}")]
    Storage(String),

    /// Database-layer failure. The file store stays authoritative and a
    /// rebuild is the documented recovery path.
    #[error("index error: {0}")]
    Index(#[from] sqlx::Error),

    /// Extraction failures pass through unchanged and are never retried
    /// at the store layer.
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl RecipeError {
    pub fn storage(operation: &str, err: impl std::fmt::Display) -> Self {
        RecipeError::Storage(format!("{operation}: {err}"))
    }

    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        RecipeError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when only the derived index is broken and the canonical files
    /// are still usable.
    pub fn is_index_failure(&self) -> bool {
        matches!(self, RecipeError::Index(_))
    }
}

/// Typed failures from the extraction adapter.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The page carries no recipe markup we understand.
    #[error("no recipe data found on {domain}")]
    UnsupportedSite { domain: String },

    /// DNS, connect, TLS, or HTTP-status failure while fetching the page.
    #[error("network error: {0}")]
    Network(String),

    /// The fetch exceeded the configured timeout.
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The page was fetched but its recipe data is unusable.
    #[error("could not parse recipe: {0}")]
    Parse(String),
}

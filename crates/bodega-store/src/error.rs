//! Store error taxonomy.
//!
//! `PathSafety` and `NotFound` are client-attributable and map to 400
//! and 404 at the gateway; the rest are server-side and map to 500
//! with the detail logged, never returned.

use thiserror::Error;

/// Errors produced by [`crate::ArtifactStore`] operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The supplied path would resolve outside its intended root, or a
    /// segment is not a valid path component. No filesystem access has
    /// occurred when this is returned.
    #[error("unsafe path: {0}")]
    PathSafety(String),

    /// The requested file or directory does not exist.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// I/O failure while streaming an upload. The staging file has
    /// been discarded and the destination is untouched.
    #[error("write failed for {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failure while recursively deleting a build directory. Deletion
    /// is best-effort; callers log this and continue.
    #[error("deletion failed for {path}: {source}")]
    Deletion {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other filesystem failure (metadata, listing, open).
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

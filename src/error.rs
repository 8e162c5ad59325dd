//! Per-item failures recorded during an ingest pass.
//!
//! None of these abort the pass: the affected file or document is skipped
//! and the failure is listed in the [`IngestReport`](crate::ingest::IngestReport).

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind")]
pub enum IngestFailure {
    /// A file could not be read or was not valid UTF-8.
    #[error("failed to load {path}: {cause}")]
    LoadFailed { path: String, cause: String },

    /// The embedding call for a document failed or returned a bad vector.
    #[error("failed to embed {path}: {cause}")]
    EmbedFailed { path: String, cause: String },
}

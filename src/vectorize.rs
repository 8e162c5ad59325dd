//! Document → vector, one embedding call per document.
//!
//! A failed call, or a vector of the wrong length, drops only that document.

use mdseek_core::embedding::Embedder;
use mdseek_core::models::{Document, EmbeddedDocument};

use crate::error::IngestFailure;

#[derive(Debug, Default)]
pub struct VectorizeReport {
    pub embedded: Vec<EmbeddedDocument>,
    pub failures: Vec<IngestFailure>,
}

/// Embed every document's full content with `embedder`.
///
/// Output preserves input order for the documents that succeed.
pub async fn vectorize(
    documents: Vec<Document>,
    embedder: &dyn Embedder,
    dims: usize,
) -> VectorizeReport {
    let mut report = VectorizeReport::default();

    for document in documents {
        let label = format!("{}:{}", document.origin.name, document.relative_path);

        let cause = match embedder.embed(&document.content).await {
            Ok(vector) if vector.len() == dims => {
                report.embedded.push(EmbeddedDocument { document, vector });
                continue;
            }
            Ok(vector) => format!(
                "embedding has dimension {}, expected {}",
                vector.len(),
                dims
            ),
            Err(e) => format!("{:#}", e),
        };

        tracing::warn!(path = %label, %cause, "dropping document from index");
        report.failures.push(IngestFailure::EmbedFailed { path: label, cause });
    }

    report
}

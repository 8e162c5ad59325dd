//! Query engine: cache lookup, query embedding, retrieval, and ranking.
//!
//! [`SearchEngine`] is reentrant and shared across concurrent queries. Each
//! query snapshots the active [`IndexGeneration`](crate::index::IndexGeneration)
//! once and uses it end-to-end, so an ingest that swaps the index mid-query
//! never produces a mixed result.

use std::sync::Arc;

use crate::cache::ResultCache;
use crate::embedding::Embedder;
use crate::index::IndexHandle;
use crate::models::{QueryRequest, SearchOutcome};
use crate::rank::{rank_page, CandidateRetriever, GrowingWindow};

/// Errors surfaced at the query boundary.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request was rejected before reaching the index.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No ingest pass has completed yet.
    #[error("index unavailable: no ingest pass has completed yet")]
    IndexUnavailable,

    /// Embedding, retrieval, or ranking failed.
    #[error("query failed: {0}")]
    QueryFailed(String),
}

pub struct SearchEngine {
    embedder: Arc<dyn Embedder>,
    index: Arc<IndexHandle>,
    cache: Arc<ResultCache>,
    retriever: Box<dyn CandidateRetriever>,
}

impl SearchEngine {
    /// Engine using the [`GrowingWindow`] retrieval policy.
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<IndexHandle>, cache: Arc<ResultCache>) -> Self {
        Self {
            embedder,
            index,
            cache,
            retriever: Box::new(GrowingWindow),
        }
    }

    /// Replace the candidate retrieval policy.
    pub fn with_retriever(mut self, retriever: impl CandidateRetriever + 'static) -> Self {
        self.retriever = Box::new(retriever);
        self
    }

    pub fn index(&self) -> &Arc<IndexHandle> {
        &self.index
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Run one query.
    ///
    /// # Errors
    ///
    /// [`SearchError::IndexUnavailable`] before the first successful ingest;
    /// [`SearchError::QueryFailed`] if embedding or retrieval fails.
    pub async fn search(&self, request: &QueryRequest) -> Result<SearchOutcome, SearchError> {
        let generation = self.index.current().ok_or(SearchError::IndexUnavailable)?;

        if let Some(page) = self
            .cache
            .get(generation.id, request.text(), request.page())
        {
            tracing::debug!(query = request.text(), page = request.page(), "cache hit");
            return Ok(SearchOutcome::from_page(page));
        }
        tracing::debug!(query = request.text(), page = request.page(), "cache miss");

        let query_vec = self
            .embedder
            .embed(request.text())
            .await
            .map_err(|e| SearchError::QueryFailed(format!("embedding failed: {:#}", e)))?;

        let candidates = self
            .retriever
            .retrieve(&generation.index, &query_vec, request)
            .map_err(|e| SearchError::QueryFailed(e.to_string()))?;

        let page = rank_page(candidates, request);
        self.cache
            .put(generation.id, request.text(), request.page(), page.clone());

        Ok(SearchOutcome::from_page(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DEFAULT_DIMS;
    use crate::index::SimilarityIndex;
    use crate::models::{Document, EmbeddedDocument, SourceLocation};
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Letter-frequency embedder: deterministic and cheap.
    struct LetterEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl LetterEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    fn letter_vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DEFAULT_DIMS];
        for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
            let i = (c.to_ascii_lowercase() as u8 - b'a') as usize;
            v[i] += 1.0;
        }
        v
    }

    #[async_trait]
    impl Embedder for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            DEFAULT_DIMS
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("model offline");
            }
            Ok(letter_vector(text))
        }
    }

    fn document(path: &str, content: &str) -> EmbeddedDocument {
        EmbeddedDocument {
            document: Document {
                relative_path: path.to_string(),
                content: content.to_string(),
                origin: Arc::new(SourceLocation {
                    name: "labweek".to_string(),
                    url: "https://github.com/ciec-infra/labweek.git".to_string(),
                    local_path: "labweek".into(),
                    branch: "main".to_string(),
                }),
            },
            vector: letter_vector(content),
        }
    }

    fn engine_with(
        docs: Vec<EmbeddedDocument>,
        embedder: Arc<LetterEmbedder>,
    ) -> SearchEngine {
        let handle = Arc::new(IndexHandle::new());
        handle.install(SimilarityIndex::build(DEFAULT_DIMS, docs).unwrap());
        SearchEngine::new(embedder, handle, Arc::new(ResultCache::default()))
    }

    #[tokio::test]
    async fn test_single_terraform_document() {
        let content = "Terraform setup guide. Use modules for reuse.";
        let engine = engine_with(
            vec![document("guides/terraform.md", content)],
            Arc::new(LetterEmbedder::new()),
        );

        let req = QueryRequest::new("Terraform", 1, 3).unwrap();
        let outcome = engine.search(&req).await.unwrap();
        let results = outcome.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].snippet, content);
        assert_eq!(results[0].content, content);
        assert_eq!(
            results[0].document_url,
            "https://github.com/ciec-infra/labweek/blob/main/guides/terraform.md"
        );
    }

    #[tokio::test]
    async fn test_empty_corpus_returns_no_results() {
        let engine = engine_with(Vec::new(), Arc::new(LetterEmbedder::new()));
        let req = QueryRequest::new("anything", 1, 3).unwrap();
        assert_eq!(engine.search(&req).await.unwrap(), SearchOutcome::NoResults);
    }

    #[tokio::test]
    async fn test_index_unavailable_before_ingest() {
        let engine = SearchEngine::new(
            Arc::new(LetterEmbedder::new()),
            Arc::new(IndexHandle::new()),
            Arc::new(ResultCache::default()),
        );
        let req = QueryRequest::new("q", 1, 3).unwrap();
        assert!(matches!(
            engine.search(&req).await,
            Err(SearchError::IndexUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_second_identical_query_hits_cache() {
        let embedder = Arc::new(LetterEmbedder::new());
        let engine = engine_with(
            vec![
                document("a.md", "alpha docs about deployment"),
                document("b.md", "beta docs about monitoring"),
            ],
            embedder.clone(),
        );

        let req = QueryRequest::new("deployment", 1, 3).unwrap();
        let first = engine.search(&req).await.unwrap();
        let second = engine.search(&req).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_new_generation_misses_cache() {
        let embedder = Arc::new(LetterEmbedder::new());
        let engine = engine_with(vec![document("a.md", "old content")], embedder.clone());

        let req = QueryRequest::new("content", 1, 3).unwrap();
        let before = engine.search(&req).await.unwrap();
        assert!(before.results()[0].document_url.ends_with("/a.md"));

        engine.index().install(
            SimilarityIndex::build(DEFAULT_DIMS, vec![document("b.md", "new content")]).unwrap(),
        );
        let after = engine.search(&req).await.unwrap();
        assert!(after.results()[0].document_url.ends_with("/b.md"));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_keyword_matches_lead_the_page() {
        let engine = engine_with(
            vec![
                document("near.md", "kubernetes"),
                document("match.md", "notes on helm charts and HELM values"),
                document("other.md", "kubernetes cluster"),
            ],
            Arc::new(LetterEmbedder::new()),
        );

        let req = QueryRequest::new("helm", 1, 3).unwrap();
        let outcome = engine.search(&req).await.unwrap();
        let results = outcome.results();
        assert_eq!(results.len(), 3);
        assert!(results[0].document_url.ends_with("/match.md"));
        assert!(results[1].distance <= results[2].distance);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_query_failed() {
        let embedder = Arc::new(LetterEmbedder {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let engine = engine_with(vec![document("a.md", "text")], embedder);
        let req = QueryRequest::new("text", 1, 3).unwrap();
        match engine.search(&req).await {
            Err(SearchError::QueryFailed(msg)) => assert!(msg.contains("model offline")),
            other => panic!("expected QueryFailed, got {:?}", other),
        }
    }
}

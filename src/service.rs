//! Process-wide service state shared by the CLI and the HTTP server.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use mdseek_core::cache::ResultCache;
use mdseek_core::embedding::Embedder;
use mdseek_core::index::IndexHandle;
use mdseek_core::models::{QueryRequest, SearchOutcome};
use mdseek_core::search::{SearchEngine, SearchError};

use crate::config::Config;
use crate::connector_git::RepoTransport;
use crate::embedding::create_embedder;
use crate::ingest::{IngestReport, Ingestor};

/// Errors from [`DocService::search`].
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("query timed out after {0}s")]
    Timeout(u64),
}

/// Owns the index handle, result cache, search engine and ingest pipeline.
pub struct DocService {
    config: Config,
    engine: SearchEngine,
    ingestor: Ingestor,
}

impl DocService {
    /// Build with the configured embedding provider and the `git` transport.
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        Ok(Self::with_embedder(config, embedder))
    }

    pub fn with_embedder(config: Config, embedder: Arc<dyn Embedder>) -> Self {
        let index = Arc::new(IndexHandle::new());
        let cache = Arc::new(ResultCache::new(config.cache.policy()));
        let ingestor = Ingestor::from_config(&config, embedder.clone(), index.clone());
        let engine = SearchEngine::new(embedder, index, cache);
        Self {
            config,
            engine,
            ingestor,
        }
    }

    /// Replace the version-control transport used by ingest passes.
    pub fn with_transport(mut self, transport: Arc<dyn RepoTransport>) -> Self {
        self.ingestor = self.ingestor.with_transport(transport);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub async fn ingest(&self) -> Result<IngestReport> {
        self.ingestor.run().await
    }

    /// Validate and run one query under the configured deadline.
    ///
    /// `page` defaults to 1 and `size` to `search.default_size`.
    pub async fn search(
        &self,
        text: &str,
        page: Option<i64>,
        size: Option<i64>,
    ) -> Result<SearchOutcome, QueryError> {
        let request = QueryRequest::new(
            text,
            page.unwrap_or(1),
            size.unwrap_or(self.config.search.default_size as i64),
        )?;

        let secs = self.config.server.query_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(secs), self.engine.search(&request)).await {
            Ok(outcome) => Ok(outcome?),
            Err(_) => {
                tracing::warn!(query = %request.text(), timeout_secs = secs, "query timed out");
                Err(QueryError::Timeout(secs))
            }
        }
    }
}

//! Ingestion pipeline orchestration.
//!
//! One pass runs sync → load → vectorize → index build and installs the new
//! index generation atomically. Sources are synced and loaded concurrently on
//! the blocking pool; they share only the [`RateBudget`].
//!
//! Failures are isolated per item:
//!
//! | Failure | Effect |
//! |---------|--------|
//! | `RateLimitExceeded` / `SyncFailed` | source skipped |
//! | `LoadFailed` | file skipped |
//! | `EmbedFailed` | document dropped |
//!
//! A pass in which no source synced, or in which documents were loaded but
//! none could be embedded, is a failure: nothing is installed and the
//! previous generation keeps serving queries. A pass that synced sources
//! holding no Markdown at all still installs an empty generation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use mdseek_core::embedding::Embedder;
use mdseek_core::index::{IndexHandle, SimilarityIndex};
use mdseek_core::models::{Document, SourceLocation};

use crate::config::{Config, LoaderConfig};
use crate::connector_fs::{load_documents, LoadReport};
use crate::connector_git::{sync_source, GitCli, RateBudget, RepoTransport, SyncAction, SyncError};
use crate::error::IngestFailure;
use crate::vectorize::vectorize;

/// A source to ingest, with the name of the env var holding its token.
#[derive(Debug, Clone)]
pub struct IngestSource {
    pub location: Arc<SourceLocation>,
    pub token_env: Option<String>,
}

/// Outcome for one source in a pass.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<SyncAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SyncError>,
    pub documents: usize,
}

/// Summary of one ingest pass.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// `true` when a new generation was installed.
    pub ok: bool,
    pub generation: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub documents_loaded: usize,
    pub documents_indexed: usize,
    pub failures: Vec<IngestFailure>,
    pub budget_remaining: u64,
}

impl IngestReport {
    pub fn sources_synced(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_none()).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SyncError> {
        self.sources.iter().filter_map(|s| s.error.as_ref())
    }

    pub fn summary(&self) -> String {
        if self.ok {
            format!(
                "indexed {} documents from {}/{} sources ({} skipped items)",
                self.documents_indexed,
                self.sources_synced(),
                self.sources.len(),
                self.failures.len()
            )
        } else if self.sources.is_empty() {
            "ingest failed: no sources configured".to_string()
        } else if self.sources_synced() > 0 {
            format!(
                "ingest failed: none of {} loaded documents could be embedded",
                self.documents_loaded
            )
        } else {
            format!(
                "ingest failed: none of {} sources could be synced",
                self.sources.len()
            )
        }
    }
}

/// Runs ingest passes and installs their results into an [`IndexHandle`].
pub struct Ingestor {
    sources: Vec<IngestSource>,
    loader: LoaderConfig,
    dims: usize,
    budget: Arc<RateBudget>,
    transport: Arc<dyn RepoTransport>,
    embedder: Arc<dyn Embedder>,
    index: Arc<IndexHandle>,
    running: Mutex<()>,
}

impl Ingestor {
    pub fn new(
        sources: Vec<IngestSource>,
        loader: LoaderConfig,
        dims: usize,
        budget: Arc<RateBudget>,
        embedder: Arc<dyn Embedder>,
        index: Arc<IndexHandle>,
    ) -> Self {
        Self {
            sources,
            loader,
            dims,
            budget,
            transport: Arc::new(GitCli::default()),
            embedder,
            index,
            running: Mutex::new(()),
        }
    }

    /// Build from configuration, syncing with the `git` executable.
    pub fn from_config(config: &Config, embedder: Arc<dyn Embedder>, index: Arc<IndexHandle>) -> Self {
        let sources = config
            .sources
            .iter()
            .map(|s| IngestSource {
                location: Arc::new(s.location(&config.sync)),
                token_env: s.token_env.clone(),
            })
            .collect();

        Self::new(
            sources,
            config.loader.clone(),
            config.embedding.dims,
            Arc::new(RateBudget::new(config.sync.rate_limit)),
            embedder,
            index,
        )
    }

    /// Replace the version-control transport.
    pub fn with_transport(mut self, transport: Arc<dyn RepoTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn sources(&self) -> &[IngestSource] {
        &self.sources
    }

    pub fn budget(&self) -> &Arc<RateBudget> {
        &self.budget
    }

    /// Run one full pass. Concurrent calls are serialized.
    ///
    /// Per-item failures are reported, not returned; `Err` means the pass
    /// itself broke (a worker panicked or the loader configuration is invalid).
    pub async fn run(&self) -> Result<IngestReport> {
        let _running = self.running.lock().await;
        let started_at = Utc::now();
        tracing::info!(sources = self.sources.len(), "starting ingest pass");

        let mut tasks = JoinSet::new();
        for (position, source) in self.sources.iter().cloned().enumerate() {
            let budget = self.budget.clone();
            let transport = self.transport.clone();
            let loader = self.loader.clone();
            tasks.spawn_blocking(move || {
                (
                    position,
                    sync_and_load(&source, &budget, transport.as_ref(), &loader),
                )
            });
        }

        let mut outcomes = Vec::with_capacity(self.sources.len());
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined.context("ingest worker panicked")?);
        }
        outcomes.sort_by_key(|(position, _)| *position);

        let mut source_reports = Vec::with_capacity(outcomes.len());
        let mut documents: Vec<Document> = Vec::new();
        let mut failures: Vec<IngestFailure> = Vec::new();

        for (position, outcome) in outcomes {
            let name = self.sources[position].location.name.clone();
            match outcome? {
                Ok((action, loaded)) => {
                    tracing::info!(
                        source = %name,
                        documents = loaded.documents.len(),
                        skipped = loaded.failures.len(),
                        "source loaded"
                    );
                    source_reports.push(SourceReport {
                        name,
                        action: Some(action),
                        error: None,
                        documents: loaded.documents.len(),
                    });
                    documents.extend(loaded.documents);
                    failures.extend(loaded.failures);
                }
                Err(err) => {
                    tracing::warn!(source = %name, error = %err, "skipping source");
                    source_reports.push(SourceReport {
                        name,
                        action: None,
                        error: Some(err),
                        documents: 0,
                    });
                }
            }
        }

        let documents_loaded = documents.len();
        let synced = source_reports.iter().filter(|s| s.error.is_none()).count();

        if synced == 0 {
            return Ok(self.failed_pass(started_at, source_reports, documents_loaded, failures));
        }

        let vectorized = vectorize(documents, self.embedder.as_ref(), self.dims).await;
        failures.extend(vectorized.failures);

        if documents_loaded > 0 && vectorized.embedded.is_empty() {
            return Ok(self.failed_pass(started_at, source_reports, documents_loaded, failures));
        }

        let index = SimilarityIndex::build(self.dims, vectorized.embedded)
            .context("failed to build similarity index")?;
        let documents_indexed = index.len();
        let generation = self.index.install(index);

        let report = IngestReport {
            ok: true,
            generation: Some(generation.id),
            started_at,
            finished_at: Utc::now(),
            sources: source_reports,
            documents_loaded,
            documents_indexed,
            failures,
            budget_remaining: self.budget.remaining(),
        };
        tracing::info!("{}", report.summary());
        Ok(report)
    }

    /// Report for a pass that installs nothing.
    fn failed_pass(
        &self,
        started_at: DateTime<Utc>,
        sources: Vec<SourceReport>,
        documents_loaded: usize,
        failures: Vec<IngestFailure>,
    ) -> IngestReport {
        let report = IngestReport {
            ok: false,
            generation: None,
            started_at,
            finished_at: Utc::now(),
            sources,
            documents_loaded,
            documents_indexed: 0,
            failures,
            budget_remaining: self.budget.remaining(),
        };
        tracing::error!("{}", report.summary());
        report
    }
}

/// Sync one source, then load its documents. Runs on the blocking pool.
fn sync_and_load(
    source: &IngestSource,
    budget: &RateBudget,
    transport: &dyn RepoTransport,
    loader: &LoaderConfig,
) -> Result<std::result::Result<(SyncAction, LoadReport), SyncError>> {
    let token = source
        .token_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok());

    let action = match sync_source(&source.location, token.as_deref(), budget, transport) {
        Ok(action) => action,
        Err(err) => return Ok(Err(err)),
    };

    let loaded = load_documents(&source.location, loader)?;
    Ok(Ok((action, loaded)))
}

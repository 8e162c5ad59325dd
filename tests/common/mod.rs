#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mdseek::config::{Config, SourceConfig};
use mdseek::connector_git::RepoTransport;
use mdseek::service::DocService;
use mdseek_core::embedding::{Embedder, DEFAULT_DIMS};

/// Serves in-memory repositories keyed by URL. Unknown URLs fail to clone.
#[derive(Default)]
pub struct FixtureTransport {
    repos: Mutex<HashMap<String, Vec<(String, Vec<u8>)>>>,
    pub clones: AtomicUsize,
    pub pulls: AtomicUsize,
}

impl FixtureTransport {
    pub fn with_repo(self, url: &str, files: &[(&str, &str)]) -> Self {
        let files = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
            .collect();
        self.insert(url, files);
        self
    }

    pub fn with_raw_file(self, url: &str, path: &str, bytes: &[u8]) -> Self {
        self.repos
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push((path.to_string(), bytes.to_vec()));
        self
    }

    fn insert(&self, url: &str, files: Vec<(String, Vec<u8>)>) {
        self.repos.lock().unwrap().insert(url.to_string(), files);
    }
}

impl RepoTransport for FixtureTransport {
    fn clone_repo(&self, url: &str, _branch: &str, dest: &Path) -> Result<()> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        let files = match self.repos.lock().unwrap().get(url) {
            Some(files) => files.clone(),
            None => bail!("repository not found: {}", url),
        };
        std::fs::create_dir_all(dest.join(".git"))?;
        for (rel, bytes) in files {
            let path = dest.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, bytes)?;
        }
        Ok(())
    }

    fn pull(&self, _repo_dir: &Path, _branch: &str) -> Result<()> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn letter_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DEFAULT_DIMS];
    for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
        v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    v
}

/// Letter-frequency embedder. Fails on text containing "boom", or on every
/// call while `offline` is set, and sleeps on text containing "slow".
#[derive(Default)]
pub struct LetterEmbedder {
    pub calls: AtomicUsize,
    pub offline: AtomicBool,
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
        if self.offline.load(Ordering::SeqCst) {
            bail!("embedding service unreachable");
        }
        if text.contains("boom") {
            bail!("embedding service rejected input");
        }
        if text.contains("slow") {
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
        Ok(letter_vector(text))
    }
}

pub fn source(root: &Path, name: &str, url: &str) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        url: url.to_string(),
        path: Some(root.join(name)),
        branch: "main".to_string(),
        token_env: None,
    }
}

pub fn config(sources: Vec<SourceConfig>, rate_limit: u64) -> Config {
    let mut config = Config::minimal();
    config.sync.rate_limit = rate_limit;
    config.sources = sources;
    config
}

pub fn service(
    config: Config,
    transport: FixtureTransport,
) -> (DocService, Arc<LetterEmbedder>, Arc<FixtureTransport>) {
    let embedder = Arc::new(LetterEmbedder::default());
    let transport = Arc::new(transport);
    let service =
        DocService::with_embedder(config, embedder.clone()).with_transport(transport.clone());
    (service, embedder, transport)
}

//! TOML configuration.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8002"
//!
//! [embedding]
//! provider = "local"
//! model = "all-minilm-l6-v2"
//!
//! [sync]
//! cache_dir = "./data/repos"
//! rate_limit = 5000
//!
//! [[sources]]
//! name = "labweek"
//! url = "https://github.com/ciec-infra/labweek.git"
//! token_env = "GITHUB_TOKEN"
//! ```

use anyhow::{bail, Context, Result};
use globset::Glob;
use mdseek_core::cache::{CachePolicy, CacheScope};
use mdseek_core::embedding::DEFAULT_DIMS;
use mdseek_core::models::{SourceLocation, DEFAULT_PAGE_SIZE};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Deadline for one query (embedding + retrieval), in seconds.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8002".to_string()
}
fn default_query_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: default_dims(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_dims() -> usize {
    DEFAULT_DIMS
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Parent directory for working copies whose `path` is not set.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Maximum clone/pull calls for the lifetime of the process.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            rate_limit: default_rate_limit(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/repos")
}
fn default_rate_limit() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.markdown".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_page_size")]
    pub default_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_size: default_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub scope: CacheScope,
    /// Entries older than this are recomputed. Unset = never expire.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: CacheScope::Generation,
            ttl_secs: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl CacheConfig {
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            enabled: self.enabled,
            scope: self.scope,
            ttl: self.ttl_secs.map(Duration::from_secs),
        }
    }
}

/// One `[[sources]]` entry.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    /// Working-copy directory; defaults to `<sync.cache_dir>/<hash of url>`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Environment variable holding an access token for private repositories.
    #[serde(default)]
    pub token_env: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

impl SourceConfig {
    pub fn location(&self, sync: &SyncConfig) -> SourceLocation {
        let local_path = match &self.path {
            Some(p) => p.clone(),
            None => sync.cache_dir.join(short_hash(&self.url)),
        };
        SourceLocation {
            name: self.name.clone(),
            url: self.url.clone(),
            local_path,
            branch: self.branch.clone(),
        }
    }
}

impl Config {
    /// Defaults with no sources; used when no config file is needed.
    pub fn minimal() -> Self {
        Self {
            server: ServerConfig::default(),
            embedding: EmbeddingConfig::default(),
            sync: SyncConfig::default(),
            loader: LoaderConfig::default(),
            search: SearchConfig::default(),
            cache: CacheConfig::default(),
            sources: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync.rate_limit == 0 {
            bail!("sync.rate_limit must be >= 1");
        }
        if self.search.default_size == 0 {
            bail!("search.default_size must be >= 1");
        }
        if self.embedding.dims == 0 {
            bail!("embedding.dims must be > 0");
        }
        if self.server.query_timeout_secs == 0 {
            bail!("server.query_timeout_secs must be >= 1");
        }
        if self.loader.include_globs.is_empty() {
            bail!("loader.include_globs must not be empty");
        }
        for pattern in self
            .loader
            .include_globs
            .iter()
            .chain(&self.loader.exclude_globs)
        {
            Glob::new(pattern).with_context(|| format!("loader: invalid glob '{}'", pattern))?;
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
                other
            ),
        }
        if self.embedding.provider == "openai" && self.embedding.model.is_none() {
            bail!("embedding.model must be specified when provider is 'openai'");
        }
        if self.embedding.provider == "ollama" && self.embedding.model.is_none() {
            bail!("embedding.model must be specified when provider is 'ollama'");
        }
        // every supported local model produces 384-dimension vectors
        if self.embedding.provider == "local" && self.embedding.dims != DEFAULT_DIMS {
            bail!(
                "embedding.dims must be {} for the local provider (got {})",
                DEFAULT_DIMS,
                self.embedding.dims
            );
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                bail!("sources: name must not be empty");
            }
            if source.url.trim().is_empty() {
                bail!("sources.{}: url must not be empty", source.name);
            }
            if source.branch.trim().is_empty() {
                bail!("sources.{}: branch must not be empty", source.name);
            }
            if !names.insert(source.name.as_str()) {
                bail!("sources: duplicate source name '{}'", source.name);
            }
        }

        Ok(())
    }

    pub fn locations(&self) -> Vec<SourceLocation> {
        self.sources
            .iter()
            .map(|s| s.location(&self.sync))
            .collect()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

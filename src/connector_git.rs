//! Corpus sync: keep a local working copy of each source repository.
//!
//! Workflow per source:
//! 1. Spend one unit of the process-wide [`RateBudget`]; fail fast when it
//!    is exhausted.
//! 2. Clone if `<local_path>/.git` is missing, otherwise fetch and hard-reset
//!    to `origin/<branch>`.
//!
//! Git itself is driven through the [`RepoTransport`] trait; [`GitCli`]
//! shells out to the `git` executable.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use mdseek_core::models::SourceLocation;

/// Ceiling on external clone/pull calls for the lifetime of the process.
///
/// Never resets. Safe to share between concurrently syncing sources.
#[derive(Debug)]
pub struct RateBudget {
    ceiling: u64,
    spent: AtomicU64,
}

impl RateBudget {
    pub fn new(ceiling: u64) -> Self {
        Self {
            ceiling,
            spent: AtomicU64::new(0),
        }
    }

    /// Spend one unit. Returns `false`, spending nothing, once the ceiling
    /// is reached.
    pub fn try_consume(&self) -> bool {
        self.spent
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |spent| {
                (spent < self.ceiling).then_some(spent + 1)
            })
            .is_ok()
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    pub fn spent(&self) -> u64 {
        self.spent.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> u64 {
        self.ceiling.saturating_sub(self.spent())
    }
}

/// Why a source was skipped for this ingest pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind")]
pub enum SyncError {
    #[error("rate limit exceeded: skipped source '{source_name}'")]
    RateLimitExceeded { source_name: String },

    #[error("sync failed for source '{source_name}': {cause}")]
    SyncFailed { source_name: String, cause: String },
}

/// What a successful sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Cloned,
    Pulled,
}

/// Version-control transport used by [`sync_source`].
pub trait RepoTransport: Send + Sync {
    /// Create a new working copy of `url` at `dest`.
    fn clone_repo(&self, url: &str, branch: &str, dest: &Path) -> Result<()>;
    /// Bring an existing working copy up to date with `origin/<branch>`.
    fn pull(&self, repo_dir: &Path, branch: &str) -> Result<()>;
}

/// [`RepoTransport`] backed by the `git` executable.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli {
    /// Clone with `--depth 1`.
    pub shallow: bool,
}

impl RepoTransport for GitCli {
    fn clone_repo(&self, url: &str, branch: &str, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest)
            .with_context(|| format!("Failed to create working copy directory: {}", dest.display()))?;

        let mut cmd = Command::new("git");
        cmd.args(["clone", "--branch", branch, "--single-branch"]);
        if self.shallow {
            cmd.args(["--depth", "1"]);
        }
        cmd.arg(url);
        cmd.arg(dest);

        let output = cmd
            .output()
            .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git clone failed: {}", stderr.trim());
        }

        Ok(())
    }

    fn pull(&self, repo_dir: &Path, branch: &str) -> Result<()> {
        let output = Command::new("git")
            .args(["fetch", "origin", branch])
            .current_dir(repo_dir)
            .output()
            .with_context(|| "Failed to execute 'git fetch'")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git fetch failed: {}", stderr.trim());
        }

        let remote_ref = format!("origin/{}", branch);
        let output = Command::new("git")
            .args(["reset", "--hard", &remote_ref])
            .current_dir(repo_dir)
            .output()
            .with_context(|| "Failed to execute 'git reset'")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git reset failed: {}", stderr.trim());
        }

        Ok(())
    }
}

/// Whether `dir` already holds a working copy.
pub fn has_working_copy(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Embed an access token into an `https://` remote URL.
///
/// Other URL schemes are returned unchanged. `git clone` records this URL as
/// `remote.origin.url` in the working copy's `.git/config`, so the token is
/// stored on disk under the source's local path and reused by later fetches.
/// Keep `sync.cache_dir` readable only by the service account.
pub fn authenticated_url(url: &str, token: Option<&str>) -> String {
    match (url.strip_prefix("https://"), token) {
        (Some(rest), Some(token)) if !token.is_empty() => format!("https://{}@{}", token, rest),
        _ => url.to_string(),
    }
}

/// Shortest token that is also scrubbed where it appears outside a URL.
const MIN_BARE_REDACT_LEN: usize = 8;

fn redact(message: &str, token: Option<&str>) -> String {
    let Some(t) = token.filter(|t| !t.is_empty()) else {
        return message.to_string();
    };
    let scrubbed = message.replace(&format!("{}@", t), "***@");
    if t.len() >= MIN_BARE_REDACT_LEN {
        scrubbed.replace(t, "***")
    } else {
        scrubbed
    }
}

/// Clone or update one source under the rate budget.
///
/// `token` is only used to build the fetch URL; it is scrubbed from any
/// error message.
pub fn sync_source(
    location: &SourceLocation,
    token: Option<&str>,
    budget: &RateBudget,
    transport: &dyn RepoTransport,
) -> Result<SyncAction, SyncError> {
    let exists = has_working_copy(&location.local_path);

    if !budget.try_consume() {
        return Err(SyncError::RateLimitExceeded {
            source_name: location.name.clone(),
        });
    }

    let result = if exists {
        tracing::info!(source = %location.name, path = %location.local_path.display(), "pulling latest changes");
        transport
            .pull(&location.local_path, &location.branch)
            .map(|_| SyncAction::Pulled)
    } else {
        tracing::info!(source = %location.name, url = %location.url, "cloning repository");
        let fetch_url = authenticated_url(&location.url, token);
        transport
            .clone_repo(&fetch_url, &location.branch, &location.local_path)
            .map(|_| SyncAction::Cloned)
    };

    result.map_err(|e| SyncError::SyncFailed {
        source_name: location.name.clone(),
        cause: redact(&format!("{:#}", e), token),
    })
}

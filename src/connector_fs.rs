use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

use mdseek_core::models::{Document, SourceLocation};

use crate::config::LoaderConfig;
use crate::error::IngestFailure;

/// Documents found in one working copy, plus the files that were skipped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub failures: Vec<IngestFailure>,
}

/// Walk a working copy and load every Markdown file it contains.
///
/// Unreadable or non-UTF-8 files are recorded as
/// [`IngestFailure::LoadFailed`] and skipped. Documents come back sorted by
/// relative path, but callers should not rely on the order.
///
/// Only an invalid glob pattern in `config` is an error.
pub fn load_documents(location: &Arc<SourceLocation>, config: &LoaderConfig) -> Result<LoadReport> {
    let root = &location.local_path;
    let mut report = LoadReport::default();

    if !root.is_dir() {
        report.failures.push(IngestFailure::LoadFailed {
            path: root.display().to_string(),
            cause: "working copy does not exist".to_string(),
        });
        return Ok(report);
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                report.failures.push(IngestFailure::LoadFailed {
                    path,
                    cause: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel_str = relative_path(path, root);

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        match read_utf8(path) {
            Ok(content) => report.documents.push(Document {
                relative_path: rel_str,
                content,
                origin: location.clone(),
            }),
            Err(cause) => {
                tracing::warn!(path = %path.display(), %cause, "skipping unreadable file");
                report.failures.push(IngestFailure::LoadFailed {
                    path: path.display().to_string(),
                    cause,
                });
            }
        }
    }

    report
        .documents
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok(report)
}

/// `path` relative to `root`, with `/` separators on every platform.
fn relative_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_utf8(path: &Path) -> std::result::Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {}", e))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

//! Core data models shared by the ingestion pipeline and the query engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::search::SearchError;

/// A configured corpus member: a remote repository and the local working
/// copy it syncs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Short identifier used in logs and reports.
    pub name: String,
    /// Remote repository address (`https://host/org/repo.git` or `git@host:org/repo.git`).
    pub url: String,
    /// Local working-copy directory.
    pub local_path: PathBuf,
    /// Branch synced from the remote and used in browsable URLs.
    pub branch: String,
}

impl SourceLocation {
    /// Build a web-browsable URL for a file inside this repository.
    ///
    /// A trailing `.git` is stripped from the remote address, SSH-style
    /// `git@host:org/repo` addresses become `https://host/org/repo`, and a
    /// `blob/<branch>` segment is inserted before the relative path.
    ///
    /// ```rust
    /// use mdseek_core::models::SourceLocation;
    ///
    /// let loc = SourceLocation {
    ///     name: "labweek".into(),
    ///     url: "https://github.com/ciec-infra/labweek.git".into(),
    ///     local_path: "repos/labweek".into(),
    ///     branch: "main".into(),
    /// };
    /// assert_eq!(
    ///     loc.browse_url("docs/setup.md"),
    ///     "https://github.com/ciec-infra/labweek/blob/main/docs/setup.md"
    /// );
    /// ```
    pub fn browse_url(&self, relative_path: &str) -> String {
        let trimmed = self.url.trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

        let base = match trimmed.strip_prefix("git@") {
            Some(rest) => match rest.split_once(':') {
                Some((host, repo)) => format!("https://{}/{}", host, repo),
                None => format!("https://{}", rest),
            },
            None => trimmed.to_string(),
        };

        format!(
            "{}/blob/{}/{}",
            base,
            self.branch,
            relative_path.trim_start_matches('/')
        )
    }
}

/// A Markdown file loaded from a working copy.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the working-copy root, always `/`-separated.
    pub relative_path: String,
    pub content: String,
    pub origin: Arc<SourceLocation>,
}

/// A document paired with its embedding vector.
#[derive(Debug, Clone)]
pub struct EmbeddedDocument {
    pub document: Document,
    pub vector: Vec<f32>,
}

/// Default page size when a caller does not supply one.
pub const DEFAULT_PAGE_SIZE: usize = 3;

/// A validated search request.
///
/// Construct with [`QueryRequest::new`]; the fields are private so an
/// out-of-range page or size can never reach the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    text: String,
    page: usize,
    size: usize,
}

impl QueryRequest {
    /// Validate and build a request.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] when the text is blank, when
    /// `page` or `size` is below 1, or when the retrieval window
    /// `size * page` does not fit in a `usize`.
    pub fn new(text: impl Into<String>, page: i64, size: i64) -> Result<Self, SearchError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SearchError::Validation(
                "query must not be empty".to_string(),
            ));
        }
        if page < 1 {
            return Err(SearchError::Validation(format!(
                "page must be >= 1 (got {})",
                page
            )));
        }
        if size < 1 {
            return Err(SearchError::Validation(format!(
                "size must be >= 1 (got {})",
                size
            )));
        }
        let page = usize::try_from(page)
            .map_err(|_| SearchError::Validation(format!("page out of range: {}", page)))?;
        let size = usize::try_from(size)
            .map_err(|_| SearchError::Validation(format!("size out of range: {}", size)))?;
        if size.checked_mul(page).is_none() {
            return Err(SearchError::Validation(format!(
                "retrieval window size * page overflows ({} * {})",
                size, page
            )));
        }
        Ok(Self { text, page, size })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// One ranked hit on a result page.
///
/// Serialized with the field names the HTTP API has always used
/// (`file_path`, `score`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// Web-browsable URL of the document.
    #[serde(rename = "file_path")]
    pub document_url: String,
    pub snippet: String,
    /// Euclidean distance between the query and document embeddings.
    #[serde(rename = "score")]
    pub distance: f32,
    /// Full document content.
    pub content: String,
}

/// The outcome of a search: either a page of results or an explicit
/// "nothing matched" signal.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Results(Vec<RankedResult>),
    NoResults,
}

impl SearchOutcome {
    pub fn from_page(page: Vec<RankedResult>) -> Self {
        if page.is_empty() {
            SearchOutcome::NoResults
        } else {
            SearchOutcome::Results(page)
        }
    }

    /// The results on this page (empty for [`SearchOutcome::NoResults`]).
    pub fn results(&self) -> &[RankedResult] {
        match self {
            SearchOutcome::Results(r) => r,
            SearchOutcome::NoResults => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SearchOutcome::NoResults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(url: &str, branch: &str) -> SourceLocation {
        SourceLocation {
            name: "test".to_string(),
            url: url.to_string(),
            local_path: PathBuf::from("repo"),
            branch: branch.to_string(),
        }
    }

    #[test]
    fn test_browse_url_https_strips_git_suffix() {
        let loc = location("https://github.com/ciec-infra/labweek-test.git", "main");
        assert_eq!(
            loc.browse_url("README.md"),
            "https://github.com/ciec-infra/labweek-test/blob/main/README.md"
        );
    }

    #[test]
    fn test_browse_url_without_suffix() {
        let loc = location("https://gitlab.example.com/team/docs", "develop");
        assert_eq!(
            loc.browse_url("a/b.md"),
            "https://gitlab.example.com/team/docs/blob/develop/a/b.md"
        );
    }

    #[test]
    fn test_browse_url_ssh_form() {
        let loc = location("git@github.com:org/repo.git", "main");
        assert_eq!(
            loc.browse_url("guide.md"),
            "https://github.com/org/repo/blob/main/guide.md"
        );
    }

    #[test]
    fn test_browse_url_only_strips_trailing_git() {
        // ".git" inside the path must survive
        let loc = location("https://github.com/org/my.github.io.git", "main");
        assert_eq!(
            loc.browse_url("x.md"),
            "https://github.com/org/my.github.io/blob/main/x.md"
        );
    }

    #[test]
    fn test_query_request_valid() {
        let req = QueryRequest::new("terraform", 2, 3).unwrap();
        assert_eq!(req.text(), "terraform");
        assert_eq!(req.page(), 2);
        assert_eq!(req.size(), 3);
    }

    #[test]
    fn test_query_request_rejects_bad_page_and_size() {
        assert!(matches!(
            QueryRequest::new("q", 0, 3),
            Err(SearchError::Validation(_))
        ));
        assert!(matches!(
            QueryRequest::new("q", 1, 0),
            Err(SearchError::Validation(_))
        ));
        assert!(matches!(
            QueryRequest::new("q", -4, 3),
            Err(SearchError::Validation(_))
        ));
    }

    #[test]
    fn test_query_request_rejects_blank_text() {
        assert!(matches!(
            QueryRequest::new("   ", 1, 3),
            Err(SearchError::Validation(_))
        ));
    }

    #[test]
    fn test_query_request_rejects_window_overflow() {
        assert!(matches!(
            QueryRequest::new("q", i64::MAX, i64::MAX),
            Err(SearchError::Validation(_))
        ));
    }

    #[test]
    fn test_ranked_result_wire_names() {
        let r = RankedResult {
            document_url: "https://x/blob/main/a.md".to_string(),
            snippet: "s".to_string(),
            distance: 0.5,
            content: "c".to_string(),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["file_path"], "https://x/blob/main/a.md");
        assert_eq!(json["score"], 0.5);
    }

    #[test]
    fn test_outcome_from_empty_page() {
        assert_eq!(SearchOutcome::from_page(Vec::new()), SearchOutcome::NoResults);
        assert!(SearchOutcome::NoResults.results().is_empty());
    }
}

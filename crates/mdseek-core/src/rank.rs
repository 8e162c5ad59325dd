//! Ranking and pagination policy.
//!
//! # Algorithm
//!
//! 1. Fetch the `size × page` nearest candidates (the retrieval window
//!    always starts at rank 1 and grows linearly with the page number).
//! 2. Partition candidates, in distance order, into documents whose content
//!    contains the literal query (case-insensitive) and the rest.
//! 3. Page = all keyword matches, then as many of the rest as fit in `size`.
//!    Keyword matches are never dropped, so a page may exceed `size`.
//! 4. Each hit gets a snippet around the first occurrence of the query.
//!
//! Page `N` re-fetches and re-ranks everything pages `1..N` fetched. The
//! window policy sits behind [`CandidateRetriever`] so a cursor-based
//! implementation can replace [`GrowingWindow`] without touching callers.

use crate::index::{IndexError, Neighbor, SimilarityIndex};
use crate::models::{QueryRequest, RankedResult};

/// Characters of context kept before the first query occurrence.
pub const SNIPPET_LEAD: usize = 30;
/// Maximum snippet length in characters (excluding the ellipsis).
pub const SNIPPET_LEN: usize = 60;
/// Marker appended to snippets cut from longer content.
pub const ELLIPSIS: &str = "...";

/// Fetches the candidate set for one page.
pub trait CandidateRetriever: Send + Sync {
    fn retrieve<'a>(
        &self,
        index: &'a SimilarityIndex,
        query_vec: &[f32],
        request: &QueryRequest,
    ) -> Result<Vec<Neighbor<'a>>, IndexError>;
}

/// Re-queries the top `size × page` neighbors for every page.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrowingWindow;

impl GrowingWindow {
    /// Retrieval window for a request: `size × page`.
    pub fn window(request: &QueryRequest) -> usize {
        request.size() * request.page()
    }
}

impl CandidateRetriever for GrowingWindow {
    fn retrieve<'a>(
        &self,
        index: &'a SimilarityIndex,
        query_vec: &[f32],
        request: &QueryRequest,
    ) -> Result<Vec<Neighbor<'a>>, IndexError> {
        index.nearest_k(query_vec, Self::window(request))
    }
}

/// Character offset of the first case-insensitive occurrence of `needle`.
///
/// Comparison is per character using Unicode lowercase mappings, and the
/// returned offset counts characters, not bytes. An empty needle matches at 0.
pub fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() {
        return Some(0);
    }
    let hay: Vec<char> = haystack.chars().collect();
    if needle.len() > hay.len() {
        return None;
    }

    (0..=hay.len() - needle.len()).find(|&start| {
        hay[start..start + needle.len()]
            .iter()
            .zip(&needle)
            .all(|(a, b)| chars_eq_ignore_case(*a, *b))
    })
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Whether `content` contains `query`, ignoring case.
pub fn contains_keyword(content: &str, query: &str) -> bool {
    find_ignore_case(content, query).is_some()
}

/// Display snippet for `content` around the first occurrence of `query`.
///
/// Content of at most [`SNIPPET_LEN`] characters is returned unchanged.
/// Otherwise the window starts [`SNIPPET_LEAD`] characters before the match
/// (clamped to 0, or at 0 when there is no match), spans up to
/// [`SNIPPET_LEN`] characters, and gets an [`ELLIPSIS`].
pub fn build_snippet(content: &str, query: &str) -> String {
    let len = content.chars().count();
    if len <= SNIPPET_LEN {
        return content.to_string();
    }

    let start = find_ignore_case(content, query)
        .map(|pos| pos.saturating_sub(SNIPPET_LEAD))
        .unwrap_or(0);
    let end = (start + SNIPPET_LEN).min(len);

    let mut snippet: String = content.chars().skip(start).take(end - start).collect();
    snippet.push_str(ELLIPSIS);
    snippet
}

/// Split candidates into keyword matches and the rest, preserving order
/// within each list.
pub fn partition_by_keyword<'a>(
    candidates: Vec<Neighbor<'a>>,
    query: &str,
) -> (Vec<Neighbor<'a>>, Vec<Neighbor<'a>>) {
    candidates
        .into_iter()
        .partition(|n| contains_keyword(&n.document.content, query))
}

/// `keyword_matches ++ others[..max(0, size - keyword_matches.len())]`.
pub fn compose_page<T>(keyword_matches: Vec<T>, others: Vec<T>, size: usize) -> Vec<T> {
    let room = size.saturating_sub(keyword_matches.len());
    let mut page = keyword_matches;
    page.extend(others.into_iter().take(room));
    page
}

/// Turn one page worth of candidates into ranked, display-ready results.
pub fn rank_page(candidates: Vec<Neighbor<'_>>, request: &QueryRequest) -> Vec<RankedResult> {
    let (keyword_matches, others) = partition_by_keyword(candidates, request.text());
    tracing::debug!(
        keyword_matches = keyword_matches.len(),
        others = others.len(),
        "partitioned candidates"
    );

    compose_page(keyword_matches, others, request.size())
        .into_iter()
        .map(|n| RankedResult {
            document_url: n.document.origin.browse_url(&n.document.relative_path),
            snippet: build_snippet(&n.document.content, request.text()),
            distance: n.distance,
            content: n.document.content.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, EmbeddedDocument, SourceLocation};
    use std::sync::Arc;

    #[test]
    fn test_find_ignore_case() {
        assert_eq!(find_ignore_case("Hello World", "world"), Some(6));
        assert_eq!(find_ignore_case("Hello World", "WORLD"), Some(6));
        assert_eq!(find_ignore_case("Hello", "xyz"), None);
        assert_eq!(find_ignore_case("ab", "abc"), None);
        assert_eq!(find_ignore_case("anything", ""), Some(0));
    }

    #[test]
    fn test_find_ignore_case_counts_chars() {
        // "é" is two bytes; the offset must be in characters
        assert_eq!(find_ignore_case("éééTerraform", "terraform"), Some(3));
        assert_eq!(find_ignore_case("Ünïcode ÄRGER", "ärger"), Some(8));
    }

    #[test]
    fn test_snippet_short_content_unchanged() {
        let content = "Terraform setup guide. Use modules for reuse.";
        assert_eq!(build_snippet(content, "Terraform"), content);

        let exactly_60 = "x".repeat(60);
        assert_eq!(build_snippet(&exactly_60, "nope"), exactly_60);
    }

    #[test]
    fn test_snippet_window_around_match() {
        let content = format!("{}KEYWORD{}", "a".repeat(100), "b".repeat(100));
        let snippet = build_snippet(&content, "keyword");
        let expected = format!("{}KEYWORD{}...", "a".repeat(30), "b".repeat(23));
        assert_eq!(snippet, expected);
        assert_eq!(snippet.chars().count(), SNIPPET_LEN + ELLIPSIS.len());
    }

    #[test]
    fn test_snippet_match_near_start_clamps_to_zero() {
        let content = format!("intro KEYWORD {}", "z".repeat(100));
        let snippet = build_snippet(&content, "keyword");
        assert!(snippet.starts_with("intro KEYWORD"));
        assert_eq!(snippet.chars().count(), SNIPPET_LEN + ELLIPSIS.len());
    }

    #[test]
    fn test_snippet_no_match_leads_from_start() {
        let content: String = ('a'..='z').cycle().take(200).collect();
        let snippet = build_snippet(&content, "missing");
        let lead: String = content.chars().take(SNIPPET_LEN).collect();
        assert_eq!(snippet, format!("{}...", lead));
    }

    #[test]
    fn test_snippet_clamped_at_content_end() {
        let content = format!("{}END", "a".repeat(70));
        let snippet = build_snippet(&content, "end");
        // starts 30 chars before "END", stops at content end
        assert_eq!(snippet, format!("{}END...", "a".repeat(30)));
    }

    #[test]
    fn test_snippet_multibyte_content() {
        let content = "é".repeat(100);
        let snippet = build_snippet(&content, "zzz");
        assert_eq!(snippet, format!("{}...", "é".repeat(60)));
    }

    #[test]
    fn test_compose_keyword_first_then_fill() {
        let page = compose_page(vec!["k1", "k2"], vec!["o1", "o2", "o3"], 3);
        assert_eq!(page, vec!["k1", "k2", "o1"]);
    }

    #[test]
    fn test_compose_keyword_overflow_not_truncated() {
        let page = compose_page(vec!["k1", "k2", "k3", "k4"], vec!["o1"], 3);
        assert_eq!(page, vec!["k1", "k2", "k3", "k4"]);
    }

    #[test]
    fn test_compose_no_keyword_matches() {
        let page = compose_page(Vec::new(), vec!["o1", "o2", "o3", "o4"], 2);
        assert_eq!(page, vec!["o1", "o2"]);
    }

    #[test]
    fn test_compose_law_over_many_shapes() {
        for k in 0..6usize {
            for o in 0..6usize {
                for size in 1..6usize {
                    let kw: Vec<(bool, usize)> = (0..k).map(|i| (true, i)).collect();
                    let ot: Vec<(bool, usize)> = (0..o).map(|i| (false, i)).collect();
                    let page = compose_page(kw, ot, size);

                    let first_other = page.iter().position(|(is_kw, _)| !is_kw);
                    if let Some(pos) = first_other {
                        assert!(page[pos..].iter().all(|(is_kw, _)| !is_kw));
                    }
                    if k <= size {
                        assert!(page.len() >= k);
                        assert_eq!(page.len(), (k + o).min(size));
                    } else {
                        assert_eq!(page.len(), k);
                    }
                }
            }
        }
    }

    fn location() -> Arc<SourceLocation> {
        Arc::new(SourceLocation {
            name: "docs".to_string(),
            url: "https://github.com/org/docs.git".to_string(),
            local_path: "docs".into(),
            branch: "main".to_string(),
        })
    }

    fn embedded(path: &str, content: &str, x: f32) -> EmbeddedDocument {
        EmbeddedDocument {
            document: Document {
                relative_path: path.to_string(),
                content: content.to_string(),
                origin: location(),
            },
            vector: vec![x, 0.0],
        }
    }

    #[test]
    fn test_growing_window_size() {
        let req = QueryRequest::new("q", 4, 3).unwrap();
        assert_eq!(GrowingWindow::window(&req), 12);
        let next = QueryRequest::new("q", 5, 3).unwrap();
        assert!(GrowingWindow::window(&next) > GrowingWindow::window(&req));
    }

    #[test]
    fn test_rank_page_prefers_keyword_matches() {
        let index = SimilarityIndex::build(
            2,
            vec![
                embedded("close.md", "nothing relevant", 0.1),
                embedded("closer.md", "still nothing", 0.2),
                embedded("kw.md", "all about kubernetes", 0.9),
                embedded("far.md", "unrelated", 5.0),
            ],
        )
        .unwrap();
        let req = QueryRequest::new("Kubernetes", 1, 2).unwrap();
        let candidates = GrowingWindow.retrieve(&index, &[0.0, 0.0], &req).unwrap();
        assert_eq!(candidates.len(), 2);

        // "kw.md" is outside the page-1 window of 2, so only non-matches appear
        let page = rank_page(candidates, &req);
        assert_eq!(page.len(), 2);
        assert!(page[0].document_url.ends_with("/close.md"));

        let req2 = QueryRequest::new("Kubernetes", 2, 2).unwrap();
        let candidates = GrowingWindow.retrieve(&index, &[0.0, 0.0], &req2).unwrap();
        assert_eq!(candidates.len(), 4);
        let page = rank_page(candidates, &req2);
        assert_eq!(page.len(), 2);
        assert_eq!(
            page[0].document_url,
            "https://github.com/org/docs/blob/main/kw.md"
        );
        assert!(page[1].document_url.ends_with("/close.md"));
        assert!((page[0].distance - 0.9).abs() < 1e-6);
    }
}

//! Memoization of ranked result pages.
//!
//! Pages are keyed by the exact query text and page number (no
//! normalization: `"Rust"` and `"rust "` are distinct entries). With
//! [`CacheScope::Generation`] the index generation is part of the key, so a
//! re-ingest makes every older entry unreachable. [`CacheScope::Process`]
//! ignores the generation and may serve pages computed against a superseded
//! index.
//!
//! Entries of superseded generations are evicted as soon as a page for a
//! newer generation is stored; otherwise the cache is unbounded. An optional
//! TTL turns old entries into misses.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::models::RankedResult;

/// Whether cached pages survive a re-ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    /// Entries belong to the index generation they were computed against.
    #[default]
    Generation,
    /// Entries live for the whole process, across re-ingests.
    Process,
}

#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub enabled: bool,
    pub scope: CacheScope,
    /// Entries at least this old are treated as misses. `None` = never expire.
    pub ttl: Option<Duration>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: CacheScope::Generation,
            ttl: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    generation: Option<u64>,
    query: String,
    page: usize,
}

struct CacheEntry {
    results: Vec<RankedResult>,
    stored_at: Instant,
}

#[derive(Default)]
struct CacheState {
    /// Highest generation stored so far (generation scope only).
    newest_generation: u64,
    entries: HashMap<CacheKey, CacheEntry>,
}

/// Thread-safe page cache shared by all concurrent queries.
pub struct ResultCache {
    policy: CachePolicy,
    state: Mutex<CacheState>,
}

impl ResultCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    fn key(&self, generation: u64, query: &str, page: usize) -> CacheKey {
        CacheKey {
            generation: match self.policy.scope {
                CacheScope::Generation => Some(generation),
                CacheScope::Process => None,
            },
            query: query.to_string(),
            page,
        }
    }

    /// Look up a page. Expired entries are removed and reported as misses.
    pub fn get(&self, generation: u64, query: &str, page: usize) -> Option<Vec<RankedResult>> {
        if !self.policy.enabled {
            return None;
        }
        let key = self.key(generation, query, page);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let expired = match state.entries.get(&key) {
            None => return None,
            Some(entry) => self
                .policy
                .ttl
                .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl),
        };
        if expired {
            state.entries.remove(&key);
            return None;
        }
        state.entries.get(&key).map(|e| e.results.clone())
    }

    /// Store a page, replacing any previous entry for the same key.
    ///
    /// With [`CacheScope::Generation`], the first page stored for a newer
    /// generation evicts every entry of older ones, and pages computed
    /// against an already superseded generation are not stored.
    pub fn put(&self, generation: u64, query: &str, page: usize, results: Vec<RankedResult>) {
        if !self.policy.enabled {
            return;
        }
        let key = self.key(generation, query, page);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if self.policy.scope == CacheScope::Generation {
            if generation < state.newest_generation {
                return;
            }
            if generation > state.newest_generation {
                state
                    .entries
                    .retain(|k, _| k.generation >= Some(generation));
                state.newest_generation = generation;
            }
        }

        state.entries.insert(
            key,
            CacheEntry {
                results,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clear();
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

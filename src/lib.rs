//! # mdseek
//!
//! Semantic search over Markdown documents pulled from git repositories.
//!
//! mdseek keeps a local working copy of each configured repository, embeds
//! every Markdown file, and answers free-text queries with a paginated,
//! keyword-aware ranking and short snippets. The index lives in memory and
//! is rebuilt by each ingest pass.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌────────────┐   ┌──────────────┐
//! │ Corpus Sync │──▶│   Loader    │──▶│ Vectorizer │──▶│  Similarity  │
//! │    (git)    │   │  (walkdir)  │   │ (Embedder) │   │    Index     │
//! └─────────────┘   └─────────────┘   └────────────┘   └──────┬───────┘
//!                                                             │
//!                                         ┌───────────────────┤
//!                                         ▼                   ▼
//!                                    ┌──────────┐       ┌──────────┐
//!                                    │   CLI    │       │   HTTP   │
//!                                    │ (mdseek) │       │  (axum)  │
//!                                    └──────────┘       └──────────┘
//! ```
//!
//! Ranking, pagination, and caching live in the `mdseek-core` crate.
//!
//! ## Quick Start
//!
//! ```bash
//! mdseek sources                        # show configured repositories
//! mdseek ingest                         # sync, load, embed, index
//! mdseek search "terraform" --page 2    # one-shot query
//! mdseek serve                          # HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`connector_git`] | Corpus sync and the rate budget |
//! | [`connector_fs`] | Markdown document loader |
//! | [`embedding`] | Embedding providers |
//! | [`error`] | Per-item ingest failures |
//! | [`vectorize`] | Document embedding with failure isolation |
//! | [`ingest`] | Ingest pass orchestration |
//! | [`service`] | Shared index, cache, and engine state |
//! | [`search`] | CLI search command |
//! | [`server`] | HTTP server |
//! | [`sources`] | Source listing |

pub mod config;
pub mod connector_fs;
pub mod connector_git;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod search;
pub mod server;
pub mod service;
pub mod sources;
pub mod vectorize;

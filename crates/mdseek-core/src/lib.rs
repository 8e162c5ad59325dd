//! # mdseek Core
//!
//! Pure, I/O-free logic for mdseek: data models, the in-memory similarity
//! index, the ranking and pagination policy, the query-result cache, and the
//! embedding trait.
//!
//! This crate performs no filesystem, network, or process I/O. Repository
//! syncing, document loading, and concrete embedding providers live in the
//! `mdseek` application crate and feed into the types defined here.
//!
//! ## Query flow
//!
//! ```text
//! QueryRequest ─▶ ResultCache ──hit──▶ SearchOutcome
//!                     │ miss
//!                     ▼
//!               Embedder::embed ─▶ SimilarityIndex::nearest_k(size × page)
//!                                        │
//!                                        ▼
//!                      keyword partition ─▶ compose page ─▶ snippets
//! ```

pub mod cache;
pub mod embedding;
pub mod index;
pub mod models;
pub mod rank;
pub mod search;

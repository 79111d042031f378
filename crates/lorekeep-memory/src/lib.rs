//! TF-IDF indexed knowledge stores.
//!
//! Fragments live in two independent scopes, each a directory with one JSON
//! record per fragment plus a persisted inverted index. The dual store merges
//! search results across both and handles promotion between them.
//!
//! # Main types
//!
//! - [`TfIdfIndex`] — Inverted index with TF-IDF scoring.
//! - [`FragmentStore`] — Trait for single-scope fragment storage.
//! - [`ScopedStore`] — File-backed [`FragmentStore`].
//! - [`DualStore`] — Shared + personal stores with merged search and promotion.

/// Shared + personal store composition.
pub mod dual;
mod fs;
/// TF-IDF inverted index.
pub mod index;
/// Single-scope store trait and file-backed implementation.
pub mod store;
/// Text tokenization.
pub mod tokenize;

pub use dual::{AllStats, CombinedTotals, DualStore, MergeOptions, DEFAULT_PERSONAL_BOOST_TAGS};
pub use index::TfIdfIndex;
pub use store::{find_similar, FragmentStore, ScopedStore, SearchResult, StoreStats};
pub use tokenize::tokenize;

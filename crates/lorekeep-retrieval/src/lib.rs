//! Context-aware retrieval on top of the lorekeep stores.
//!
//! The retriever detects what the prompt is about from a static keyword
//! table, over-fetches candidates from the [`DualStore`], and re-ranks
//! them with tag, recency, access and scope boosts.
//!
//! [`DualStore`]: lorekeep_memory::DualStore

/// Score multipliers.
pub mod boost;
/// Rendering of retrieval results.
pub mod format;
/// Query engine.
pub mod retriever;
/// Keyword -> tag context rules.
pub mod rules;

pub use boost::{access_boost, recency_boost, recency_boost_at, tag_boost};
pub use format::{format_context, format_list, format_results, FormatStyle};
pub use retriever::{KnowledgeRetriever, RetrieveOptions, SHARED_SCOPE_BOOST};
pub use rules::{detect_context_tags, detect_with_rules, ContextRule, CONTEXT_RULES};

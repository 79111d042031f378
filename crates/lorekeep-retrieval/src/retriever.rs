use std::sync::Arc;

use lorekeep_core::{Fragment, KnowledgeResult, Scope};
use lorekeep_memory::{DualStore, MergeOptions, SearchResult};
use tracing::{debug, warn};

use crate::boost::{access_boost, recency_boost, tag_boost};
use crate::format::{format_results, FormatStyle};
use crate::rules::{detect_context_tags, has_personal_intent};

/// Extra weight for shared fragments when the prompt is not about personal workflow.
pub const SHARED_SCOPE_BOOST: f64 = 1.1;

/// How many candidates to pull per requested result before re-ranking.
const OVERFETCH: usize = 3;

/// Parameters for [`KnowledgeRetriever::retrieve`].
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    /// Maximum results.
    pub top_k: usize,
    /// Results scoring below this after boosting are dropped.
    pub min_score: f64,
    /// When false, personal fragments are excluded.
    pub include_personal: bool,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.1,
            include_personal: true,
        }
    }
}

/// Query engine over a [`DualStore`].
///
/// Raw TF-IDF scores from the stores are re-weighted by tag overlap with
/// the prompt's detected context, recency and frequency of access, and a
/// preference for shared knowledge.
pub struct KnowledgeRetriever {
    store: Arc<DualStore>,
}

impl KnowledgeRetriever {
    /// Create a retriever over `store`.
    pub fn new(store: Arc<DualStore>) -> Self {
        Self { store }
    }

    /// The underlying dual store.
    pub fn store(&self) -> &DualStore {
        &self.store
    }

    /// Retrieve the fragments most relevant to `prompt`, best first.
    pub async fn retrieve(
        &self,
        prompt: &str,
        options: &RetrieveOptions,
    ) -> KnowledgeResult<Vec<SearchResult>> {
        let boost_tags = detect_context_tags(prompt);
        let personal_intent = has_personal_intent(&boost_tags);

        let mut merge = MergeOptions::default().with_shared_boost(1.0);
        if !boost_tags.is_empty() {
            merge = merge.with_personal_boost_tags(boost_tags.clone());
        }

        let candidates = self
            .store
            .search(prompt, options.top_k.saturating_mul(OVERFETCH), &merge)
            .await?;
        debug!(
            candidates = candidates.len(),
            tags = ?boost_tags,
            "Retrieved candidates for re-ranking"
        );

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .filter(|r| options.include_personal || r.fragment.scope != Scope::Personal)
            .map(|mut r| {
                let mut score = r.score
                    * tag_boost(&r.fragment, &boost_tags)
                    * recency_boost(&r.fragment)
                    * access_boost(&r.fragment);
                if r.fragment.scope == Scope::Shared && !personal_intent {
                    score *= SHARED_SCOPE_BOOST;
                }
                r.score = score;
                r
            })
            .filter(|r| r.score >= options.min_score)
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.fragment.id.cmp(&b.fragment.id))
        });
        results.truncate(options.top_k);
        Ok(results)
    }

    /// Retrieve and render the results; empty string when nothing matched.
    pub async fn retrieve_and_format(
        &self,
        prompt: &str,
        options: &RetrieveOptions,
        style: FormatStyle,
    ) -> KnowledgeResult<String> {
        let results = self.retrieve(prompt, options).await?;
        Ok(format_results(&results, style))
    }

    /// Record an access on each fragment and persist it to its owning store.
    ///
    /// Best effort: failures are logged and skipped. Returns how many
    /// fragments were updated.
    pub async fn mark_retrieved(&self, fragments: &mut [Fragment]) -> usize {
        let mut updated = 0;
        for fragment in fragments.iter_mut() {
            fragment.mark_accessed();
            match self.store.store_for(fragment.scope).update(fragment).await {
                Ok(true) => updated += 1,
                Ok(false) => {
                    debug!(id = %fragment.id, "Retrieved fragment no longer exists");
                }
                Err(e) => {
                    warn!(id = %fragment.id, error = %e, "Failed to record fragment access");
                }
            }
        }
        updated
    }
}

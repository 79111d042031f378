use std::path::PathBuf;
use std::sync::Arc;

use lorekeep_core::{Fragment, KnowledgeError, KnowledgeResult, Scope};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::store::{FragmentStore, ScopedStore, SearchResult, StoreStats};

/// Tags that mark a personal fragment as a workflow/preference note.
pub const DEFAULT_PERSONAL_BOOST_TAGS: &[&str] = &["workflow", "preference", "personal"];

/// Options for merging shared and personal search results.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Multiplier applied to every shared result.
    pub shared_boost: f64,
    /// Personal results carrying any of these tags get `personal_tag_boost`.
    pub personal_boost_tags: Vec<String>,
    /// Multiplier for personal results matching `personal_boost_tags`.
    pub personal_tag_boost: f64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            shared_boost: 1.2,
            personal_boost_tags: DEFAULT_PERSONAL_BOOST_TAGS
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
            personal_tag_boost: 1.3,
        }
    }
}

impl MergeOptions {
    /// Set the shared multiplier. Chainable builder method.
    pub fn with_shared_boost(mut self, boost: f64) -> Self {
        self.shared_boost = boost;
        self
    }

    /// Replace the personal boost tags. Chainable builder method.
    pub fn with_personal_boost_tags(mut self, tags: Vec<String>) -> Self {
        self.personal_boost_tags = tags;
        self
    }
}

/// Totals across both scopes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombinedTotals {
    /// Fragments across both scopes.
    pub total_fragments: usize,
    /// Sum of both scopes' distinct term counts.
    pub total_terms: usize,
}

/// Statistics for both scopes plus their sums.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllStats {
    /// Shared scope.
    pub shared: StoreStats,
    /// Personal scope.
    pub personal: StoreStats,
    /// Sums over both scopes.
    pub combined: CombinedTotals,
}

/// The shared and personal stores behind one interface.
pub struct DualStore {
    shared: Arc<dyn FragmentStore>,
    personal: Arc<dyn FragmentStore>,
}

impl DualStore {
    /// Compose two existing stores.
    pub fn new(shared: Arc<dyn FragmentStore>, personal: Arc<dyn FragmentStore>) -> Self {
        Self { shared, personal }
    }

    /// Open file-backed stores at the two base directories.
    pub async fn open(
        shared_dir: impl Into<PathBuf>,
        personal_dir: impl Into<PathBuf>,
    ) -> KnowledgeResult<Self> {
        let shared = ScopedStore::open(Scope::Shared, shared_dir).await?;
        let personal = ScopedStore::open(Scope::Personal, personal_dir).await?;
        Ok(Self::new(Arc::new(shared), Arc::new(personal)))
    }

    /// The shared (committed) store.
    pub fn shared(&self) -> &dyn FragmentStore {
        self.shared.as_ref()
    }

    /// The personal (private) store.
    pub fn personal(&self) -> &dyn FragmentStore {
        self.personal.as_ref()
    }

    /// The store that owns `scope`.
    pub fn store_for(&self, scope: Scope) -> &dyn FragmentStore {
        match scope {
            Scope::Shared => self.shared(),
            Scope::Personal => self.personal(),
        }
    }

    /// Add a fragment to the store matching its scope.
    ///
    /// Fails with [`KnowledgeError::DuplicateId`] when the id already lives
    /// in the other scope.
    pub async fn add(&self, fragment: Fragment) -> KnowledgeResult<String> {
        let other = match fragment.scope {
            Scope::Shared => self.personal(),
            Scope::Personal => self.shared(),
        };
        if other.get(&fragment.id).await?.is_some() {
            return Err(KnowledgeError::DuplicateId(fragment.id));
        }
        self.store_for(fragment.scope).add(fragment).await
    }

    /// Look a fragment up in shared first, then personal.
    pub async fn get(&self, id: &str) -> KnowledgeResult<Option<Fragment>> {
        if let Some(fragment) = self.shared.get(id).await? {
            return Ok(Some(fragment));
        }
        self.personal.get(id).await
    }

    /// Delete a fragment from whichever store holds it.
    pub async fn delete(&self, id: &str) -> KnowledgeResult<bool> {
        if self.shared.delete(id).await? {
            return Ok(true);
        }
        self.personal.delete(id).await
    }

    /// Search both stores and merge the results.
    ///
    /// Each store is over-fetched at `top_k * 2`. Shared scores are scaled by
    /// `shared_boost`; personal scores by `personal_tag_boost` when the
    /// fragment carries one of `personal_boost_tags`. The merged list is
    /// sorted by score (ties: shared first, then id), deduplicated by id and
    /// truncated to `top_k`.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        options: &MergeOptions,
    ) -> KnowledgeResult<Vec<SearchResult>> {
        let fetch = top_k.saturating_mul(2);
        let (shared, personal) = tokio::join!(
            self.shared.search(query, fetch),
            self.personal.search(query, fetch)
        );

        let mut merged: Vec<SearchResult> = Vec::new();
        for mut result in shared? {
            result.score *= options.shared_boost;
            merged.push(result);
        }
        for mut result in personal? {
            let preferred = result
                .fragment
                .tags
                .iter()
                .any(|tag| options.personal_boost_tags.contains(tag));
            if preferred {
                result.score *= options.personal_tag_boost;
            }
            merged.push(result);
        }

        merged.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.fragment.scope.cmp(&b.fragment.scope))
                .then_with(|| a.fragment.id.cmp(&b.fragment.id))
        });

        let mut seen = std::collections::HashSet::new();
        merged.retain(|r| seen.insert(r.fragment.id.clone()));
        merged.truncate(top_k);
        Ok(merged)
    }

    /// Move a fragment from personal to shared.
    ///
    /// Returns `Ok(false)` when no such personal fragment exists, and
    /// [`KnowledgeError::DuplicateId`] without touching either store when
    /// shared already holds the id. If the shared write fails after the
    /// personal copy was removed, the original is written back to personal
    /// before the error is returned.
    pub async fn promote(&self, id: &str) -> KnowledgeResult<bool> {
        let Some(original) = self.personal.get(id).await? else {
            return Ok(false);
        };
        if self.shared.get(id).await?.is_some() {
            return Err(KnowledgeError::DuplicateId(id.to_string()));
        }
        if !self.personal.delete(id).await? {
            return Ok(false);
        }

        let mut promoted = original.clone();
        promoted.scope = Scope::Shared;
        match self.shared.add(promoted).await {
            Ok(_) => {
                info!(id, "Fragment promoted to shared");
                Ok(true)
            }
            Err(e) => {
                warn!(id, error = %e, "Promotion failed; restoring personal fragment");
                if let Err(restore) = self.personal.add(original).await {
                    error!(id, error = %restore, "Failed to restore personal fragment after promotion failure");
                }
                Err(e)
            }
        }
    }

    /// Rebuild both indexes, returning `(shared, personal)` counts.
    pub async fn rebuild_all(&self) -> KnowledgeResult<(usize, usize)> {
        let shared = self.shared.rebuild_index().await?;
        let personal = self.personal.rebuild_index().await?;
        Ok((shared, personal))
    }

    /// Statistics from both stores plus combined totals.
    pub async fn all_stats(&self) -> KnowledgeResult<AllStats> {
        let shared = self.shared.stats().await?;
        let personal = self.personal.stats().await?;
        let combined = CombinedTotals {
            total_fragments: shared.total_fragments + personal.total_fragments,
            total_terms: shared.total_terms + personal.total_terms,
        };
        Ok(AllStats {
            shared,
            personal,
            combined,
        })
    }
}

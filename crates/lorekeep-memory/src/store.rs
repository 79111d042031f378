use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lorekeep_core::{is_valid_id, Fragment, KnowledgeError, KnowledgeResult, Scope};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::fs;
use crate::index::TfIdfIndex;

/// Sub-directory holding one JSON record per fragment.
pub const FRAGMENTS_DIR: &str = "fragments";
/// Persisted index file name.
pub const INDEX_FILE: &str = "index.json";
/// Advisory lock file serializing index updates across processes.
pub const LOCK_FILE: &str = ".index.lock";

/// A fragment paired with its relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// The matching fragment.
    pub fragment: Fragment,
    /// Relevance; higher is better.
    pub score: f64,
}

/// Derived statistics for one scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    /// Scope the statistics describe.
    pub scope: Scope,
    /// Readable fragment records.
    pub total_fragments: usize,
    /// Distinct indexed terms.
    pub total_terms: usize,
    /// Fragments per tag.
    pub tag_counts: BTreeMap<String, usize>,
    /// Fragments per source label.
    pub source_counts: BTreeMap<String, usize>,
    /// Sum of every fragment's access count.
    pub total_accesses: u64,
}

/// Storage backend for the fragments of a single scope.
///
/// Unknown ids are reported through `None`/`false`, never through `Err`.
#[async_trait]
pub trait FragmentStore: Send + Sync {
    /// The scope every fragment in this store carries.
    fn scope(&self) -> Scope;

    /// Persist a fragment (its scope is rewritten to the store's) and index it.
    async fn add(&self, fragment: Fragment) -> KnowledgeResult<String>;

    /// Load a fragment by id. Missing and malformed records are both `None`.
    async fn get(&self, id: &str) -> KnowledgeResult<Option<Fragment>>;

    /// Overwrite an existing fragment and re-index it. `false` if it does not exist.
    async fn update(&self, fragment: &Fragment) -> KnowledgeResult<bool>;

    /// Delete a fragment and its index entry. `false` if it does not exist.
    async fn delete(&self, id: &str) -> KnowledgeResult<bool>;

    /// Top-k fragments for a free-text query, highest score first.
    async fn search(&self, query: &str, top_k: usize) -> KnowledgeResult<Vec<SearchResult>>;

    /// Every readable fragment, ordered by id.
    async fn list_all(&self) -> KnowledgeResult<Vec<Fragment>>;

    /// Discard the index and rebuild it from the persisted records.
    async fn rebuild_index(&self) -> KnowledgeResult<usize>;

    /// Aggregate statistics.
    async fn stats(&self) -> KnowledgeResult<StoreStats>;
}

/// A mutation routed through [`ScopedStore::apply`].
enum Change<'a> {
    /// Write the record and (re)index it; with `must_exist`, only when a
    /// record for the id is already present.
    Put {
        fragment: &'a Fragment,
        must_exist: bool,
    },
    /// Delete the record, then its index entry.
    Remove(&'a str),
    /// Re-index every readable record from scratch.
    Rebuild,
}

/// File-backed store for one scope.
///
/// Layout under `base_dir`: `fragments/<id>.json`, `index.json` and the
/// `.index.lock` lock file. Every mutation reloads the persisted index under
/// the lock before applying itself, so concurrent processes do not overwrite
/// each other's index updates.
pub struct ScopedStore {
    scope: Scope,
    base_dir: PathBuf,
    fragments_dir: PathBuf,
    index_path: PathBuf,
    lock_path: PathBuf,
    index: RwLock<TfIdfIndex>,
}

impl ScopedStore {
    /// Open the store rooted at `base_dir`, creating the directory layout if needed.
    pub async fn open(scope: Scope, base_dir: impl Into<PathBuf>) -> KnowledgeResult<Self> {
        let base_dir = base_dir.into();
        let fragments_dir = base_dir.join(FRAGMENTS_DIR);
        tokio::fs::create_dir_all(&fragments_dir).await.map_err(|e| {
            KnowledgeError::Store(format!(
                "Failed to create {scope} store at '{}': {e}",
                base_dir.display()
            ))
        })?;

        let index_path = base_dir.join(INDEX_FILE);
        let index = load_index(&index_path, scope).await?;
        debug!(%scope, dir = %base_dir.display(), docs = index.document_count(), "Store opened");

        Ok(Self {
            scope,
            lock_path: base_dir.join(LOCK_FILE),
            fragments_dir,
            index_path,
            base_dir,
            index: RwLock::new(index),
        })
    }

    /// Root directory of this scope.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// A copy of the in-memory index.
    pub async fn index_snapshot(&self) -> TfIdfIndex {
        self.index.read().await.clone()
    }

    fn fragment_path(&self, id: &str) -> PathBuf {
        self.fragments_dir.join(format!("{id}.json"))
    }

    /// Read and parse one record; the file name is authoritative for id and
    /// the directory for scope.
    async fn read_fragment(&self, id: &str) -> KnowledgeResult<Option<Fragment>> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        let path = self.fragment_path(id);
        let data = match fs::read_optional(&path).await {
            Ok(Some(data)) => data,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(scope = %self.scope, id, error = %e, "Skipping unreadable fragment record");
                return Ok(None);
            }
        };

        match serde_json::from_str::<Fragment>(&data) {
            Ok(mut fragment) => {
                if fragment.id != id || fragment.scope != self.scope {
                    debug!(scope = %self.scope, id, "Normalizing record id/scope to its location");
                    fragment.id = id.to_string();
                    fragment.scope = self.scope;
                }
                Ok(Some(fragment))
            }
            Err(e) => {
                warn!(scope = %self.scope, id, error = %e, "Skipping malformed fragment record");
                Ok(None)
            }
        }
    }

    async fn record_exists(&self, id: &str) -> KnowledgeResult<bool> {
        Ok(tokio::fs::try_exists(self.fragment_path(id)).await?)
    }

    /// Apply one index-changing operation.
    ///
    /// Holds the in-process index lock and the lock file for the whole
    /// read-modify-write cycle, starting from the index as persisted on disk.
    /// Returns how many fragments were written, removed or indexed; `0` means
    /// the target record did not exist.
    async fn apply(&self, change: Change<'_>) -> KnowledgeResult<usize> {
        let mut index = self.index.write().await;
        let mut lock = fs::open_lock(&self.lock_path)?;
        // Never block the runtime thread on the lock file.
        let _guard = loop {
            match lock.try_write() {
                Ok(guard) => break guard,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    tokio::time::sleep(fs::LOCK_RETRY_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        };

        match change {
            Change::Put {
                fragment,
                must_exist,
            } => {
                if must_exist && !self.record_exists(&fragment.id).await? {
                    return Ok(0);
                }
                *index = load_index(&self.index_path, self.scope).await?;
                fs::write_json_atomic(&self.fragment_path(&fragment.id), fragment).await?;
                index.add_document(&fragment.id, &fragment.content, &fragment.tags);
                fs::write_json_atomic(&self.index_path, &*index).await?;
                Ok(1)
            }
            Change::Remove(id) => {
                if !fs::remove_if_exists(&self.fragment_path(id)).await? {
                    return Ok(0);
                }
                *index = load_index(&self.index_path, self.scope).await?;
                index.remove_document(id);
                fs::write_json_atomic(&self.index_path, &*index).await?;
                Ok(1)
            }
            Change::Rebuild => {
                let fragments = self.list_all().await?;
                let mut fresh = TfIdfIndex::new();
                for fragment in &fragments {
                    fresh.add_document(&fragment.id, &fragment.content, &fragment.tags);
                }
                fs::write_json_atomic(&self.index_path, &fresh).await?;
                *index = fresh;
                Ok(fragments.len())
            }
        }
    }
}

/// Load the persisted index, treating a missing or malformed file as empty.
async fn load_index(path: &Path, scope: Scope) -> KnowledgeResult<TfIdfIndex> {
    let Some(data) = fs::read_optional(path).await? else {
        return Ok(TfIdfIndex::new());
    };
    match serde_json::from_str::<TfIdfIndex>(&data) {
        Ok(index) => Ok(index),
        Err(e) => {
            warn!(%scope, error = %e, "Index file is malformed; starting from an empty index");
            Ok(TfIdfIndex::new())
        }
    }
}

#[async_trait]
impl FragmentStore for ScopedStore {
    fn scope(&self) -> Scope {
        self.scope
    }

    async fn add(&self, mut fragment: Fragment) -> KnowledgeResult<String> {
        fragment.scope = self.scope;
        fragment.validate()?;

        self.apply(Change::Put {
            fragment: &fragment,
            must_exist: false,
        })
        .await?;
        debug!(scope = %self.scope, id = %fragment.id, "Fragment added");
        Ok(fragment.id)
    }

    async fn get(&self, id: &str) -> KnowledgeResult<Option<Fragment>> {
        self.read_fragment(id).await
    }

    async fn update(&self, fragment: &Fragment) -> KnowledgeResult<bool> {
        if fragment.scope != self.scope {
            warn!(
                scope = %self.scope,
                id = %fragment.id,
                fragment_scope = %fragment.scope,
                "Refusing to update a fragment from another scope"
            );
            return Ok(false);
        }
        if !is_valid_id(&fragment.id) {
            return Ok(false);
        }
        fragment.validate()?;

        let updated = self
            .apply(Change::Put {
                fragment,
                must_exist: true,
            })
            .await?
            > 0;
        if updated {
            debug!(scope = %self.scope, id = %fragment.id, "Fragment updated");
        }
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> KnowledgeResult<bool> {
        if !is_valid_id(id) {
            return Ok(false);
        }
        let deleted = self.apply(Change::Remove(id)).await? > 0;
        if deleted {
            debug!(scope = %self.scope, id, "Fragment deleted");
        }
        Ok(deleted)
    }

    async fn search(&self, query: &str, top_k: usize) -> KnowledgeResult<Vec<SearchResult>> {
        let hits = self.index.read().await.search(query, top_k);

        let mut results = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            match self.read_fragment(&id).await? {
                Some(fragment) => results.push(SearchResult { fragment, score }),
                None => debug!(scope = %self.scope, id = %id, "Indexed fragment has no record"),
            }
        }
        Ok(results)
    }

    async fn list_all(&self) -> KnowledgeResult<Vec<Fragment>> {
        let mut entries = match tokio::fs::read_dir(&self.fragments_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut fragments = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if fs::is_temp_file(&path) || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(fragment) = self.read_fragment(id).await? {
                fragments.push(fragment);
            }
        }

        fragments.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(fragments)
    }

    async fn rebuild_index(&self) -> KnowledgeResult<usize> {
        let count = self.apply(Change::Rebuild).await?;
        info!(scope = %self.scope, count, "Index rebuilt");
        Ok(count)
    }

    async fn stats(&self) -> KnowledgeResult<StoreStats> {
        let fragments = self.list_all().await?;
        let total_terms = self.index.read().await.term_count();

        let mut stats = StoreStats {
            scope: self.scope,
            total_fragments: fragments.len(),
            total_terms,
            ..StoreStats::default()
        };
        for fragment in &fragments {
            for tag in &fragment.tags {
                *stats.tag_counts.entry(tag.clone()).or_insert(0) += 1;
            }
            *stats
                .source_counts
                .entry(fragment.source.clone())
                .or_insert(0) += 1;
            stats.total_accesses += fragment.accessed_count;
        }
        Ok(stats)
    }
}

/// Find an existing fragment whose content closely matches `content`.
///
/// Runs a top-1 search and returns the hit only when its score reaches
/// `threshold`. Used to skip storing near-duplicates.
pub async fn find_similar(
    store: &dyn FragmentStore,
    content: &str,
    threshold: f64,
) -> KnowledgeResult<Option<Fragment>> {
    let mut results = store.search(content, 1).await?;
    match results.pop() {
        Some(hit) if hit.score >= threshold => Ok(Some(hit.fragment)),
        _ => Ok(None),
    }
}

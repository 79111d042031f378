#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the lorekeep-retrieval crate.
//!
//! Exercises the full retrieval path over file-backed stores: context tag
//! boosting, scope preference, filtering, access tracking and formatting.

use std::sync::Arc;

use lorekeep_core::{Fragment, Scope};
use lorekeep_memory::store::FRAGMENTS_DIR;
use lorekeep_memory::{DualStore, FragmentStore};
use lorekeep_retrieval::{FormatStyle, KnowledgeRetriever, RetrieveOptions};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn temp_retriever() -> (KnowledgeRetriever, TempDir) {
    let tmp = TempDir::new().unwrap();
    let store = DualStore::open(tmp.path().join("knowledge"), tmp.path().join("local"))
        .await
        .unwrap();
    (KnowledgeRetriever::new(Arc::new(store)), tmp)
}

fn all_results(top_k: usize) -> RetrieveOptions {
    RetrieveOptions {
        top_k,
        min_score: 0.0,
        include_personal: true,
    }
}

async fn add_filler(retriever: &KnowledgeRetriever, scope: Scope) {
    retriever
        .store()
        .add(Fragment::new("unrelated onboarding checklist", scope))
        .await
        .unwrap();
    retriever
        .store()
        .add(Fragment::new("release notes template", scope))
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// 1. Tag boosting from detected context
// ---------------------------------------------------------------------------

#[tokio::test]
async fn api_prompt_boosts_tagged_shared_fragment() {
    let (retriever, _tmp) = temp_retriever().await;
    add_filler(&retriever, Scope::Shared).await;
    let id = retriever
        .store()
        .add(
            Fragment::shared("use query options factory for data fetching")
                .with_tags(["api", "tanstack-query"]),
        )
        .await
        .unwrap();

    let raw = retriever
        .store()
        .shared()
        .search("how to fetch data", 5)
        .await
        .unwrap();
    assert_eq!(raw[0].fragment.id, id);
    assert!(raw[0].score > 0.0);

    let results = retriever
        .retrieve("how to fetch data", &all_results(5))
        .await
        .unwrap();
    assert_eq!(results[0].fragment.id, id);
    assert!(results[0].score > raw[0].score);
    // 2 of 4 api tags matched, plus the shared-scope preference.
    let expected = raw[0].score * 1.15 * 1.1;
    assert!((results[0].score - expected).abs() < 1e-9);
}

#[tokio::test]
async fn workflow_prompt_ranks_tagged_personal_fragment_first() {
    let (retriever, _tmp) = temp_retriever().await;
    add_filler(&retriever, Scope::Personal).await;
    let tagged = retriever
        .store()
        .add(Fragment::personal("write commit messages in imperative mood").with_tags(["workflow"]))
        .await
        .unwrap();
    let untagged = retriever
        .store()
        .add(Fragment::personal("write commit messages in imperative mood"))
        .await
        .unwrap();

    let results = retriever
        .retrieve("what is my workflow for commit messages", &all_results(5))
        .await
        .unwrap();

    let rank = |id: &str| results.iter().position(|r| r.fragment.id == id).unwrap();
    assert!(rank(&tagged) < rank(&untagged));
    let score = |id: &str| results[rank(id)].score;
    assert!(score(&tagged) > score(&untagged));
}

// ---------------------------------------------------------------------------
// 2. Scope handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shared_wins_ties_for_project_prompts() {
    let (retriever, _tmp) = temp_retriever().await;
    add_filler(&retriever, Scope::Shared).await;
    add_filler(&retriever, Scope::Personal).await;
    let shared = retriever
        .store()
        .add(Fragment::shared("monorepo build caching"))
        .await
        .unwrap();
    retriever
        .store()
        .add(Fragment::personal("monorepo build caching"))
        .await
        .unwrap();

    let results = retriever
        .retrieve("monorepo caching", &all_results(5))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].fragment.id, shared);
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn excluding_personal_drops_personal_results() {
    let (retriever, _tmp) = temp_retriever().await;
    add_filler(&retriever, Scope::Shared).await;
    add_filler(&retriever, Scope::Personal).await;
    retriever
        .store()
        .add(Fragment::shared("docker compose profiles"))
        .await
        .unwrap();
    retriever
        .store()
        .add(Fragment::personal("docker desktop memory limit"))
        .await
        .unwrap();

    let options = RetrieveOptions {
        include_personal: false,
        ..all_results(5)
    };
    let results = retriever.retrieve("docker", &options).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results.iter().all(|r| r.fragment.scope == Scope::Shared));
}

// ---------------------------------------------------------------------------
// 3. Thresholds and limits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn min_score_and_top_k_are_applied() {
    let (retriever, _tmp) = temp_retriever().await;
    add_filler(&retriever, Scope::Shared).await;
    for i in 0..6 {
        retriever
            .store()
            .add(Fragment::shared(format!("graphql schema stitching part{i}")))
            .await
            .unwrap();
    }

    let results = retriever.retrieve("graphql", &all_results(3)).await.unwrap();
    assert_eq!(results.len(), 3);

    let strict = RetrieveOptions {
        min_score: 10.0,
        ..all_results(3)
    };
    assert!(retriever.retrieve("graphql", &strict).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_knowledge_base_returns_nothing() {
    let (retriever, _tmp) = temp_retriever().await;
    let results = retriever
        .retrieve("how do I configure the api client", &RetrieveOptions::default())
        .await
        .unwrap();
    assert!(results.is_empty());
    let text = retriever
        .retrieve_and_format("anything", &RetrieveOptions::default(), FormatStyle::Context)
        .await
        .unwrap();
    assert!(text.is_empty());
}

#[tokio::test]
async fn unreadable_record_is_left_out_of_retrieval() {
    let (retriever, tmp) = temp_retriever().await;
    add_filler(&retriever, Scope::Shared).await;
    let kept = retriever
        .store()
        .add(Fragment::shared("helm chart values layering"))
        .await
        .unwrap();
    let broken = retriever
        .store()
        .add(Fragment::shared("helm release hooks"))
        .await
        .unwrap();
    let record = tmp
        .path()
        .join("knowledge")
        .join(FRAGMENTS_DIR)
        .join(format!("{broken}.json"));
    std::fs::remove_file(&record).unwrap();
    std::fs::create_dir(&record).unwrap();

    let results = retriever.retrieve("helm", &all_results(5)).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].fragment.id, kept);
}

// ---------------------------------------------------------------------------
// 4. Access tracking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mark_retrieved_persists_access_and_lifts_ranking() {
    let (retriever, _tmp) = temp_retriever().await;
    add_filler(&retriever, Scope::Shared).await;
    let first = retriever
        .store()
        .add(Fragment::shared("terraform state locking").with_id("aaaa0001"))
        .await
        .unwrap();
    let second = retriever
        .store()
        .add(Fragment::shared("terraform state locking").with_id("aaaa0002"))
        .await
        .unwrap();

    let results = retriever.retrieve("terraform", &all_results(5)).await.unwrap();
    assert_eq!(results[0].fragment.id, first, "ties break by id");

    let mut picked = vec![retriever.store().get(&second).await.unwrap().unwrap()];
    assert_eq!(retriever.mark_retrieved(&mut picked).await, 1);
    assert_eq!(retriever.mark_retrieved(&mut picked).await, 1);

    let stored = retriever.store().get(&second).await.unwrap().unwrap();
    assert_eq!(stored.accessed_count, 2);
    assert!(stored.last_accessed.is_some());

    let results = retriever.retrieve("terraform", &all_results(5)).await.unwrap();
    assert_eq!(results[0].fragment.id, second);
}

#[tokio::test]
async fn mark_retrieved_skips_vanished_fragments() {
    let (retriever, _tmp) = temp_retriever().await;
    let id = retriever
        .store()
        .add(Fragment::personal("temporary note"))
        .await
        .unwrap();
    let mut fragments = vec![retriever.store().get(&id).await.unwrap().unwrap()];
    retriever.store().delete(&id).await.unwrap();

    assert_eq!(retriever.mark_retrieved(&mut fragments).await, 0);
    assert!(retriever.store().get(&id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// 5. Formatting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retrieve_and_format_renders_list() {
    let (retriever, _tmp) = temp_retriever().await;
    add_filler(&retriever, Scope::Shared).await;
    retriever
        .store()
        .add(Fragment::shared("tailwind container queries").with_tags(["styling"]).with_id("tw01"))
        .await
        .unwrap();

    let text = retriever
        .retrieve_and_format("tailwind layout", &all_results(5), FormatStyle::List)
        .await
        .unwrap();
    assert!(text.starts_with("Found knowledge fragments:"));
    assert!(text.contains("1. [tw01] (shared, styling)"));
}

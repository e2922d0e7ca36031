//! # Reconciliation Tests
//!
//! Drives `Reconciler` and `SimilarityResolver` with in-memory doubles to check the
//! write order between the vector index and the record store.

mod common;

use anyhow::Result;
use common::setup_tracing;
use ideasieve::dedup::{normalize, MatchPolicy, ReconcileError, ReconcileOutcome, Reconciler, SimilarityResolver};
use ideasieve::providers::db::{Ledger, VectorIndex};
use ideasieve::types::{Decision, Idea, SeenUrlRecord, UrlFingerprint, VectorMatch};
use ideasieve_test_utils::{idea_metadata, raw_draft, MockRecordStore, MockVectorIndex, TestSetup};

fn idea(title: &str, embedding: Vec<f32>, fp: Option<&UrlFingerprint>) -> Idea {
    let raw = raw_draft(title, &format!("{title} problem"), &format!("{title} solution"));
    let mut idea = normalize(&raw, fp).unwrap();
    idea.embedding = embedding;
    idea
}

fn reconciler(index: &MockVectorIndex, records: &MockRecordStore) -> Reconciler {
    Reconciler::new(Box::new(index.clone()), Box::new(records.clone()))
}

#[tokio::test]
async fn test_similar_idea_merges_and_mirrors_new_count() -> Result<()> {
    setup_tracing();
    // --- Arrange ---
    let index = MockVectorIndex::new();
    let records = MockRecordStore::new();
    index.insert("Smart Home AI Router", idea_metadata("Smart Home AI Router", 1), vec![1.0, 0.1, 0.0]);
    records.seed("Smart Home AI Router", 1);
    let resolver = SimilarityResolver::default();
    let incoming = idea("AI Router for Homes", vec![1.0, 0.2, 0.0], None);

    // --- Act ---
    let decision = resolver.resolve(&index, &incoming.embedding).await?;
    let outcome = reconciler(&index, &records).apply(&incoming, decision).await?;

    // --- Assert ---
    assert_eq!(
        outcome,
        ReconcileOutcome::Merged {
            id: "Smart Home AI Router".to_string(),
            count: 2,
            mirrored: true
        }
    );
    assert_eq!(index.count_of("Smart Home AI Router"), Some(2));
    assert_eq!(index.len(), 1);
    assert_eq!(records.count_of("Smart Home AI Router"), Some(2));
    assert!(records.find("AI Router for Homes").is_none());
    Ok(())
}

#[tokio::test]
async fn test_dissimilar_idea_is_created_with_count_one() -> Result<()> {
    setup_tracing();
    let index = MockVectorIndex::new();
    let records = MockRecordStore::new();
    index.insert("Solar Drone Fleet", idea_metadata("Solar Drone Fleet", 4), vec![0.0, 0.0, 1.0]);
    let incoming = idea("Edge AI Router", vec![1.0, 0.0, 0.0], None);

    let decision = SimilarityResolver::default()
        .resolve(&index, &incoming.embedding)
        .await?;
    assert_eq!(decision, Decision::New);
    let outcome = reconciler(&index, &records).apply(&incoming, decision).await?;

    assert!(matches!(outcome, ReconcileOutcome::Created { mirrored: true, .. }));
    assert_eq!(index.count_of("Edge AI Router"), Some(1));
    assert_eq!(index.count_of("Solar Drone Fleet"), Some(4));
    assert_eq!(records.count_of("Edge AI Router"), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_vector_write_failure_skips_record_store() -> Result<()> {
    setup_tracing();
    // --- Arrange ---
    let index = MockVectorIndex::new();
    let records = MockRecordStore::new();
    index.insert("Smart Home AI Router", idea_metadata("Smart Home AI Router", 1), vec![1.0, 0.0, 0.0]);
    records.seed("Smart Home AI Router", 1);
    index.set_fail_writes(true);
    let reconciler = reconciler(&index, &records);

    // --- Act ---
    let merge = reconciler
        .apply(
            &idea("AI Router for Homes", vec![1.0, 0.0, 0.0], None),
            SimilarityResolver::default()
                .resolve(&index, &[1.0, 0.0, 0.0])
                .await?,
        )
        .await;
    let create = reconciler
        .apply(&idea("Unrelated", vec![0.0, 1.0, 0.0], None), Decision::New)
        .await;

    // --- Assert ---
    assert!(matches!(merge, Err(ReconcileError::VectorWrite { .. })));
    assert!(matches!(create, Err(ReconcileError::VectorWrite { .. })));
    assert!(records.get_writes().is_empty());
    assert_eq!(records.count_of("Smart Home AI Router"), Some(1));
    assert_eq!(index.count_of("Smart Home AI Router"), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_record_store_failure_is_tolerated_and_repaired() -> Result<()> {
    setup_tracing();
    // --- Arrange ---
    let index = MockVectorIndex::new();
    let records = MockRecordStore::new();
    index.insert("Smart Home AI Router", idea_metadata("Smart Home AI Router", 1), vec![1.0, 0.0, 0.0]);
    records.seed("Smart Home AI Router", 1);
    let reconciler = reconciler(&index, &records);
    records.set_fail_writes(true);

    // --- Act ---
    let merged = reconciler
        .apply(
            &idea("AI Router for Homes", vec![1.0, 0.0, 0.0], None),
            SimilarityResolver::default()
                .resolve(&index, &[1.0, 0.0, 0.0])
                .await?,
        )
        .await?;
    let created = reconciler
        .apply(&idea("Ocean Cleanup Bots", vec![0.0, 1.0, 0.0], None), Decision::New)
        .await?;

    // --- Assert: the vector index is ahead of the mirror ---
    assert!(!merged.mirrored());
    assert!(!created.mirrored());
    assert_eq!(index.count_of("Smart Home AI Router"), Some(2));
    assert_eq!(records.count_of("Smart Home AI Router"), Some(1));
    assert!(records.find("Ocean Cleanup Bots").is_none());

    // --- Act: repair, then repair again ---
    records.set_fail_writes(false);
    let first = reconciler.repair().await?;
    let writes_after_first = records.get_writes().len();
    let second = reconciler.repair().await?;

    // --- Assert ---
    assert_eq!(first.created, 1);
    assert_eq!(first.updated, 1);
    assert_eq!(records.count_of("Smart Home AI Router"), Some(2));
    assert_eq!(records.count_of("Ocean Cleanup Bots"), Some(1));
    assert_eq!(second.unchanged, 2);
    assert_eq!(second.created + second.updated + second.failed, 0);
    assert_eq!(records.get_writes().len(), writes_after_first);
    Ok(())
}

#[tokio::test]
async fn test_new_decision_folds_into_existing_title() -> Result<()> {
    setup_tracing();
    let index = MockVectorIndex::new();
    let records = MockRecordStore::new();
    index.insert("Edge AI Router", idea_metadata("Edge AI Router", 3), vec![0.0, 1.0, 0.0]);
    records.seed("Edge AI Router", 3);

    let outcome = reconciler(&index, &records)
        .apply(&idea("Edge AI Router", vec![1.0, 0.0, 0.0], None), Decision::New)
        .await?;

    assert!(matches!(outcome, ReconcileOutcome::Merged { count: 4, .. }));
    assert_eq!(index.count_of("Edge AI Router"), Some(4));
    assert_eq!(records.count_of("Edge AI Router"), Some(4));
    Ok(())
}

#[tokio::test]
async fn test_unordered_results_follow_policy() -> Result<()> {
    setup_tracing();
    let index = MockVectorIndex::new();
    index.insert("Close", idea_metadata("Close", 1), vec![1.0, 0.05, 0.0]);
    index.insert("Closer", idea_metadata("Closer", 1), vec![1.0, 0.0, 0.0]);
    index.set_ascending_results(true);
    let query = [1.0, 0.0, 0.0];

    let first = SimilarityResolver::new(0.75, 5, MatchPolicy::FirstOverThreshold)
        .resolve(&index, &query)
        .await?;
    let best = SimilarityResolver::new(0.75, 5, MatchPolicy::BestOverThreshold)
        .resolve(&index, &query)
        .await?;

    assert!(matches!(first, Decision::Merge(m) if m.id == "Close"));
    assert!(matches!(best, Decision::Merge(m) if m.id == "Closer"));
    Ok(())
}

#[tokio::test]
async fn test_created_record_carries_ledger_source() -> Result<()> {
    setup_tracing();
    // --- Arrange ---
    let setup = TestSetup::new().await?;
    let fp = UrlFingerprint::of_canonical("https://news.example.com/robots");
    setup
        .provider
        .bulk_insert(&[SeenUrlRecord {
            fingerprint: fp.clone(),
            url: "https://news.example.com/robots".to_string(),
            title: "Robots are coming".to_string(),
            discovered_at: chrono::Utc::now(),
        }])
        .await?;
    let records = MockRecordStore::new();
    let reconciler = Reconciler::new(Box::new(setup.index.clone()), Box::new(records.clone()))
        .with_ledger(Box::new(setup.provider.clone()));

    // --- Act ---
    reconciler
        .apply(&idea("Warehouse Robot Rental", vec![0.0, 0.0, 1.0], Some(&fp)), Decision::New)
        .await?;

    // --- Assert ---
    let record = records.find("Warehouse Robot Rental").expect("record created");
    assert_eq!(record.source.url, "https://news.example.com/robots");
    assert_eq!(record.source.title, "Robots are coming");
    assert!(record.source.discovered_at.is_some());
    let stored = setup.index.fetch("Warehouse Robot Rental").await?.expect("indexed");
    assert_eq!(stored.metadata.source_fingerprint, Some(fp));
    Ok(())
}

#[tokio::test]
async fn test_new_idea_reuses_leftover_display_record() -> Result<()> {
    setup_tracing();
    // --- Arrange: the mirror still has a record the index no longer knows about ---
    let index = MockVectorIndex::new();
    let records = MockRecordStore::new();
    records.seed("Ocean Cleanup Bots", 4);

    // --- Act ---
    let outcome = reconciler(&index, &records)
        .apply(&idea("Ocean Cleanup Bots", vec![0.0, 1.0, 0.0], None), Decision::New)
        .await?;

    // --- Assert ---
    assert!(matches!(outcome, ReconcileOutcome::Created { mirrored: true, .. }));
    assert_eq!(index.count_of("Ocean Cleanup Bots"), Some(1));
    assert_eq!(records.len(), 1);
    assert_eq!(records.count_of("Ocean Cleanup Bots"), Some(1));
    assert_eq!(records.get_writes(), vec!["update:record-1=1".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_merge_increments_the_stored_count_not_the_query_snapshot() -> Result<()> {
    setup_tracing();
    // --- Arrange: the index moved on after the query returned count 1 ---
    let index = MockVectorIndex::new();
    let records = MockRecordStore::new();
    index.insert("Smart Home AI Router", idea_metadata("Smart Home AI Router", 5), vec![1.0, 0.0, 0.0]);
    records.seed("Smart Home AI Router", 5);
    let stale = VectorMatch {
        id: "Smart Home AI Router".to_string(),
        score: 0.9,
        metadata: idea_metadata("Smart Home AI Router", 1),
    };

    // --- Act ---
    let outcome = reconciler(&index, &records)
        .apply(
            &idea("AI Router for Homes", vec![1.0, 0.0, 0.0], None),
            Decision::Merge(stale),
        )
        .await?;

    // --- Assert ---
    assert!(matches!(outcome, ReconcileOutcome::Merged { count: 6, mirrored: true, .. }));
    assert_eq!(index.count_of("Smart Home AI Router"), Some(6));
    assert_eq!(records.count_of("Smart Home AI Router"), Some(6));
    Ok(())
}

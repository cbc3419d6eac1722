//! Integration tests for evidra-store
//!
//! These tests verify the full lifecycle for claims, the embedding
//! pipeline, the research queue, relationships, and the audit log.

use evidra_domain::traits::{AgentRunRecord, ClaimContentUpdate, ClaimFilter, ClaimStore};
use evidra_domain::{
    Category, Claim, ClaimId, ClaimStatus, EmbeddingStatus, EvidenceHierarchy, EvidenceLevel,
    KnowledgeRelationship, QueueStatus, RelationshipType, ResearchQueueItem, SourceKind,
    ValidationAction, ValidationLogEntry,
};
use evidra_store::SqliteStore;

fn test_claim(text: &str) -> Claim {
    Claim::draft(
        text.to_string(),
        format!("summary of {}", text),
        Category::Nutrition,
        EvidenceLevel::RandomizedTrial,
        0.8,
        "A study".to_string(),
        1000,
    )
}

// Validated claim, the only kind the embedding pipeline picks up
fn active_claim(text: &str) -> Claim {
    let mut claim = test_claim(text);
    claim.status = ClaimStatus::Active;
    claim
}

#[test]
fn test_store_initialization() {
    let store = SqliteStore::new(":memory:");
    assert!(store.is_ok(), "Store should initialize successfully");
}

#[test]
fn test_insert_and_get_claim() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let mut claim = test_claim("Creatine improves strength");
    claim.sample_size = Some(250);
    claim.source_doi = Some("10.1000/abc".to_string());
    let id = store.insert_claim(claim.clone()).unwrap();

    let retrieved = store.get_claim(id).unwrap().expect("claim should exist");
    assert_eq!(retrieved, claim);
}

#[test]
fn test_get_missing_claim() {
    let store = SqliteStore::new(":memory:").unwrap();
    assert!(store.get_claim(ClaimId::new()).unwrap().is_none());
}

#[test]
fn test_insert_rejects_inconsistent_embedding() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    // Completed status without a vector violates the pairing invariant
    let mut claim = test_claim("bad claim");
    claim.embedding_status = EmbeddingStatus::Completed;
    assert!(store.insert_claim(claim).is_err());
}

#[test]
fn test_query_claims_filters() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let mut a = test_claim("a");
    a.status = ClaimStatus::Active;
    let mut b = test_claim("b");
    b.category = Category::Cardio;
    b.status = ClaimStatus::Active;
    let mut c = test_claim("c");
    c.evidence_level = EvidenceLevel::ExpertOpinion;
    c.status = ClaimStatus::Active;
    store.insert_claim(a.clone()).unwrap();
    store.insert_claim(b).unwrap();
    store.insert_claim(c).unwrap();

    let by_category = store
        .query_claims(&ClaimFilter {
            category: Some(Category::Nutrition),
            status: Some(ClaimStatus::Active),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_category.len(), 2);

    let by_evidence = store
        .query_claims(&ClaimFilter {
            min_evidence: Some(EvidenceLevel::RandomizedTrial),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_evidence.len(), 2);

    let limited = store
        .query_claims(&ClaimFilter {
            limit: Some(1),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn test_content_update_snapshots_prior_version() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let id = store.insert_claim(test_claim("original wording")).unwrap();

    let update = ClaimContentUpdate {
        text: Some("revised wording".to_string()),
        confidence: Some(0.6),
        ..Default::default()
    };
    store.update_claim_content(id, &update, 2000).unwrap();

    let current = store.get_claim(id).unwrap().unwrap();
    assert_eq!(current.text, "revised wording");
    assert_eq!(current.confidence, 0.6);
    assert_eq!(current.version, 2);
    assert_eq!(current.updated_at, 2000);

    let versions = store.claim_versions(id).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version, 1);
    assert_eq!(versions[0].text, "original wording");
    assert_eq!(versions[0].confidence, 0.8);
}

#[test]
fn test_empty_content_update_is_noop() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let id = store.insert_claim(test_claim("unchanged")).unwrap();

    store
        .update_claim_content(id, &ClaimContentUpdate::default(), 2000)
        .unwrap();

    let current = store.get_claim(id).unwrap().unwrap();
    assert_eq!(current.version, 1);
    assert!(store.claim_versions(id).unwrap().is_empty());
}

#[test]
fn test_status_transition_records_score_and_reviewer() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let id = store.insert_claim(test_claim("to approve")).unwrap();

    store
        .set_claim_status(id, ClaimStatus::Active, Some(0.85), Some("auto"), 3000)
        .unwrap();

    let claim = store.get_claim(id).unwrap().unwrap();
    assert_eq!(claim.status, ClaimStatus::Active);
    assert_eq!(claim.validation_score, Some(0.85));
    assert_eq!(claim.reviewed_by.as_deref(), Some("auto"));
}

#[test]
fn test_claim_pending_embeddings_locks_rows() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    for i in 0..5 {
        store.insert_claim(active_claim(&format!("claim {}", i))).unwrap();
    }

    let first = store.claim_pending_embeddings(3, 100).unwrap();
    assert_eq!(first.len(), 3);
    for claim in &first {
        assert_eq!(claim.embedding_status, EmbeddingStatus::Processing);
    }

    // A second call must never hand out the same rows
    let second = store.claim_pending_embeddings(10, 101).unwrap();
    assert_eq!(second.len(), 2);
    let first_ids: Vec<ClaimId> = first.iter().map(|c| c.id).collect();
    for claim in &second {
        assert!(!first_ids.contains(&claim.id));
    }

    assert!(store.claim_pending_embeddings(10, 102).unwrap().is_empty());
}

#[test]
fn test_pending_embeddings_claims_only_active() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let mut dead = test_claim("deprecated");
    dead.status = ClaimStatus::Deprecated;
    store.insert_claim(dead).unwrap();
    // Drafts wait for validation before they are worth embedding
    store.insert_claim(test_claim("still a draft")).unwrap();
    store.insert_claim(active_claim("live")).unwrap();

    let batch = store.claim_pending_embeddings(10, 100).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].text, "live");
}

#[test]
fn test_complete_embedding_roundtrip() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let id = store.insert_claim(active_claim("embed me")).unwrap();
    store.claim_pending_embeddings(1, 100).unwrap();

    let embedding: Vec<f32> = (0..1536).map(|i| (i as f32) / 1536.0).collect();
    store.complete_embedding(id, &embedding, 200).unwrap();

    let claim = store.get_claim(id).unwrap().unwrap();
    assert_eq!(claim.embedding_status, EmbeddingStatus::Completed);
    assert_eq!(claim.embedding.as_deref(), Some(embedding.as_slice()));
    assert!(claim.embedding_consistent());
}

#[test]
fn test_fail_embedding_keeps_error() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let id = store.insert_claim(active_claim("will fail")).unwrap();
    store.claim_pending_embeddings(1, 100).unwrap();

    store.fail_embedding(id, "rate limited", 200).unwrap();

    let claim = store.get_claim(id).unwrap().unwrap();
    assert_eq!(claim.embedding_status, EmbeddingStatus::Failed);
    assert_eq!(claim.embedding_error.as_deref(), Some("rate limited"));
    assert!(claim.embedding.is_none());
    assert!(claim.embedding_consistent());
}

#[test]
fn test_reset_stale_embeddings() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    store.insert_claim(active_claim("stuck")).unwrap();
    store.insert_claim(active_claim("fresh")).unwrap();

    // One row claimed long ago, one recently
    let stuck = store.claim_pending_embeddings(1, 100).unwrap();
    let fresh = store.claim_pending_embeddings(1, 5000).unwrap();
    assert_eq!(stuck.len(), 1);
    assert_eq!(fresh.len(), 1);

    let moved = store.reset_stale_embeddings(1000, 6000).unwrap();
    assert_eq!(moved, 1);

    let recovered = store.get_claim(stuck[0].id).unwrap().unwrap();
    assert_eq!(recovered.embedding_status, EmbeddingStatus::Pending);

    let untouched = store.get_claim(fresh[0].id).unwrap().unwrap();
    assert_eq!(untouched.embedding_status, EmbeddingStatus::Processing);
}

#[test]
fn test_retry_failed_embeddings() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let id = store.insert_claim(active_claim("failed once")).unwrap();
    store.claim_pending_embeddings(1, 100).unwrap();
    store.fail_embedding(id, "boom", 200).unwrap();

    let moved = store.retry_failed_embeddings(300).unwrap();
    assert_eq!(moved, 1);

    let claim = store.get_claim(id).unwrap().unwrap();
    assert_eq!(claim.embedding_status, EmbeddingStatus::Pending);
    assert!(claim.embedding_error.is_none());
}

#[test]
fn test_embedding_counts() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let a = store.insert_claim(active_claim("a")).unwrap();
    store.insert_claim(active_claim("b")).unwrap();
    store.claim_pending_embeddings(1, 100).unwrap();
    store.complete_embedding(a, &[0.1, 0.2], 200).unwrap();

    let counts = store.embedding_counts().unwrap();
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.processing, 0);
    assert_eq!(counts.failed, 0);
}

#[test]
fn test_enqueue_dedup_on_doi() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let mut first = ResearchQueueItem::new("Title A".to_string(), SourceKind::PubMed, 100);
    first.doi = Some("10.1000/xyz".to_string());
    assert!(store.enqueue_item(first).unwrap());

    // Same DOI from a different source with a different title
    let mut dup = ResearchQueueItem::new("Title A (reprint)".to_string(), SourceKind::CrossRef, 200);
    dup.doi = Some("10.1000/XYZ".to_string());
    assert!(!store.enqueue_item(dup).unwrap());

    assert_eq!(store.queue_counts().unwrap().pending, 1);
}

#[test]
fn test_enqueue_dedup_on_title() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let first = ResearchQueueItem::new("Protein Timing and Gains".to_string(), SourceKind::Rss, 100);
    let dup = ResearchQueueItem::new("protein  timing and gains".to_string(), SourceKind::PubMed, 200);

    assert!(store.enqueue_item(first).unwrap());
    assert!(!store.enqueue_item(dup).unwrap());
}

#[test]
fn test_pending_queue_ordering() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let mut low = ResearchQueueItem::new("low priority".to_string(), SourceKind::PubMed, 100);
    low.priority = 8;
    let mut high = ResearchQueueItem::new("high priority".to_string(), SourceKind::PubMed, 200);
    high.priority = 2;
    let mut older = ResearchQueueItem::new("older same priority".to_string(), SourceKind::PubMed, 50);
    older.priority = 8;

    store.enqueue_item(low).unwrap();
    store.enqueue_item(high).unwrap();
    store.enqueue_item(older).unwrap();

    let items = store.pending_queue_items(10).unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].title, "high priority");
    assert_eq!(items[1].title, "older same priority");
    assert_eq!(items[2].title, "low priority");
}

#[test]
fn test_queue_processing_increments_attempts() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let item = ResearchQueueItem::new("retry me".to_string(), SourceKind::CrossRef, 100);
    let id = item.id;
    store.enqueue_item(item).unwrap();

    store
        .update_queue_item(id, QueueStatus::Processing, None, 200)
        .unwrap();
    store
        .update_queue_item(id, QueueStatus::Failed, Some("model error"), 300)
        .unwrap();
    store
        .update_queue_item(id, QueueStatus::Processing, None, 400)
        .unwrap();

    let counts = store.queue_counts().unwrap();
    assert_eq!(counts.processing, 1);

    // Two processing transitions -> two attempts
    store
        .update_queue_item(id, QueueStatus::Pending, None, 500)
        .unwrap();
    let items = store.pending_queue_items(1).unwrap();
    assert_eq!(items[0].attempts, 2);
    assert_eq!(items[0].last_error.as_deref(), Some("model error"));
}

#[test]
fn test_failed_items_remain_retriable() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let failed = ResearchQueueItem::new("transient failure".to_string(), SourceKind::PubMed, 100);
    let failed_id = failed.id;
    let rejected = ResearchQueueItem::new("permanent reject".to_string(), SourceKind::PubMed, 100);
    let rejected_id = rejected.id;
    store.enqueue_item(failed).unwrap();
    store.enqueue_item(rejected).unwrap();

    store
        .update_queue_item(failed_id, QueueStatus::Failed, Some("timeout"), 200)
        .unwrap();
    store
        .update_queue_item(rejected_id, QueueStatus::Rejected, Some("no abstract"), 200)
        .unwrap();

    // Failed comes back for retry; rejected never does
    let items = store.pending_queue_items(10).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, failed_id);
}

#[test]
fn test_relationship_upsert_is_commutative() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let a = store.insert_claim(test_claim("a")).unwrap();
    let b = store.insert_claim(test_claim("b")).unwrap();

    store
        .upsert_relationship(KnowledgeRelationship::new(
            a,
            b,
            RelationshipType::Contradicts,
            0.8,
            100,
        ))
        .unwrap();
    // Reversed order must not create a second edge
    store
        .upsert_relationship(KnowledgeRelationship::new(
            b,
            a,
            RelationshipType::Contradicts,
            0.9,
            200,
        ))
        .unwrap();

    let edges = store.relationships_for(a).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].strength, 0.9);

    assert!(store.has_relationship(a, b, RelationshipType::Contradicts).unwrap());
    assert!(store.has_relationship(b, a, RelationshipType::Contradicts).unwrap());
    assert!(!store.has_relationship(a, b, RelationshipType::Supports).unwrap());
}

#[test]
fn test_hierarchy_roundtrip() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let top = store.insert_claim(test_claim("top")).unwrap();

    let mut claim = store.get_claim(top).unwrap().unwrap();
    claim.status = ClaimStatus::Active;
    let hierarchy = EvidenceHierarchy::from_claims(Category::Nutrition, &[claim], 500);

    store.store_hierarchy(&hierarchy).unwrap();
    let loaded = store.get_hierarchy(Category::Nutrition).unwrap().unwrap();
    assert_eq!(loaded, hierarchy);

    assert!(store.get_hierarchy(Category::Cardio).unwrap().is_none());

    // Replacing the aggregate keeps a single row
    let updated = EvidenceHierarchy::from_claims(Category::Nutrition, &[], 600);
    store.store_hierarchy(&updated).unwrap();
    let reloaded = store.get_hierarchy(Category::Nutrition).unwrap().unwrap();
    assert_eq!(reloaded.computed_at, 600);
    assert_eq!(reloaded.claim_count, 0);
}

#[test]
fn test_validation_log_is_append_only() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let id = store.insert_claim(test_claim("audited")).unwrap();

    store
        .record_validation(ValidationLogEntry::automatic(
            id,
            ValidationAction::Flagged,
            Some(0.5),
            vec!["contradiction with stronger evidence".to_string()],
            100,
        ))
        .unwrap();
    store
        .record_validation(ValidationLogEntry::automatic(
            id,
            ValidationAction::Approved,
            Some(0.8),
            vec![],
            200,
        ))
        .unwrap();

    let log = store.validation_log(id).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].action, ValidationAction::Flagged);
    assert_eq!(log[1].action, ValidationAction::Approved);
    assert_eq!(log[0].reasons.len(), 1);
}

#[test]
fn test_persistence_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evidra.db");

    let id = {
        let mut store = SqliteStore::new(&path).unwrap();
        store.insert_claim(test_claim("persisted")).unwrap()
    };

    let store = SqliteStore::new(&path).unwrap();
    let claim = store.get_claim(id).unwrap().unwrap();
    assert_eq!(claim.text, "persisted");
}

#[test]
fn test_agent_run_upsert_keeps_latest() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    store
        .record_agent_run(&AgentRunRecord {
            agent: "research".to_string(),
            last_run: 100,
            processed: 3,
            succeeded: 2,
            failed: 1,
            skipped: 0,
            last_error: Some("one source down".to_string()),
        })
        .unwrap();
    store
        .record_agent_run(&AgentRunRecord {
            agent: "research".to_string(),
            last_run: 200,
            processed: 5,
            succeeded: 5,
            failed: 0,
            skipped: 0,
            last_error: None,
        })
        .unwrap();
    store
        .record_agent_run(&AgentRunRecord {
            agent: "extraction".to_string(),
            last_run: 150,
            processed: 1,
            succeeded: 1,
            failed: 0,
            skipped: 0,
            last_error: None,
        })
        .unwrap();

    let runs = store.agent_runs().unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].agent, "extraction");
    assert_eq!(runs[1].agent, "research");
    assert_eq!(runs[1].last_run, 200);
    assert_eq!(runs[1].succeeded, 5);
    assert!(runs[1].last_error.is_none());
}

//! Integration tests for SqliteSyncQueue
//!
//! These tests run against an in-memory SQLite database and a tempdir
//! blob store. Each test builds a fresh fixture for isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;

use medrelay_blob::FsBlobStore;
use medrelay_core::config::QueueDefinition;
use medrelay_core::domain::{
    EntryId, QueueEntry, QueueKey, QueuePattern, SyncError, SyncOperation, SyncPayload,
};
use medrelay_core::ports::{
    EnqueueHook, EntryFilter, HookDecision, PayloadCodecRegistry, SyncQueue,
};
use medrelay_store::{DatabasePool, SqliteSyncQueue, SyncQueueRegistry};

// ============================================================================
// Test helpers
// ============================================================================

struct Fixture {
    _dir: tempfile::TempDir,
    registry: SyncQueueRegistry,
    blobs: Arc<FsBlobStore>,
}

impl Fixture {
    fn queue(&self, name: &str) -> Arc<SqliteSyncQueue> {
        self.registry.get(name).expect("queue not provisioned")
    }
}

async fn setup_with_hooks(hooks: Vec<Arc<dyn EnqueueHook>>) -> Fixture {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let pool = db.pool().clone();

    SyncQueueRegistry::provision(
        &pool,
        &[
            QueueDefinition::new("outbound-main", QueuePattern::OUTBOUND),
            QueueDefinition::new("inbound-main", QueuePattern::INBOUND),
            QueueDefinition::new(
                "outbound-dead",
                QueuePattern::OUTBOUND | QueuePattern::DEAD_LETTER,
            ),
            QueueDefinition::new("retry", QueuePattern::OUTBOUND),
        ],
    )
    .await
    .unwrap();

    let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")));
    let codecs = Arc::new(PayloadCodecRegistry::with_json_types([
        "Patient",
        "Observation",
    ]));
    let registry = SyncQueueRegistry::load(pool, blobs.clone(), codecs, hooks)
        .await
        .unwrap();

    Fixture {
        _dir: dir,
        registry,
        blobs,
    }
}

async fn setup() -> Fixture {
    setup_with_hooks(Vec::new()).await
}

fn patient(name: &str) -> SyncPayload {
    SyncPayload::new("Patient", json!({ "name": name, "active": true }))
}

// ============================================================================
// FIFO and the basic scenario
// ============================================================================

#[tokio::test]
async fn test_fifo_order_over_many_entries() {
    let fixture = setup().await;
    let queue = fixture.queue("outbound-main");

    for i in 0..10 {
        queue
            .enqueue(patient(&format!("patient-{i}")), SyncOperation::Insert)
            .await
            .unwrap();
    }

    for i in 0..10 {
        let entry = queue.dequeue().await.unwrap().expect("queue ran dry early");
        let payload = entry.payload().expect("dequeue must load the payload");
        assert_eq!(payload.body()["name"], format!("patient-{i}"));
    }

    assert!(queue.dequeue().await.unwrap().is_none());
}

#[tokio::test]
async fn test_enqueue_peek_dequeue_scenario() {
    let fixture = setup().await;
    let queue = fixture.queue("outbound-main");

    let stored = queue
        .enqueue(patient("Dupont"), SyncOperation::Update)
        .await
        .unwrap();
    assert_eq!(queue.count().await.unwrap(), 1);

    let peeked = queue.peek().await.unwrap().unwrap();
    assert_eq!(peeked.id(), stored.id());
    assert_eq!(peeked.payload().unwrap().body()["name"], "Dupont");
    assert_eq!(queue.count().await.unwrap(), 1);

    let dequeued = queue.dequeue().await.unwrap().unwrap();
    assert_eq!(dequeued.id(), stored.id());
    assert_eq!(dequeued.operation(), SyncOperation::Update);
    assert_eq!(queue.count().await.unwrap(), 0);

    assert!(queue.dequeue().await.unwrap().is_none());
    assert!(queue.peek().await.unwrap().is_none());
}

#[tokio::test]
async fn test_enqueue_assigns_correlation_key_when_absent() {
    let fixture = setup().await;
    let queue = fixture.queue("outbound-main");

    let a = queue
        .enqueue(patient("a"), SyncOperation::Insert)
        .await
        .unwrap();
    let b = queue
        .enqueue(patient("b"), SyncOperation::Insert)
        .await
        .unwrap();
    assert_ne!(a.correlation_key(), b.correlation_key());
}

#[tokio::test]
async fn test_enqueue_keeps_supplied_correlation_key() {
    let fixture = setup().await;
    let queue = fixture.queue("outbound-main");

    let key = medrelay_core::domain::CorrelationKey::new();
    let payload = patient("keyed").with_correlation_key(key);
    let entry = queue.enqueue(payload, SyncOperation::Insert).await.unwrap();
    assert_eq!(entry.correlation_key(), &key);
}

#[tokio::test]
async fn test_enqueue_unknown_resource_type_fails_cleanly() {
    let fixture = setup().await;
    let queue = fixture.queue("outbound-main");

    let err = queue
        .enqueue(
            SyncPayload::new("Encounter", json!({})),
            SyncOperation::Insert,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UnknownResourceType { .. }));
    assert_eq!(queue.count().await.unwrap(), 0);
}

// ============================================================================
// Dead-letter semantics
// ============================================================================

#[tokio::test]
async fn test_direct_enqueue_on_dead_letter_queue_rejected() {
    let fixture = setup().await;
    let dead = fixture.queue("outbound-dead");

    let err = dead
        .enqueue(patient("nope"), SyncOperation::Insert)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::DeadLetterEnqueue { .. }));
    assert!(err.is_invalid_state());
}

#[tokio::test]
async fn test_dead_letter_move_requires_reason() {
    let fixture = setup().await;
    let main = fixture.queue("outbound-main");
    let dead = fixture.queue("outbound-dead");

    let entry = main
        .enqueue(patient("failing"), SyncOperation::Update)
        .await
        .unwrap();

    let err = dead.enqueue_entry(&entry, None).await.unwrap_err();
    assert!(matches!(err, SyncError::ReasonRequired { .. }));

    let err = dead.enqueue_entry(&entry, Some("   ")).await.unwrap_err();
    assert!(matches!(err, SyncError::ReasonRequired { .. }));
}

#[tokio::test]
async fn test_dead_letter_move_records_provenance() {
    let fixture = setup().await;
    let main = fixture.queue("outbound-main");
    let dead = fixture.queue("outbound-dead");

    let entry = main
        .enqueue(patient("failing"), SyncOperation::Update)
        .await
        .unwrap();

    let copy = dead
        .enqueue_entry(&entry, Some("remote rejected the update"))
        .await
        .unwrap();

    assert!(copy.is_dead_lettered());
    let info = copy.dead_letter().unwrap();
    assert_eq!(info.original_queue(), main.key());
    assert_eq!(info.reason(), "remote rejected the update");
    assert_eq!(copy.retry_count(), Some(1));
    // Copy, not move: the source entry is untouched
    assert_eq!(main.count().await.unwrap(), 1);
    // The payload blob is shared, not re-serialized
    assert_eq!(copy.blob_key(), entry.blob_key());

    // The overlay is resolved when reading the entry back
    let fetched = dead.get(copy.id().unwrap()).await.unwrap();
    assert!(fetched.is_dead_lettered());
}

#[tokio::test]
async fn test_no_nested_dead_lettering() {
    let fixture = setup().await;
    let main = fixture.queue("outbound-main");
    let dead = fixture.queue("outbound-dead");

    let entry = main
        .enqueue(patient("failing"), SyncOperation::Update)
        .await
        .unwrap();
    let copy = dead.enqueue_entry(&entry, Some("first failure")).await.unwrap();

    let err = dead
        .enqueue_entry(&copy, Some("second failure"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::AlreadyDeadLettered { .. }));
    assert!(err.is_invalid_state());
}

#[tokio::test]
async fn test_retry_from_dead_letter_queue() {
    let fixture = setup().await;
    let main = fixture.queue("outbound-main");
    let dead = fixture.queue("outbound-dead");
    let retry = fixture.queue("retry");

    let entry = main
        .enqueue(patient("flaky"), SyncOperation::Update)
        .await
        .unwrap();
    let dead_copy = dead.enqueue_entry(&entry, Some("timeout")).await.unwrap();
    main.delete(entry.id().unwrap()).await.unwrap();

    // Moving out of a dead-letter queue into an ordinary one is allowed
    let retried = retry.enqueue_entry(&dead_copy, None).await.unwrap();
    assert!(!retried.is_dead_lettered());
    assert_eq!(retried.retry_count(), Some(2));

    let head = retry.peek().await.unwrap().unwrap();
    assert_eq!(head.payload().unwrap().body()["name"], "flaky");
}

// ============================================================================
// Shared blob reference counting
// ============================================================================

#[tokio::test]
async fn test_blob_survives_while_any_entry_references_it() {
    use medrelay_core::ports::BlobStore;

    let fixture = setup().await;
    let main = fixture.queue("outbound-main");
    let dead = fixture.queue("outbound-dead");

    let entry = main
        .enqueue(patient("shared"), SyncOperation::Update)
        .await
        .unwrap();
    let copy = dead.enqueue_entry(&entry, Some("failed")).await.unwrap();
    let blob_key = entry.blob_key().clone();

    // Delete the original; the dead-letter copy still references the blob
    main.delete(entry.id().unwrap()).await.unwrap();
    assert!(fixture.blobs.get(&blob_key).await.is_ok());

    // Delete the last referent; now the blob goes too
    dead.delete(copy.id().unwrap()).await.unwrap();
    assert!(fixture.blobs.get(&blob_key).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_dequeue_removes_unshared_blob() {
    use medrelay_core::ports::BlobStore;

    let fixture = setup().await;
    let queue = fixture.queue("outbound-main");

    let entry = queue
        .enqueue(patient("solo"), SyncOperation::Insert)
        .await
        .unwrap();
    let blob_key = entry.blob_key().clone();

    let dequeued = queue.dequeue().await.unwrap().unwrap();
    // The payload was loaded before the blob went away
    assert_eq!(dequeued.payload().unwrap().body()["name"], "solo");
    assert!(fixture.blobs.get(&blob_key).await.unwrap_err().is_not_found());
}

fn file_count(dir: &std::path::Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|e| {
            let path = e.path();
            if path.is_dir() {
                file_count(&path)
            } else {
                1
            }
        })
        .sum()
}

#[tokio::test]
async fn test_failed_insert_cleans_up_payload_blob() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")));
    let codecs = Arc::new(PayloadCodecRegistry::with_json_types(["Patient"]));

    // No sync_queues row backs this key, so the entry insert violates the
    // foreign key after the payload blob has already been written
    let queue = SqliteSyncQueue::new(
        db.pool().clone(),
        QueueKey::new(),
        "ghost",
        QueuePattern::OUTBOUND,
        blobs.clone(),
        codecs,
        Vec::new(),
    );

    let err = queue
        .enqueue(patient("orphan"), SyncOperation::Insert)
        .await
        .unwrap_err();

    // The insert's own error surfaces, not one from the cleanup
    assert!(err.is_store_failure());
    // The blob written before the failed insert was compensated away
    assert_eq!(file_count(blobs.root()), 0);
}

// ============================================================================
// Point lookups and queries
// ============================================================================

#[tokio::test]
async fn test_get_and_delete_unknown_id() {
    let fixture = setup().await;
    let queue = fixture.queue("outbound-main");

    let err = queue.get(EntryId::new(999)).await.unwrap_err();
    assert!(err.is_not_found());

    let err = queue.delete(EntryId::new(999)).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_get_is_scoped_to_the_queue() {
    let fixture = setup().await;
    let outbound = fixture.queue("outbound-main");
    let inbound = fixture.queue("inbound-main");

    let entry = outbound
        .enqueue(patient("scoped"), SyncOperation::Insert)
        .await
        .unwrap();

    let err = inbound.get(entry.id().unwrap()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_in_the_middle_preserves_fifo() {
    let fixture = setup().await;
    let queue = fixture.queue("outbound-main");

    let _a = queue
        .enqueue(patient("a"), SyncOperation::Insert)
        .await
        .unwrap();
    let b = queue
        .enqueue(patient("b"), SyncOperation::Insert)
        .await
        .unwrap();
    let _c = queue
        .enqueue(patient("c"), SyncOperation::Insert)
        .await
        .unwrap();

    queue.delete(b.id().unwrap()).await.unwrap();

    let first = queue.dequeue().await.unwrap().unwrap();
    let second = queue.dequeue().await.unwrap().unwrap();
    assert_eq!(first.payload().unwrap().body()["name"], "a");
    assert_eq!(second.payload().unwrap().body()["name"], "c");
    assert!(queue.dequeue().await.unwrap().is_none());
}

#[tokio::test]
async fn test_query_filters_combine() {
    let fixture = setup().await;
    let queue = fixture.queue("outbound-main");

    queue
        .enqueue(patient("p1"), SyncOperation::Insert)
        .await
        .unwrap();
    queue
        .enqueue(patient("p2"), SyncOperation::Delete)
        .await
        .unwrap();
    queue
        .enqueue(
            SyncPayload::new("Observation", json!({ "code": "bp" })),
            SyncOperation::Insert,
        )
        .await
        .unwrap();

    let all = queue.query(&EntryFilter::new()).await.unwrap();
    assert_eq!(all.len(), 3);
    // Materialized in id order
    assert!(all.windows(2).all(|w| w[0].id() < w[1].id()));

    let patients = queue
        .query(&EntryFilter::new().with_resource_type("Patient"))
        .await
        .unwrap();
    assert_eq!(patients.len(), 2);

    let deletes = queue
        .query(
            &EntryFilter::new()
                .with_resource_type("Patient")
                .with_operation(SyncOperation::Delete),
        )
        .await
        .unwrap();
    assert_eq!(deletes.len(), 1);

    let by_key = queue
        .query(&EntryFilter::new().with_correlation_key(*patients[0].correlation_key()))
        .await
        .unwrap();
    assert_eq!(by_key.len(), 1);
    assert_eq!(by_key[0].id(), patients[0].id());
}

#[tokio::test]
async fn test_query_by_dead_letter_presence() {
    let fixture = setup().await;
    let main = fixture.queue("outbound-main");
    let dead = fixture.queue("outbound-dead");

    let entry = main
        .enqueue(patient("failing"), SyncOperation::Update)
        .await
        .unwrap();
    dead.enqueue_entry(&entry, Some("rejected")).await.unwrap();

    let dead_lettered = dead
        .query(&EntryFilter::new().with_dead_lettered(true))
        .await
        .unwrap();
    assert_eq!(dead_lettered.len(), 1);
    assert!(dead_lettered[0].is_dead_lettered());

    assert!(dead
        .query(&EntryFilter::new().with_dead_lettered(false))
        .await
        .unwrap()
        .is_empty());
    assert!(main
        .query(&EntryFilter::new().with_dead_lettered(true))
        .await
        .unwrap()
        .is_empty());
}

// ============================================================================
// Enqueue hooks
// ============================================================================

/// Rejects observation payloads, counts everything it sees commit
struct ObservationVeto {
    committed: AtomicUsize,
}

#[async_trait::async_trait]
impl EnqueueHook for ObservationVeto {
    async fn before_enqueue(
        &self,
        _queue: &str,
        payload: &SyncPayload,
        _operation: SyncOperation,
    ) -> HookDecision {
        if payload.resource_type() == "Observation" {
            HookDecision::Reject("observations are not accepted here".into())
        } else {
            HookDecision::Continue
        }
    }

    async fn after_enqueue(&self, _queue: &str, _entry: &QueueEntry) {
        self.committed.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_hook_veto_rejects_before_any_write() {
    let hook = Arc::new(ObservationVeto {
        committed: AtomicUsize::new(0),
    });
    let fixture = setup_with_hooks(vec![hook.clone()]).await;
    let queue = fixture.queue("outbound-main");

    let err = queue
        .enqueue(
            SyncPayload::new("Observation", json!({ "code": "bp" })),
            SyncOperation::Insert,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::EnqueueRejected { .. }));
    assert_eq!(queue.count().await.unwrap(), 0);
    assert_eq!(hook.committed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_hook_notified_after_commit() {
    let hook = Arc::new(ObservationVeto {
        committed: AtomicUsize::new(0),
    });
    let fixture = setup_with_hooks(vec![hook.clone()]).await;
    let queue = fixture.queue("outbound-main");
    let dead = fixture.queue("outbound-dead");

    let entry = queue
        .enqueue(patient("ok"), SyncOperation::Insert)
        .await
        .unwrap();
    assert_eq!(hook.committed.load(Ordering::SeqCst), 1);

    // Cross-queue copies fire the hooks too
    dead.enqueue_entry(&entry, Some("failed")).await.unwrap();
    assert_eq!(hook.committed.load(Ordering::SeqCst), 2);
}

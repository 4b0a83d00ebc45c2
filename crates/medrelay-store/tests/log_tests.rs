//! Integration tests for SqliteSyncLog
//!
//! Restart behavior is simulated by building a second log instance over
//! the same in-memory pool, mirroring how a fresh process would reload the
//! persisted checkpoint state.

use chrono::{Duration, Utc};
use uuid::Uuid;

use medrelay_core::domain::{SyncError, SyncLogEntry};
use medrelay_core::ports::SyncLog;
use medrelay_store::{DatabasePool, SqliteSyncLog};

async fn setup() -> (DatabasePool, SqliteSyncLog) {
    let db = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let log = SqliteSyncLog::new(db.pool().clone());
    (db, log)
}

// ============================================================================
// Steady-state checkpoints
// ============================================================================

#[tokio::test]
async fn test_save_and_read_back() {
    let (_db, log) = setup().await;
    let t1 = Utc::now() - Duration::minutes(5);

    log.save("Patient", "", Some("etag-1"), t1).await.unwrap();

    let last = log.last_sync_time("Patient", "").await.unwrap().unwrap();
    assert_eq!(last.timestamp(), t1.timestamp());
    assert_eq!(
        log.last_etag("Patient", "").await.unwrap().as_deref(),
        Some("etag-1")
    );
}

#[tokio::test]
async fn test_missing_pair_reads_none() {
    let (_db, log) = setup().await;

    assert!(log.last_sync_time("Patient", "").await.unwrap().is_none());
    assert!(log.last_etag("Patient", "").await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_is_an_upsert() {
    let (_db, log) = setup().await;
    let t1 = Utc::now() - Duration::minutes(10);
    let t2 = Utc::now();

    log.save("Patient", "", Some("etag-1"), t1).await.unwrap();
    log.save("Patient", "", Some("etag-2"), t2).await.unwrap();

    let rows = log.all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].last_etag(), Some("etag-2"));
    assert_eq!(
        rows[0].last_sync().unwrap().timestamp(),
        t2.timestamp()
    );
}

#[tokio::test]
async fn test_empty_etag_preserves_previous_one() {
    let (_db, log) = setup().await;

    log.save("Patient", "", Some("etag-good"), Utc::now())
        .await
        .unwrap();
    log.save("Patient", "", Some(""), Utc::now()).await.unwrap();
    log.save("Patient", "", None, Utc::now()).await.unwrap();

    assert_eq!(
        log.last_etag("Patient", "").await.unwrap().as_deref(),
        Some("etag-good")
    );
}

#[tokio::test]
async fn test_filters_keep_separate_checkpoints() {
    let (_db, log) = setup().await;

    log.save("Patient", "", Some("all"), Utc::now()).await.unwrap();
    log.save("Patient", "active=true", Some("active"), Utc::now())
        .await
        .unwrap();

    assert_eq!(
        log.last_etag("Patient", "").await.unwrap().as_deref(),
        Some("all")
    );
    assert_eq!(
        log.last_etag("Patient", "active=true")
            .await
            .unwrap()
            .as_deref(),
        Some("active")
    );
    assert_eq!(log.all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_save_clears_recorded_error() {
    let (_db, log) = setup().await;

    log.save("Patient", "", Some("etag"), Utc::now()).await.unwrap();
    log.save_error("Patient", "", "remote returned 500").await.unwrap();

    let rows = log.all().await.unwrap();
    assert_eq!(rows[0].last_error(), Some("remote returned 500"));

    log.save("Patient", "", Some("etag"), Utc::now()).await.unwrap();
    let rows = log.all().await.unwrap();
    assert!(rows[0].last_error().is_none());
}

#[tokio::test]
async fn test_save_error_without_row_is_noop() {
    let (_db, log) = setup().await;

    log.save_error("Patient", "", "nothing to attach to")
        .await
        .unwrap();
    assert!(log.all().await.unwrap().is_empty());
}

// ============================================================================
// In-flight query cursors
// ============================================================================

#[tokio::test]
async fn test_save_query_rejects_nil_id() {
    let (_db, log) = setup().await;

    let err = log
        .save_query("Patient", "", Uuid::nil(), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidArgument { .. }));
}

#[tokio::test]
async fn test_query_cursor_resumes_across_restart() {
    let (db, log) = setup().await;
    let query_id = Uuid::new_v4();

    log.save_query("Patient", "", query_id, 200).await.unwrap();
    log.save_query("Patient", "", query_id, 400).await.unwrap();

    // Simulated restart: a fresh instance over the same database
    let fresh = SqliteSyncLog::new(db.pool().clone());
    let resumed = fresh.find_query_data("Patient", "").await.unwrap().unwrap();
    assert_eq!(resumed.query_id(), Some(query_id));
    assert_eq!(resumed.query_offset(), Some(400));
    assert!(resumed.is_query_row());
}

#[tokio::test]
async fn test_complete_query_keeps_steady_state_history() {
    let (_db, log) = setup().await;
    let query_id = Uuid::new_v4();
    let t1 = Utc::now() - Duration::minutes(3);

    log.save("Patient", "", Some("etag-1"), t1).await.unwrap();
    log.save_query("Patient", "", query_id, 150).await.unwrap();

    log.complete_query("Patient", "", query_id).await.unwrap();

    assert!(log.find_query_data("Patient", "").await.unwrap().is_none());
    assert_eq!(
        log.last_etag("Patient", "").await.unwrap().as_deref(),
        Some("etag-1")
    );
    assert_eq!(
        log.last_sync_time("Patient", "")
            .await
            .unwrap()
            .unwrap()
            .timestamp(),
        t1.timestamp()
    );
    // One steady-state row, no leftovers
    assert_eq!(log.all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_complete_query_without_steady_row() {
    let (_db, log) = setup().await;
    let query_id = Uuid::new_v4();

    log.save_query("Patient", "", query_id, 50).await.unwrap();
    log.complete_query("Patient", "", query_id).await.unwrap();

    assert!(log.find_query_data("Patient", "").await.unwrap().is_none());
    // The row fell back to steady-state bookkeeping
    assert_eq!(log.all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_complete_query_missing_row_is_noop() {
    let (_db, log) = setup().await;

    log.complete_query("Patient", "", Uuid::new_v4()).await.unwrap();
    assert!(log.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_multiple_queries_in_flight() {
    let (_db, log) = setup().await;
    let q1 = Uuid::new_v4();
    let q2 = Uuid::new_v4();

    log.save_query("Patient", "", q1, 100).await.unwrap();
    log.save_query("Patient", "", q2, 300).await.unwrap();

    // Both rows coexist; completing one leaves the other resumable
    log.complete_query("Patient", "", q1).await.unwrap();
    let remaining = log.find_query_data("Patient", "").await.unwrap().unwrap();
    assert_eq!(remaining.query_id(), Some(q2));
}

// ============================================================================
// Deletion and housekeeping
// ============================================================================

#[tokio::test]
async fn test_delete_with_query_id_removes_exact_row() {
    let (_db, log) = setup().await;
    let query_id = Uuid::new_v4();

    log.save("Patient", "", Some("etag"), Utc::now()).await.unwrap();
    log.save_query("Patient", "", query_id, 10).await.unwrap();

    let query_row = log.find_query_data("Patient", "").await.unwrap().unwrap();
    log.delete(&query_row).await.unwrap();

    assert!(log.find_query_data("Patient", "").await.unwrap().is_none());
    // The steady-state row survives
    assert_eq!(log.all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_without_query_id_removes_whole_pair() {
    let (_db, log) = setup().await;

    log.save("Patient", "", Some("etag"), Utc::now()).await.unwrap();
    log.save_query("Patient", "", Uuid::new_v4(), 10).await.unwrap();
    log.save("Observation", "", Some("other"), Utc::now())
        .await
        .unwrap();

    log.delete(&SyncLogEntry::new("Patient", "")).await.unwrap();

    assert!(log.last_etag("Patient", "").await.unwrap().is_none());
    assert!(log.find_query_data("Patient", "").await.unwrap().is_none());
    // Unrelated pairs are untouched
    assert_eq!(
        log.last_etag("Observation", "").await.unwrap().as_deref(),
        Some("other")
    );
}

#[tokio::test]
async fn test_prune_stale_queries() {
    let (_db, log) = setup().await;

    log.save("Patient", "", Some("etag"), Utc::now()).await.unwrap();
    log.save_query("Patient", "", Uuid::new_v4(), 10).await.unwrap();

    // Nothing is older than a cutoff in the past
    let pruned = log
        .prune_stale_queries(Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(pruned, 0);

    // A future cutoff catches the in-flight row, steady state stays
    let pruned = log
        .prune_stale_queries(Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(pruned, 1);
    assert!(log.find_query_data("Patient", "").await.unwrap().is_none());
    assert_eq!(log.all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_all_excludes_query_rows() {
    let (_db, log) = setup().await;

    log.save("Patient", "", Some("etag"), Utc::now()).await.unwrap();
    log.save_query("Observation", "", Uuid::new_v4(), 5).await.unwrap();

    let rows = log.all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].resource_type(), "Patient");
}

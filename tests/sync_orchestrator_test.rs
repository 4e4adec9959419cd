// ABOUTME: Orchestrator tests: idempotence, isolation, token lifecycle, status report
// ABOUTME: Exercises sync_one and sync_all over scripted adapters and in-memory stores

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{
    engine_with, fitbit_activity, fitbit_food, fitbit_sleep, garmin_activity, user, MockProvider,
};
use healthsync::errors::SyncError;
use healthsync::models::{ConnectionStatus, Provider};
use healthsync::storage::HealthRecordStore;

fn scripted_fitbit() -> MockProvider {
    MockProvider {
        activity_batch: (0..12).map(fitbit_activity).collect(),
        sleep_batch: (0..3).map(fitbit_sleep).collect(),
        nutrition_batch: (0..40).map(fitbit_food).collect(),
        ..MockProvider::new(Provider::Fitbit)
    }
}

#[tokio::test]
async fn sync_one_reports_full_counts() {
    let engine = engine_with(vec![Arc::new(scripted_fitbit())]);
    let user_id = user();
    engine
        .connections
        .create(user_id, Provider::Fitbit, "code")
        .await
        .unwrap();

    let counts = engine
        .orchestrator
        .sync_one(user_id, Provider::Fitbit, None)
        .await
        .unwrap();

    assert_eq!(counts.activities_count, 12);
    assert_eq!(counts.sleep_count, 3);
    assert_eq!(counts.nutrition_count, 40);
    assert!(counts.health_data_count > 0);
}

#[tokio::test]
async fn sync_one_twice_is_idempotent() {
    let engine = engine_with(vec![Arc::new(scripted_fitbit())]);
    let user_id = user();
    engine
        .connections
        .create(user_id, Provider::Fitbit, "code")
        .await
        .unwrap();

    let first = engine
        .orchestrator
        .sync_one(user_id, Provider::Fitbit, None)
        .await
        .unwrap();
    let second = engine
        .orchestrator
        .sync_one(user_id, Provider::Fitbit, None)
        .await
        .unwrap();

    assert_eq!(first, second);
    // Full-replace: the store holds one batch, not an accumulation.
    let stored = engine
        .record_store
        .fetch_for_source(user_id, Provider::Fitbit)
        .await
        .unwrap();
    assert_eq!(stored.activities.len(), 12);
    assert_eq!(stored.nutrition_entries.len(), 40);
}

#[tokio::test]
async fn sync_all_isolates_a_failing_provider() {
    let garmin = Arc::new(MockProvider {
        activity_batch: vec![garmin_activity("g-1")],
        fail_fetches_with: Some("connection timed out".to_owned()),
        ..MockProvider::new(Provider::Garmin)
    });
    let engine = engine_with(vec![Arc::new(scripted_fitbit()), garmin]);
    let user_id = user();
    engine
        .connections
        .create(user_id, Provider::Fitbit, "code")
        .await
        .unwrap();
    engine
        .connections
        .create(user_id, Provider::Garmin, "code")
        .await
        .unwrap();

    let results = engine.orchestrator.sync_all(user_id, None).await.unwrap();

    // One slot per originally-active connection.
    assert_eq!(results.len(), 2);
    let fitbit = &results[&Provider::Fitbit];
    assert!(fitbit.success);
    let counts = fitbit.counts.unwrap();
    assert_eq!(counts.activities_count, 12);
    assert_eq!(counts.sleep_count, 3);
    assert_eq!(counts.nutrition_count, 40);

    let garmin = &results[&Provider::Garmin];
    assert!(!garmin.success);
    assert!(garmin.counts.is_none());
    assert!(garmin.error.as_ref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn expired_token_triggers_exactly_one_refresh_before_fetching() {
    let adapter = Arc::new(MockProvider {
        issue_expired_tokens: true,
        activity_batch: vec![fitbit_activity(1)],
        ..MockProvider::new(Provider::Fitbit)
    });
    let engine = engine_with(vec![adapter.clone()]);
    let user_id = user();
    engine
        .connections
        .create(user_id, Provider::Fitbit, "code")
        .await
        .unwrap();

    engine
        .orchestrator
        .sync_one(user_id, Provider::Fitbit, None)
        .await
        .unwrap();

    assert_eq!(adapter.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(adapter.fetch_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failed_refresh_surfaces_auth_expired_and_fetches_nothing() {
    let adapter = Arc::new(MockProvider {
        issue_expired_tokens: true,
        fail_refresh: true,
        ..MockProvider::new(Provider::Fitbit)
    });
    let engine = engine_with(vec![adapter.clone()]);
    let user_id = user();
    let connection = engine
        .connections
        .create(user_id, Provider::Fitbit, "code")
        .await
        .unwrap();

    let err = engine
        .orchestrator
        .sync_one(user_id, Provider::Fitbit, None)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::AuthExpired { .. }));
    assert_eq!(adapter.fetch_calls.load(Ordering::SeqCst), 0);
    // Refresh-after-expiry failure demotes the connection.
    let after = engine
        .connections
        .require(connection.id)
        .await
        .unwrap();
    assert_eq!(after.status, ConnectionStatus::Expired);
}

#[tokio::test]
async fn inactive_connections_are_rejected_and_missing_ones_not_found() {
    let engine = engine_with(vec![Arc::new(MockProvider::new(Provider::Fitbit))]);
    let user_id = user();

    let err = engine
        .orchestrator
        .sync_one(user_id, Provider::Fitbit, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));

    let connection = engine
        .connections
        .create(user_id, Provider::Fitbit, "code")
        .await
        .unwrap();
    engine.connections.revoke(connection.id).await.unwrap();

    let err = engine
        .orchestrator
        .sync_one(user_id, Provider::Fitbit, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidState(_)));
}

#[tokio::test]
async fn sync_updates_last_synced_in_status_report() {
    let engine = engine_with(vec![Arc::new(scripted_fitbit())]);
    let user_id = user();
    engine
        .connections
        .create(user_id, Provider::Fitbit, "code")
        .await
        .unwrap();

    let before = engine.orchestrator.sync_status(user_id).await.unwrap();
    assert!(before[0].last_synced_at.is_none());

    engine
        .orchestrator
        .sync_one(user_id, Provider::Fitbit, None)
        .await
        .unwrap();

    let after = engine.orchestrator.sync_status(user_id).await.unwrap();
    assert!(after[0].last_synced_at.is_some());
}

// ABOUTME: Connection manager lifecycle tests over the in-memory stores
// ABOUTME: Covers upsert-on-reconnect, encryption at rest, refresh rules, revocation

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::sync::Arc;

use common::{engine_with, fitbit_activity, user, MockProvider};
use healthsync::errors::SyncError;
use healthsync::models::{ConnectionStatus, Provider};
use healthsync::storage::{ConnectionStore, HealthRecordStore};

#[tokio::test]
async fn create_stores_encrypted_tokens() {
    let engine = engine_with(vec![Arc::new(MockProvider::new(Provider::Fitbit))]);
    let user_id = user();

    let connection = engine
        .connections
        .create(user_id, Provider::Fitbit, "auth-code")
        .await
        .unwrap();

    // Stored token is ciphertext, not the plaintext the adapter issued.
    assert_ne!(connection.access_token, "access-fitbit");
    assert_eq!(
        engine.cipher.decrypt(&connection.access_token).unwrap(),
        "access-fitbit"
    );
    assert_eq!(connection.status, ConnectionStatus::Active);
    assert_eq!(connection.metadata["provider_user_id"], "user-fitbit");
}

#[tokio::test]
async fn reconnect_updates_in_place_without_duplicates() {
    let engine = engine_with(vec![Arc::new(MockProvider::new(Provider::Fitbit))]);
    let user_id = user();

    let first = engine
        .connections
        .create(user_id, Provider::Fitbit, "code-1")
        .await
        .unwrap();
    let second = engine
        .connections
        .create(user_id, Provider::Fitbit, "code-2")
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(
        engine.connection_store.find_by_user(user_id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn refresh_without_refresh_token_is_invalid_state() {
    let engine = engine_with(vec![Arc::new(MockProvider::new(Provider::Fitbit))]);
    let user_id = user();

    let mut connection = engine
        .connections
        .create(user_id, Provider::Fitbit, "code")
        .await
        .unwrap();
    connection.refresh_token = None;
    engine.connection_store.upsert(connection.clone()).await.unwrap();

    let err = engine.connections.refresh(connection.id).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidState(_)));
}

#[tokio::test]
async fn failed_refresh_leaves_connection_untouched() {
    let adapter = Arc::new(MockProvider {
        fail_refresh: true,
        ..MockProvider::new(Provider::Fitbit)
    });
    let engine = engine_with(vec![adapter]);
    let user_id = user();

    let before = engine
        .connections
        .create(user_id, Provider::Fitbit, "code")
        .await
        .unwrap();

    assert!(engine.connections.refresh(before.id).await.is_err());

    let after = engine.connection_store.get(before.id).await.unwrap().unwrap();
    assert_eq!(after.status, ConnectionStatus::Active);
    assert_eq!(after.access_token, before.access_token);
}

#[tokio::test]
async fn successful_refresh_reactivates_an_expired_connection() {
    let engine = engine_with(vec![Arc::new(MockProvider::new(Provider::Fitbit))]);
    let user_id = user();

    let connection = engine
        .connections
        .create(user_id, Provider::Fitbit, "code")
        .await
        .unwrap();
    engine.connections.mark_expired(connection.id).await.unwrap();

    let refreshed = engine.connections.refresh(connection.id).await.unwrap();
    assert_eq!(refreshed.status, ConnectionStatus::Active);
}

#[tokio::test]
async fn disconnect_deletes_connection_and_records() {
    let adapter = Arc::new(MockProvider {
        activity_batch: vec![fitbit_activity(1)],
        ..MockProvider::new(Provider::Fitbit)
    });
    let engine = engine_with(vec![adapter]);
    let user_id = user();

    let connection = engine
        .connections
        .create(user_id, Provider::Fitbit, "code")
        .await
        .unwrap();
    engine
        .orchestrator
        .sync_one(user_id, Provider::Fitbit, None)
        .await
        .unwrap();

    engine
        .connections
        .disconnect(user_id, Provider::Fitbit)
        .await
        .unwrap();

    let after = engine.connection_store.get(connection.id).await.unwrap();
    assert!(after.is_none());
    let batch = engine
        .record_store
        .fetch_for_source(user_id, Provider::Fitbit)
        .await
        .unwrap();
    assert!(batch.activities.is_empty());
}

#[tokio::test]
async fn statuses_report_every_connection_state() {
    let engine = engine_with(vec![
        Arc::new(MockProvider::new(Provider::Fitbit)),
        Arc::new(MockProvider::new(Provider::Strava)),
    ]);
    let user_id = user();

    engine
        .connections
        .create(user_id, Provider::Fitbit, "code")
        .await
        .unwrap();
    let strava = engine
        .connections
        .create(user_id, Provider::Strava, "code")
        .await
        .unwrap();
    engine.connections.mark_expired(strava.id).await.unwrap();

    let statuses = engine.connections.statuses(user_id).await.unwrap();
    assert_eq!(statuses.len(), 2);
    let strava_row = statuses
        .iter()
        .find(|s| s.provider == Provider::Strava)
        .unwrap();
    assert_eq!(strava_row.status, ConnectionStatus::Expired);
}

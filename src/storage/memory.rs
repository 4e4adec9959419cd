// ABOUTME: In-memory store implementations backed by tokio RwLocks
// ABOUTME: Development and test backend; swap for a relational backend in deployment
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory storage.
//!
//! Write locks make `replace_for_source` atomic with respect to readers,
//! matching the contract a transactional relational backend provides.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::SyncResult;
use crate::models::{Connection, Provider};

use super::{ConnectionStore, HealthRecordStore, InsertCounts, RecordBatch};

/// In-memory [`ConnectionStore`], keyed by connection id.
#[derive(Default)]
pub struct InMemoryConnectionStore {
    connections: RwLock<HashMap<Uuid, Connection>>,
}

impl InMemoryConnectionStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn upsert(&self, connection: Connection) -> SyncResult<()> {
        self.connections
            .write()
            .await
            .insert(connection.id, connection);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> SyncResult<Option<Connection>> {
        Ok(self.connections.read().await.get(&id).cloned())
    }

    async fn find_by_user_and_provider(
        &self,
        user_id: Uuid,
        provider: Provider,
    ) -> SyncResult<Option<Connection>> {
        Ok(self
            .connections
            .read()
            .await
            .values()
            .find(|c| c.user_id == user_id && c.provider == provider)
            .cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> SyncResult<Vec<Connection>> {
        let mut list: Vec<Connection> = self
            .connections
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by_key(|c| c.provider.as_str());
        Ok(list)
    }

    async fn find_active_by_user(&self, user_id: Uuid) -> SyncResult<Vec<Connection>> {
        let mut list = self.find_by_user(user_id).await?;
        list.retain(Connection::is_active);
        Ok(list)
    }

    async fn delete(&self, id: Uuid) -> SyncResult<bool> {
        Ok(self.connections.write().await.remove(&id).is_some())
    }
}

/// In-memory [`HealthRecordStore`], partitioned by `(user, provider)`.
#[derive(Default)]
pub struct InMemoryHealthRecordStore {
    batches: RwLock<HashMap<(Uuid, Provider), RecordBatch>>,
}

impl InMemoryHealthRecordStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn batch_len(batch: &RecordBatch) -> usize {
    batch.activities.len()
        + batch.sleep_sessions.len()
        + batch.nutrition_entries.len()
        + batch.health_points.len()
}

fn clone_batch(batch: &RecordBatch) -> RecordBatch {
    RecordBatch {
        activities: batch.activities.clone(),
        sleep_sessions: batch.sleep_sessions.clone(),
        nutrition_entries: batch.nutrition_entries.clone(),
        health_points: batch.health_points.clone(),
    }
}

#[async_trait]
impl HealthRecordStore for InMemoryHealthRecordStore {
    async fn replace_for_source(
        &self,
        user_id: Uuid,
        provider: Provider,
        batch: RecordBatch,
    ) -> SyncResult<InsertCounts> {
        let counts = InsertCounts {
            activities: batch.activities.len(),
            sleep_sessions: batch.sleep_sessions.len(),
            nutrition_entries: batch.nutrition_entries.len(),
            health_points: batch.health_points.len(),
        };
        self.batches
            .write()
            .await
            .insert((user_id, provider), batch);
        Ok(counts)
    }

    async fn delete_by_user_and_source(
        &self,
        user_id: Uuid,
        provider: Provider,
    ) -> SyncResult<usize> {
        Ok(self
            .batches
            .write()
            .await
            .remove(&(user_id, provider))
            .map_or(0, |batch| batch_len(&batch)))
    }

    async fn fetch_for_source(
        &self,
        user_id: Uuid,
        provider: Provider,
    ) -> SyncResult<RecordBatch> {
        Ok(self
            .batches
            .read()
            .await
            .get(&(user_id, provider))
            .map_or_else(RecordBatch::default, clone_batch))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::models::ConnectionStatus;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn connection(user_id: Uuid, provider: Provider, status: ConnectionStatus) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            user_id,
            provider,
            access_token: "ciphertext".to_owned(),
            refresh_token: None,
            token_expires_at: None,
            last_synced_at: None,
            scopes: BTreeSet::new(),
            status,
            metadata: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn active_filter_excludes_expired_and_revoked() {
        let store = InMemoryConnectionStore::new();
        let user = Uuid::new_v4();
        for (provider, status) in [
            (Provider::Fitbit, ConnectionStatus::Active),
            (Provider::Strava, ConnectionStatus::Expired),
            (Provider::Garmin, ConnectionStatus::Revoked),
        ] {
            store.upsert(connection(user, provider, status)).await.unwrap();
        }
        let active = store.find_active_by_user(user).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].provider, Provider::Fitbit);
        assert_eq!(store.find_by_user(user).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn replace_overwrites_previous_batch() {
        let store = InMemoryHealthRecordStore::new();
        let user = Uuid::new_v4();
        let counts = store
            .replace_for_source(user, Provider::Fitbit, RecordBatch::default())
            .await
            .unwrap();
        assert_eq!(counts, InsertCounts::default());
        let removed = store
            .delete_by_user_and_source(user, Provider::Fitbit)
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }
}

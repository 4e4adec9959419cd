// ABOUTME: Storage collaborator contracts for connections and canonical records
// ABOUTME: Full-replace write path is a single atomic store operation
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage contracts.
//!
//! The engine consumes two collaborators: a [`ConnectionStore`] for
//! credential relationships and a [`HealthRecordStore`] for canonical
//! records. Sync writes go through [`HealthRecordStore::replace_for_source`],
//! which deletes and inserts in one operation so readers never observe a
//! half-replaced dataset.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::SyncResult;
use crate::models::{
    ActivityRecord, Connection, HealthDataPoint, NutritionEntryRecord, Provider,
    SleepSessionRecord,
};

pub use memory::{InMemoryConnectionStore, InMemoryHealthRecordStore};

/// One provider's mapped output for a sync pass, written as a unit.
#[derive(Debug, Default)]
pub struct RecordBatch {
    /// Normalized activity records.
    pub activities: Vec<ActivityRecord>,
    /// Normalized sleep sessions.
    pub sleep_sessions: Vec<SleepSessionRecord>,
    /// Normalized nutrition entries.
    pub nutrition_entries: Vec<NutritionEntryRecord>,
    /// Derived scalar observations.
    pub health_points: Vec<HealthDataPoint>,
}

/// Row counts from a bulk write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertCounts {
    /// Activities inserted.
    pub activities: usize,
    /// Sleep sessions inserted.
    pub sleep_sessions: usize,
    /// Nutrition entries inserted.
    pub nutrition_entries: usize,
    /// Health data points inserted.
    pub health_points: usize,
}

/// Persistence for provider connections. At most one row per
/// `(user_id, provider)` pair.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Insert or update a connection, keyed by id.
    async fn upsert(&self, connection: Connection) -> SyncResult<()>;

    /// Fetch a connection by id.
    async fn get(&self, id: Uuid) -> SyncResult<Option<Connection>>;

    /// Fetch the connection for a `(user, provider)` pair.
    async fn find_by_user_and_provider(
        &self,
        user_id: Uuid,
        provider: Provider,
    ) -> SyncResult<Option<Connection>>;

    /// All connections for a user, any status.
    async fn find_by_user(&self, user_id: Uuid) -> SyncResult<Vec<Connection>>;

    /// Active connections for a user.
    async fn find_active_by_user(&self, user_id: Uuid) -> SyncResult<Vec<Connection>>;

    /// Delete a connection. Returns whether a row existed.
    async fn delete(&self, id: Uuid) -> SyncResult<bool>;
}

/// Persistence for canonical health records.
#[async_trait]
pub trait HealthRecordStore: Send + Sync {
    /// Atomically delete every record for `(user, provider)` and insert the
    /// batch. Readers see either the old dataset or the new one.
    async fn replace_for_source(
        &self,
        user_id: Uuid,
        provider: Provider,
        batch: RecordBatch,
    ) -> SyncResult<InsertCounts>;

    /// Delete every record for `(user, provider)`. Returns rows removed.
    async fn delete_by_user_and_source(
        &self,
        user_id: Uuid,
        provider: Provider,
    ) -> SyncResult<usize>;

    /// Read back the stored batch for `(user, provider)`.
    async fn fetch_for_source(
        &self,
        user_id: Uuid,
        provider: Provider,
    ) -> SyncResult<RecordBatch>;
}

// ABOUTME: Sync orchestrator: full-replace per-provider synchronization
// ABOUTME: Per-provider failure isolation; one provider's error never aborts siblings
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync orchestrator.
//!
//! `sync_one` drives a single provider through refresh-if-expired, three
//! concurrent category fetches, mapping, and one atomic full-replace write.
//! `sync_all` runs one `sync_one` per active connection and collects each
//! outcome independently; isolation between providers is the engine's central
//! failure-containment contract.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connections::{ConnectionManager, ConnectionStatusView};
use crate::errors::{SyncError, SyncResult};
use crate::mappers::{self, health_points};
use crate::models::{Connection, Provider};
use crate::providers::ProviderRegistry;
use crate::rate_limiting::{BucketKey, EndpointClass};
use crate::storage::{HealthRecordStore, RecordBatch};

/// Trailing window used when the caller does not pass one.
const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Record counts from one provider's completed sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    /// Activities stored.
    pub activities_count: usize,
    /// Sleep sessions stored.
    pub sleep_count: usize,
    /// Nutrition entries stored.
    pub nutrition_count: usize,
    /// Derived health data points stored.
    pub health_data_count: usize,
}

/// Per-provider slot in a [`SyncOrchestrator::sync_all`] result map.
#[derive(Debug, Clone)]
pub struct ProviderSyncOutcome {
    /// Whether the provider's sync completed.
    pub success: bool,
    /// Counts, when successful.
    pub counts: Option<SyncCounts>,
    /// Error description, when failed.
    pub error: Option<String>,
}

impl ProviderSyncOutcome {
    fn ok(counts: SyncCounts) -> Self {
        Self {
            success: true,
            counts: Some(counts),
            error: None,
        }
    }

    fn failed(error: &SyncError) -> Self {
        Self {
            success: false,
            counts: None,
            error: Some(error.to_string()),
        }
    }
}

/// Drives provider synchronization end to end.
pub struct SyncOrchestrator {
    connections: Arc<ConnectionManager>,
    registry: Arc<ProviderRegistry>,
    records: Arc<dyn HealthRecordStore>,
}

impl SyncOrchestrator {
    /// Build the orchestrator over its collaborators.
    #[must_use]
    pub fn new(
        connections: Arc<ConnectionManager>,
        registry: Arc<ProviderRegistry>,
        records: Arc<dyn HealthRecordStore>,
    ) -> Self {
        Self {
            connections,
            registry,
            records,
        }
    }

    /// Synchronize one provider for a user over the given window (trailing
    /// 30 days when `None`). Full-replace: prior records for the pair are
    /// gone once this returns.
    pub async fn sync_one(
        &self,
        user_id: Uuid,
        provider: Provider,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> SyncResult<SyncCounts> {
        let (start, end) = window.unwrap_or_else(|| {
            let now = Utc::now();
            (now - Duration::days(DEFAULT_WINDOW_DAYS), now)
        });

        let connection = self
            .connections
            .store()
            .find_by_user_and_provider(user_id, provider)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("no {provider} connection for user")))?;
        if !connection.is_active() {
            return Err(SyncError::InvalidState(format!(
                "{provider} connection is not active"
            )));
        }

        let connection = self.ensure_fresh_token(connection).await?;
        let credential = self.connections.access_credential(&connection)?;
        let adapter = self.registry.get(provider)?;

        // Independent reads; writes are sequenced after all three complete.
        let (raw_activities, raw_sleep, raw_nutrition) = tokio::try_join!(
            adapter.get_activities(&credential, start, end),
            adapter.get_sleep_data(&credential, start, end),
            adapter.get_nutrition_data(&credential, start, end),
        )?;

        let mapper = mappers::for_provider(provider).ok_or_else(|| {
            SyncError::InvalidState(format!("provider {provider} has no mapper"))
        })?;
        let activities = mapper.map_activities(user_id, &raw_activities);
        let sleep = mapper.map_sleep_data(user_id, &raw_sleep);
        let nutrition = mapper.map_nutrition_data(user_id, &raw_nutrition);
        let skipped = activities.skipped + sleep.skipped + nutrition.skipped;
        if skipped > 0 {
            warn!(provider = %provider, skipped, "unmappable records skipped");
        }

        let mut points = health_points::from_activities(&activities.records);
        points.extend(health_points::from_sleep_sessions(&sleep.records));
        points.extend(health_points::from_nutrition_entries(&nutrition.records));

        let counts = self
            .records
            .replace_for_source(
                user_id,
                provider,
                RecordBatch {
                    activities: activities.records,
                    sleep_sessions: sleep.records,
                    nutrition_entries: nutrition.records,
                    health_points: points,
                },
            )
            .await?;

        self.connections.update_last_synced(connection.id).await?;
        self.registry.limiter().reset_provider(provider);

        let counts = SyncCounts {
            activities_count: counts.activities,
            sleep_count: counts.sleep_sessions,
            nutrition_count: counts.nutrition_entries,
            health_data_count: counts.health_points,
        };
        info!(
            provider = %provider,
            activities = counts.activities_count,
            sleep = counts.sleep_count,
            nutrition = counts.nutrition_count,
            points = counts.health_data_count,
            "sync completed"
        );
        Ok(counts)
    }

    /// Synchronize every active connection for a user. One result slot per
    /// originally-active connection; a slot failure never aborts siblings.
    pub async fn sync_all(
        &self,
        user_id: Uuid,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> SyncResult<HashMap<Provider, ProviderSyncOutcome>> {
        let active = self
            .connections
            .store()
            .find_active_by_user(user_id)
            .await?;
        let providers: Vec<Provider> = active.iter().map(|c| c.provider).collect();

        let outcomes = join_all(
            providers
                .iter()
                .map(|&provider| self.sync_one(user_id, provider, window)),
        )
        .await;

        let mut results = HashMap::with_capacity(providers.len());
        for (provider, outcome) in providers.into_iter().zip(outcomes) {
            let slot = match outcome {
                Ok(counts) => ProviderSyncOutcome::ok(counts),
                Err(error) => {
                    warn!(provider = %provider, %error, "provider sync failed");
                    ProviderSyncOutcome::failed(&error)
                }
            };
            results.insert(provider, slot);
        }
        Ok(results)
    }

    /// Connection status rows for a user, any lifecycle state.
    pub async fn sync_status(&self, user_id: Uuid) -> SyncResult<Vec<ConnectionStatusView>> {
        self.connections.statuses(user_id).await
    }

    /// Refresh the token when it has passed its expiry. A refresh failure
    /// marks the connection expired and surfaces `AuthExpired`; no fetch is
    /// attempted.
    async fn ensure_fresh_token(&self, connection: Connection) -> SyncResult<Connection> {
        if !connection.token_expired(Utc::now()) {
            return Ok(connection);
        }
        let provider = connection.provider;
        debug!(provider = %provider, "access token expired, refreshing");
        match self.connections.refresh(connection.id).await {
            Ok(refreshed) => Ok(refreshed),
            Err(error) => {
                self.registry
                    .limiter()
                    .record_error(BucketKey::new(provider, EndpointClass::Auth));
                self.connections.mark_expired(connection.id).await?;
                Err(SyncError::AuthExpired {
                    provider,
                    message: error.to_string(),
                })
            }
        }
    }
}

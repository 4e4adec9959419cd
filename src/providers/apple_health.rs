// ABOUTME: Apple Health stub adapter; HealthKit has no server-side API
// ABOUTME: Returns deterministic placeholder payloads shaped like HealthKit exports
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Apple Health adapter.
//!
//! HealthKit data is only reachable from an on-device app; there is no public
//! server-side API to pull from. This adapter is a documented placeholder: it
//! accepts connections and returns deterministic sample payloads shaped like
//! HealthKit export records, so the rest of the pipeline can be exercised end
//! to end until a device-upload ingestion path exists.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tracing::debug;

use super::core::{AccessCredential, HealthProvider, ProviderProfile, ProviderTokens};
use crate::errors::SyncResult;
use crate::models::Provider;
use crate::rate_limiting::RateLimiter;

/// Apple Health placeholder adapter.
pub struct AppleHealthProvider {
    #[allow(dead_code)]
    limiter: Arc<RateLimiter>,
}

impl AppleHealthProvider {
    /// Build the placeholder adapter.
    #[must_use]
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl HealthProvider for AppleHealthProvider {
    fn provider(&self) -> Provider {
        Provider::AppleHealth
    }

    fn authorize_url(&self, state: &str) -> SyncResult<String> {
        // No real consent screen; the app-facing layer recognizes this scheme.
        Ok(format!("healthsync://apple-health/connect?state={state}"))
    }

    async fn exchange_code(&self, _code: &str) -> SyncResult<ProviderTokens> {
        debug!("apple health is a placeholder adapter, issuing a static token");
        Ok(ProviderTokens {
            access_token: "apple-health-placeholder-token".to_owned(),
            refresh_token: None,
            expires_at: None,
            scopes: BTreeSet::new(),
            token_secret: None,
        })
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> SyncResult<ProviderTokens> {
        self.exchange_code("").await
    }

    async fn get_user_profile(
        &self,
        _credential: &AccessCredential,
    ) -> SyncResult<ProviderProfile> {
        Ok(ProviderProfile {
            provider_user_id: "apple-health-local-user".to_owned(),
            display_name: Some("Apple Health (device)".to_owned()),
        })
    }

    async fn get_activities(
        &self,
        _credential: &AccessCredential,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        // Deterministic sample anchored to the requested window.
        let started = start + Duration::hours(8);
        Ok(vec![json!({
            "uuid": "apple-sample-workout-1",
            "workoutActivityType": "HKWorkoutActivityTypeWalking",
            "startDate": started.to_rfc3339(),
            "duration": 1_800.0,
            "totalDistance": 2_400.0,
            "totalEnergyBurned": 150.0,
            "stepCount": 3_200
        })])
    }

    async fn get_sleep_data(
        &self,
        _credential: &AccessCredential,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        let bedtime = start + Duration::hours(22);
        Ok(vec![json!({
            "uuid": "apple-sample-sleep-1",
            "startDate": bedtime.to_rfc3339(),
            "endDate": (bedtime + Duration::hours(8)).to_rfc3339(),
            "sleepAnalysis": [
                {"stage": "core", "minutes": 280},
                {"stage": "deep", "minutes": 90},
                {"stage": "rem",  "minutes": 80},
                {"stage": "awake","minutes": 30}
            ]
        })])
    }

    async fn get_nutrition_data(
        &self,
        _credential: &AccessCredential,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        let logged = start + Duration::hours(12);
        Ok(vec![json!({
            "uuid": "apple-sample-nutrition-1",
            "date": logged.to_rfc3339(),
            "mealType": "lunch",
            "items": [
                {"name": "Sample meal", "calories": 620.0,
                 "protein": 32.0, "carbohydrates": 70.0, "fat": 22.0}
            ]
        })])
    }
}

// ABOUTME: Samsung Health stub adapter; the partner API is not publicly available
// ABOUTME: Returns deterministic placeholder payloads shaped like Samsung Health records
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Samsung Health adapter.
//!
//! The Samsung Health server API is restricted to approved partners, so this
//! adapter is a documented placeholder returning deterministic sample payloads
//! in the partner API's record shapes. Swap the internals for real HTTP calls
//! once partner access is granted.

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

/// Samsung Health placeholder adapter.
pub struct SamsungHealthProvider {
    #[allow(dead_code)]
    limiter: Arc<RateLimiter>,
}

impl SamsungHealthProvider {
    /// Build the placeholder adapter.
    #[must_use]
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl HealthProvider for SamsungHealthProvider {
    fn provider(&self) -> Provider {
        Provider::SamsungHealth
    }

    fn authorize_url(&self, state: &str) -> SyncResult<String> {
        Ok(format!("healthsync://samsung-health/connect?state={state}"))
    }

    async fn exchange_code(&self, _code: &str) -> SyncResult<ProviderTokens> {
        debug!("samsung health is a placeholder adapter, issuing a static token");
        Ok(ProviderTokens {
            access_token: "samsung-health-placeholder-token".to_owned(),
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
            provider_user_id: "samsung-health-local-user".to_owned(),
            display_name: Some("Samsung Health (device)".to_owned()),
        })
    }

    async fn get_activities(
        &self,
        _credential: &AccessCredential,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        let started = start + Duration::hours(7);
        Ok(vec![json!({
            "datauuid": "samsung-sample-exercise-1",
            "exercise_type": 1002,
            "start_time": started.timestamp_millis(),
            "duration": 2_100_000,
            "distance": 4_500.0,
            "calorie": 260.0,
            "count": 5_800
        })])
    }

    async fn get_sleep_data(
        &self,
        _credential: &AccessCredential,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        let bedtime = start + Duration::hours(23);
        Ok(vec![json!({
            "datauuid": "samsung-sample-sleep-1",
            "start_time": bedtime.timestamp_millis(),
            "end_time": (bedtime + Duration::hours(7)).timestamp_millis(),
            "stages": [
                {"stage": "light", "minutes": 240},
                {"stage": "deep",  "minutes": 80},
                {"stage": "rem",   "minutes": 70},
                {"stage": "awake", "minutes": 30}
            ]
        })])
    }

    async fn get_nutrition_data(
        &self,
        _credential: &AccessCredential,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        let logged = start + Duration::hours(19);
        Ok(vec![json!({
            "datauuid": "samsung-sample-food-1",
            "start_time": logged.timestamp_millis(),
            "meal_type": 100_003,
            "title": "Sample dinner",
            "calorie": 740.0,
            "protein": 38.0,
            "carbohydrate": 82.0,
            "total_fat": 26.0
        })])
    }
}

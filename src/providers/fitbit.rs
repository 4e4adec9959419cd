// ABOUTME: Fitbit Web API adapter with OAuth 2.0 and day-granular sleep/nutrition fetches
// ABOUTME: Basic-auth token endpoint, bearer data endpoints, bounded activity pagination
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fitbit adapter.
//!
//! Sleep and food logs are only addressable per calendar day, so the window
//! fetches iterate day by day; a single day's failure (commonly "no data for
//! date") is logged and swallowed so the rest of the window still lands.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::core::{AccessCredential, HealthProvider, ProviderProfile, ProviderTokens};
use super::http::{execute_json, shared_client};
use crate::config::OAuth2ClientConfig;
use crate::errors::{ProviderError, SyncResult};
use crate::models::Provider;
use crate::rate_limiting::{BucketKey, EndpointClass, RateLimiter};

const AUTH_URL: &str = "https://www.fitbit.com/oauth2/authorize";
const TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";
const API_BASE: &str = "https://api.fitbit.com";
const DEFAULT_SCOPES: &str = "activity nutrition sleep profile";

/// Hard cap on activity-list pages per window fetch.
const MAX_ACTIVITY_PAGES: usize = 10;

#[derive(Debug, Deserialize)]
struct FitbitTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    scope: Option<String>,
}

/// Fitbit Web API adapter.
pub struct FitbitProvider {
    config: OAuth2ClientConfig,
    limiter: Arc<RateLimiter>,
    client: Client,
}

impl FitbitProvider {
    /// Build the adapter from client credentials.
    #[must_use]
    pub fn new(config: OAuth2ClientConfig, limiter: Arc<RateLimiter>) -> Self {
        Self {
            config,
            limiter,
            client: shared_client().clone(),
        }
    }

    fn credentials(&self) -> SyncResult<(&str, &str)> {
        match (&self.config.client_id, &self.config.client_secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(ProviderError::Configuration {
                provider: Provider::Fitbit,
                message: "FITBIT_CLIENT_ID / FITBIT_CLIENT_SECRET not set".to_owned(),
            }
            .into()),
        }
    }

    fn basic_auth_header(&self) -> SyncResult<String> {
        let (id, secret) = self.credentials()?;
        Ok(format!(
            "Basic {}",
            BASE64_STANDARD.encode(format!("{id}:{secret}"))
        ))
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> SyncResult<ProviderTokens> {
        let auth = self.basic_auth_header()?;
        let request = self
            .client
            .post(TOKEN_URL)
            .header("Authorization", auth)
            .form(params);

        let body = execute_json(
            &self.limiter,
            BucketKey::new(Provider::Fitbit, EndpointClass::Auth),
            "token",
            request,
        )
        .await?;

        let token: FitbitTokenResponse =
            serde_json::from_value(body).map_err(|e| ProviderError::InvalidPayload {
                provider: Provider::Fitbit,
                message: format!("token response: {e}"),
            })?;

        Ok(ProviderTokens {
            access_token: token.access_token,
            refresh_token: Some(token.refresh_token),
            expires_at: Some(Utc::now() + ChronoDuration::seconds(token.expires_in)),
            scopes: token
                .scope
                .unwrap_or_else(|| DEFAULT_SCOPES.to_owned())
                .split_whitespace()
                .map(str::to_owned)
                .collect::<BTreeSet<_>>(),
            token_secret: None,
        })
    }

    async fn api_get(
        &self,
        credential: &AccessCredential,
        path: &str,
        operation: &'static str,
    ) -> SyncResult<Value> {
        let request = self
            .client
            .get(format!("{API_BASE}/{}", path.trim_start_matches('/')))
            .bearer_auth(&credential.access_token);
        execute_json(
            &self.limiter,
            BucketKey::new(Provider::Fitbit, EndpointClass::Data),
            operation,
            request,
        )
        .await
    }

    /// Fetch one category of day-granular logs across the window, swallowing
    /// per-day failures.
    async fn fetch_daily(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        path_for_day: impl Fn(NaiveDate) -> String,
        array_key: &str,
        operation: &'static str,
    ) -> SyncResult<Vec<Value>> {
        let mut records = Vec::new();
        for day in days_in_window(start, end) {
            match self.api_get(credential, &path_for_day(day), operation).await {
                Ok(mut body) => {
                    if let Some(Value::Array(entries)) = body.get_mut(array_key).map(Value::take) {
                        records.extend(entries);
                    }
                }
                Err(e) => {
                    warn!(
                        provider = "fitbit",
                        %day,
                        operation,
                        error = %e,
                        "single-day fetch failed, continuing with remaining days"
                    );
                }
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl HealthProvider for FitbitProvider {
    fn provider(&self) -> Provider {
        Provider::Fitbit
    }

    fn authorize_url(&self, state: &str) -> SyncResult<String> {
        let (client_id, _) = self.credentials()?;
        let redirect = self.config.redirect_uri.as_deref().unwrap_or_default();
        Ok(format!(
            "{AUTH_URL}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            urlencoding::encode(client_id),
            urlencoding::encode(redirect),
            urlencoding::encode(DEFAULT_SCOPES),
            urlencoding::encode(state),
        ))
    }

    async fn exchange_code(&self, code: &str) -> SyncResult<ProviderTokens> {
        let redirect = self.config.redirect_uri.clone().unwrap_or_default();
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &redirect),
        ])
        .await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> SyncResult<ProviderTokens> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn get_user_profile(
        &self,
        credential: &AccessCredential,
    ) -> SyncResult<ProviderProfile> {
        let body = self
            .api_get(credential, "1/user/-/profile.json", "get_user_profile")
            .await?;
        let user = body.get("user").ok_or_else(|| ProviderError::InvalidPayload {
            provider: Provider::Fitbit,
            message: "profile response missing `user`".to_owned(),
        })?;
        Ok(ProviderProfile {
            provider_user_id: user
                .get("encodedId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            display_name: user
                .get("displayName")
                .and_then(Value::as_str)
                .map(str::to_owned),
        })
    }

    async fn get_activities(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        let mut records = Vec::new();
        let after = start.format("%Y-%m-%dT%H:%M:%S").to_string();

        for page in 0..MAX_ACTIVITY_PAGES {
            let path = format!(
                "1/user/-/activities/list.json?afterDate={after}&sort=asc&limit=100&offset={}",
                page * 100
            );
            let body = self.api_get(credential, &path, "get_activities").await?;
            let Some(Value::Array(batch)) = body.get("activities").cloned() else {
                break;
            };
            let len = batch.len();
            for activity in batch {
                // The list endpoint only filters on afterDate; clamp the
                // window end client-side.
                let in_window = activity
                    .get("startTime")
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .is_none_or(|t| t.with_timezone(&Utc) <= end);
                if in_window {
                    records.push(activity);
                }
            }
            if len < 100 {
                break;
            }
        }

        debug!(count = records.len(), "fetched fitbit activities");
        Ok(records)
    }

    async fn get_sleep_data(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        self.fetch_daily(
            credential,
            start,
            end,
            |day| format!("1.2/user/-/sleep/date/{day}.json"),
            "sleep",
            "get_sleep_data",
        )
        .await
    }

    async fn get_nutrition_data(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        self.fetch_daily(
            credential,
            start,
            end,
            |day| format!("1/user/-/foods/log/date/{day}.json"),
            "foods",
            "get_nutrition_data",
        )
        .await
    }
}

/// Calendar days covered by the window, inclusive on both ends.
pub(crate) fn days_in_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> impl Iterator<Item = NaiveDate> {
    let first = start.date_naive();
    let last = end.date_naive();
    first
        .iter_days()
        .take_while(move |d| *d <= last)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_days_are_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 3, 30, 22, 0, 0).single().unwrap();
        let end = Utc.with_ymd_and_hms(2024, 4, 2, 1, 0, 0).single().unwrap();
        let days: Vec<_> = days_in_window(start, end).collect();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0].to_string(), "2024-03-30");
        assert_eq!(days[3].to_string(), "2024-04-02");
    }

    #[test]
    fn single_day_window() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).single().unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).single().unwrap();
        assert_eq!(days_in_window(start, end).count(), 1);
    }
}

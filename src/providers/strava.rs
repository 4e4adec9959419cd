// ABOUTME: Strava API v3 adapter with OAuth 2.0 and epoch-windowed activity fetches
// ABOUTME: Strava exposes no sleep or nutrition API; those fetches return empty batches
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strava adapter.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::core::{AccessCredential, HealthProvider, ProviderProfile, ProviderTokens};
use super::http::{execute_json, shared_client};
use crate::config::OAuth2ClientConfig;
use crate::errors::{ProviderError, SyncResult};
use crate::models::Provider;
use crate::rate_limiting::{BucketKey, EndpointClass, RateLimiter};

const AUTH_URL: &str = "https://www.strava.com/oauth/authorize";
const TOKEN_URL: &str = "https://www.strava.com/oauth/token";
const API_BASE: &str = "https://www.strava.com/api/v3";
const DEFAULT_SCOPES: &str = "read,activity:read_all";

const MAX_ACTIVITY_PAGES: usize = 10;

#[derive(Debug, Deserialize)]
struct StravaTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
    scope: Option<String>,
}

/// Strava API v3 adapter.
pub struct StravaProvider {
    config: OAuth2ClientConfig,
    limiter: Arc<RateLimiter>,
    client: Client,
}

impl StravaProvider {
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
                provider: Provider::Strava,
                message: "STRAVA_CLIENT_ID / STRAVA_CLIENT_SECRET not set".to_owned(),
            }
            .into()),
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> SyncResult<ProviderTokens> {
        let (id, secret) = self.credentials()?;
        let mut form: Vec<(&str, &str)> = vec![("client_id", id), ("client_secret", secret)];
        form.extend_from_slice(params);

        let body = execute_json(
            &self.limiter,
            BucketKey::new(Provider::Strava, EndpointClass::Auth),
            "token",
            self.client.post(TOKEN_URL).form(&form),
        )
        .await?;

        let token: StravaTokenResponse =
            serde_json::from_value(body).map_err(|e| ProviderError::InvalidPayload {
                provider: Provider::Strava,
                message: format!("token response: {e}"),
            })?;

        Ok(ProviderTokens {
            access_token: token.access_token,
            refresh_token: Some(token.refresh_token),
            expires_at: DateTime::from_timestamp(token.expires_at, 0),
            scopes: token
                .scope
                .unwrap_or_else(|| DEFAULT_SCOPES.to_owned())
                .split(',')
                .map(str::to_owned)
                .collect::<BTreeSet<_>>(),
            token_secret: None,
        })
    }
}

#[async_trait]
impl HealthProvider for StravaProvider {
    fn provider(&self) -> Provider {
        Provider::Strava
    }

    fn authorize_url(&self, state: &str) -> SyncResult<String> {
        let (client_id, _) = self.credentials()?;
        let redirect = self.config.redirect_uri.as_deref().unwrap_or_default();
        Ok(format!(
            "{AUTH_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            urlencoding::encode(client_id),
            urlencoding::encode(redirect),
            urlencoding::encode(DEFAULT_SCOPES),
            urlencoding::encode(state),
        ))
    }

    async fn exchange_code(&self, code: &str) -> SyncResult<ProviderTokens> {
        self.token_request(&[("code", code), ("grant_type", "authorization_code")])
            .await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> SyncResult<ProviderTokens> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn get_user_profile(
        &self,
        credential: &AccessCredential,
    ) -> SyncResult<ProviderProfile> {
        let body = execute_json(
            &self.limiter,
            BucketKey::new(Provider::Strava, EndpointClass::Data),
            "get_user_profile",
            self.client
                .get(format!("{API_BASE}/athlete"))
                .bearer_auth(&credential.access_token),
        )
        .await?;

        Ok(ProviderProfile {
            provider_user_id: body
                .get("id")
                .and_then(Value::as_i64)
                .map(|id| id.to_string())
                .unwrap_or_default(),
            display_name: body
                .get("username")
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

        for page in 1..=MAX_ACTIVITY_PAGES {
            let url = format!(
                "{API_BASE}/athlete/activities?after={}&before={}&per_page=100&page={page}",
                start.timestamp(),
                end.timestamp(),
            );
            let body = execute_json(
                &self.limiter,
                BucketKey::new(Provider::Strava, EndpointClass::Data),
                "get_activities",
                self.client.get(url).bearer_auth(&credential.access_token),
            )
            .await?;

            let Value::Array(batch) = body else {
                return Err(ProviderError::InvalidPayload {
                    provider: Provider::Strava,
                    message: "activities response is not an array".to_owned(),
                }
                .into());
            };
            let len = batch.len();
            records.extend(batch);
            if len < 100 {
                break;
            }
        }

        debug!(count = records.len(), "fetched strava activities");
        Ok(records)
    }

    async fn get_sleep_data(
        &self,
        _credential: &AccessCredential,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        // Strava has no sleep API; an empty batch keeps the sync usable.
        debug!("strava exposes no sleep data, returning empty batch");
        Ok(Vec::new())
    }

    async fn get_nutrition_data(
        &self,
        _credential: &AccessCredential,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        // Strava has no nutrition API; an empty batch keeps the sync usable.
        debug!("strava exposes no nutrition data, returning empty batch");
        Ok(Vec::new())
    }
}

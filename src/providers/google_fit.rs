// ABOUTME: Google Fit adapter using service-account JWT bearer assertions
// ABOUTME: RS256 assertions minted with jsonwebtoken, sessions and aggregate endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Fit adapter.
//!
//! Authentication uses a service account rather than a user-consent code flow:
//! an RS256-signed JWT assertion is exchanged at the Google token endpoint for
//! a short-lived access token. `exchange_code` therefore ignores its argument
//! and mints a fresh assertion; `refresh_access_token` does the same, since
//! service-account tokens are re-minted rather than refreshed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use super::core::{AccessCredential, HealthProvider, ProviderProfile, ProviderTokens};
use super::http::{execute_json, shared_client};
use crate::config::ServiceAccountConfig;
use crate::errors::{ProviderError, SyncResult};
use crate::models::Provider;
use crate::rate_limiting::{BucketKey, EndpointClass, RateLimiter};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const API_BASE: &str = "https://www.googleapis.com/fitness/v1/users/me";
const SCOPES: &str = "https://www.googleapis.com/auth/fitness.activity.read \
                      https://www.googleapis.com/auth/fitness.sleep.read \
                      https://www.googleapis.com/auth/fitness.nutrition.read";

/// Google Fit session activity type for sleep.
const SLEEP_ACTIVITY_TYPE: i64 = 72;

/// Marker stored as the refresh token so the connection manager knows a new
/// assertion can always be minted.
const REFRESH_SENTINEL: &str = "service-account";

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'static str,
    aud: &'static str,
    iat: i64,
    exp: i64,
}

/// Google Fit adapter (service-account JWT bearer).
pub struct GoogleFitProvider {
    config: ServiceAccountConfig,
    limiter: Arc<RateLimiter>,
    client: Client,
}

impl GoogleFitProvider {
    /// Build the adapter from service-account credentials.
    #[must_use]
    pub fn new(config: ServiceAccountConfig, limiter: Arc<RateLimiter>) -> Self {
        Self {
            config,
            limiter,
            client: shared_client().clone(),
        }
    }

    fn account(&self) -> SyncResult<(&str, &str)> {
        match (&self.config.client_email, &self.config.private_key_pem) {
            (Some(email), Some(pem)) => Ok((email, pem)),
            _ => Err(ProviderError::Configuration {
                provider: Provider::GoogleFit,
                message: "GOOGLE_FIT_CLIENT_EMAIL / GOOGLE_FIT_PRIVATE_KEY not set".to_owned(),
            }
            .into()),
        }
    }

    fn mint_assertion(&self) -> SyncResult<String> {
        let (email, pem) = self.account()?;
        let now = Utc::now();
        let claims = AssertionClaims {
            iss: email,
            scope: SCOPES,
            aud: TOKEN_URL,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let key = EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
            ProviderError::Configuration {
                provider: Provider::GoogleFit,
                message: format!("GOOGLE_FIT_PRIVATE_KEY is not a valid RSA PEM: {e}"),
            }
        })?;
        encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(|e| {
            ProviderError::AuthenticationFailed {
                provider: Provider::GoogleFit,
                message: format!("failed to sign assertion: {e}"),
            }
            .into()
        })
    }

    async fn mint_access_token(&self) -> SyncResult<ProviderTokens> {
        let assertion = self.mint_assertion()?;
        let body = execute_json(
            &self.limiter,
            BucketKey::new(Provider::GoogleFit, EndpointClass::Auth),
            "token",
            self.client.post(TOKEN_URL).form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ]),
        )
        .await?;

        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::InvalidPayload {
                provider: Provider::GoogleFit,
                message: "token response missing access_token".to_owned(),
            })?
            .to_owned();
        let expires_in = body
            .get("expires_in")
            .and_then(Value::as_i64)
            .unwrap_or(3600);

        Ok(ProviderTokens {
            access_token,
            refresh_token: Some(REFRESH_SENTINEL.to_owned()),
            expires_at: Some(Utc::now() + Duration::seconds(expires_in)),
            scopes: SCOPES.split_whitespace().map(str::to_owned).collect(),
            token_secret: None,
        })
    }

    async fn sessions(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        operation: &'static str,
    ) -> SyncResult<Vec<Value>> {
        let body = execute_json(
            &self.limiter,
            BucketKey::new(Provider::GoogleFit, EndpointClass::Data),
            operation,
            self.client
                .get(format!("{API_BASE}/sessions"))
                .query(&[
                    ("startTime", start.to_rfc3339()),
                    ("endTime", end.to_rfc3339()),
                ])
                .bearer_auth(&credential.access_token),
        )
        .await?;

        match body.get("session") {
            Some(Value::Array(records)) => Ok(records.clone()),
            None => Ok(Vec::new()),
            Some(_) => Err(ProviderError::InvalidPayload {
                provider: Provider::GoogleFit,
                message: "sessions response field is not an array".to_owned(),
            }
            .into()),
        }
    }

    fn is_sleep_session(session: &Value) -> bool {
        session.get("activityType").and_then(Value::as_i64) == Some(SLEEP_ACTIVITY_TYPE)
    }
}

#[async_trait]
impl HealthProvider for GoogleFitProvider {
    fn provider(&self) -> Provider {
        Provider::GoogleFit
    }

    fn authorize_url(&self, _state: &str) -> SyncResult<String> {
        Err(ProviderError::UnsupportedFeature {
            provider: Provider::GoogleFit,
            feature: "user authorization URL (service-account credentials)",
        }
        .into())
    }

    /// Mints a fresh service-account token; the `code` argument is ignored.
    async fn exchange_code(&self, _code: &str) -> SyncResult<ProviderTokens> {
        self.mint_access_token().await
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> SyncResult<ProviderTokens> {
        self.mint_access_token().await
    }

    async fn get_user_profile(
        &self,
        _credential: &AccessCredential,
    ) -> SyncResult<ProviderProfile> {
        let (email, _) = self.account()?;
        Ok(ProviderProfile {
            provider_user_id: email.to_owned(),
            display_name: None,
        })
    }

    async fn get_activities(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        let sessions = self
            .sessions(credential, start, end, "get_activities")
            .await?;
        Ok(sessions
            .into_iter()
            .filter(|s| !Self::is_sleep_session(s))
            .collect())
    }

    async fn get_sleep_data(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        let sessions = self
            .sessions(credential, start, end, "get_sleep_data")
            .await?;
        Ok(sessions.into_iter().filter(Self::is_sleep_session).collect())
    }

    async fn get_nutrition_data(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        let body = execute_json(
            &self.limiter,
            BucketKey::new(Provider::GoogleFit, EndpointClass::Data),
            "get_nutrition_data",
            self.client
                .post(format!("{API_BASE}/dataset:aggregate"))
                .bearer_auth(&credential.access_token)
                .json(&json!({
                    "aggregateBy": [{"dataTypeName": "com.google.nutrition"}],
                    "bucketByTime": {"durationMillis": 86_400_000},
                    "startTimeMillis": start.timestamp_millis(),
                    "endTimeMillis": end.timestamp_millis(),
                })),
        )
        .await?;

        match body.get("bucket") {
            Some(Value::Array(records)) => Ok(records.clone()),
            None => Ok(Vec::new()),
            Some(_) => Err(ProviderError::InvalidPayload {
                provider: Provider::GoogleFit,
                message: "aggregate response bucket is not an array".to_owned(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn sleep_sessions_are_split_from_activities() {
        let sleep = json!({"id": "s1", "activityType": SLEEP_ACTIVITY_TYPE});
        let run = json!({"id": "a1", "activityType": 8});
        assert!(GoogleFitProvider::is_sleep_session(&sleep));
        assert!(!GoogleFitProvider::is_sleep_session(&run));
    }

    #[tokio::test]
    async fn unconfigured_account_reports_configuration_error() {
        let provider = GoogleFitProvider::new(
            ServiceAccountConfig::default(),
            Arc::new(RateLimiter::new()),
        );
        let err = provider.exchange_code("ignored").await.unwrap_err();
        assert!(err.to_string().contains("GOOGLE_FIT_CLIENT_EMAIL"));
    }
}

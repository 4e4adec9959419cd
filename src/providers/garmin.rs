// ABOUTME: Garmin wellness API adapter using OAuth 1.0a three-legged signing
// ABOUTME: HMAC-SHA1 request signatures built with ring; token secret rides in connection metadata
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Garmin adapter.
//!
//! Garmin's wellness API still speaks OAuth 1.0a: every request carries an
//! HMAC-SHA1 signature over the method, URL, and sorted parameters, keyed by
//! `consumer_secret&token_secret`.
//!
//! The uniform `exchange_code` contract is mapped onto the third OAuth leg:
//! the HTTP layer performs the request-token leg itself and passes
//! `"{oauth_token}:{request_token_secret}:{oauth_verifier}"` as the code.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::Client;
use ring::hmac;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::core::{AccessCredential, HealthProvider, ProviderProfile, ProviderTokens};
use super::http::{execute_json, shared_client};
use crate::config::OAuth1ClientConfig;
use crate::errors::{ProviderError, SyncResult};
use crate::models::Provider;
use crate::rate_limiting::{BucketKey, EndpointClass, RateLimiter};

const REQUEST_TOKEN_URL: &str = "https://connectapi.garmin.com/oauth-service/oauth/request_token";
const ACCESS_TOKEN_URL: &str = "https://connectapi.garmin.com/oauth-service/oauth/access_token";
const AUTHORIZE_URL: &str = "https://connect.garmin.com/oauthConfirm";
const API_BASE: &str = "https://apis.garmin.com/wellness-api/rest";

/// Garmin wellness API adapter (OAuth 1.0a).
pub struct GarminProvider {
    config: OAuth1ClientConfig,
    limiter: Arc<RateLimiter>,
    client: Client,
}

impl GarminProvider {
    /// Build the adapter from consumer credentials.
    #[must_use]
    pub fn new(config: OAuth1ClientConfig, limiter: Arc<RateLimiter>) -> Self {
        Self {
            config,
            limiter,
            client: shared_client().clone(),
        }
    }

    fn consumer(&self) -> SyncResult<(&str, &str)> {
        match (&self.config.consumer_key, &self.config.consumer_secret) {
            (Some(key), Some(secret)) => Ok((key, secret)),
            _ => Err(ProviderError::Configuration {
                provider: Provider::Garmin,
                message: "GARMIN_CONSUMER_KEY / GARMIN_CONSUMER_SECRET not set".to_owned(),
            }
            .into()),
        }
    }

    /// Build the `Authorization: OAuth ...` header for a signed request.
    fn oauth_header(
        &self,
        method: &str,
        url: &str,
        query: &[(String, String)],
        token: Option<&str>,
        token_secret: Option<&str>,
        extra: &[(String, String)],
    ) -> SyncResult<String> {
        let (consumer_key, consumer_secret) = self.consumer()?;

        let mut oauth_params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), consumer_key.to_owned()),
            ("oauth_nonce".into(), Uuid::new_v4().simple().to_string()),
            ("oauth_signature_method".into(), "HMAC-SHA1".into()),
            ("oauth_timestamp".into(), Utc::now().timestamp().to_string()),
            ("oauth_version".into(), "1.0".into()),
        ];
        if let Some(token) = token {
            oauth_params.push(("oauth_token".into(), token.to_owned()));
        }
        oauth_params.extend_from_slice(extra);

        // Signature base: method & url & sorted(query + oauth params)
        let mut all: Vec<(String, String)> = query.to_vec();
        all.extend(oauth_params.iter().cloned());
        all.sort();
        let param_string = all
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let base = format!(
            "{method}&{}&{}",
            urlencoding::encode(url),
            urlencoding::encode(&param_string)
        );

        let signing_key = format!(
            "{}&{}",
            urlencoding::encode(consumer_secret),
            urlencoding::encode(token_secret.unwrap_or(""))
        );
        let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, signing_key.as_bytes());
        let signature = BASE64_STANDARD.encode(hmac::sign(&key, base.as_bytes()).as_ref());

        oauth_params.push(("oauth_signature".into(), signature));
        oauth_params.sort();
        let header = oauth_params
            .iter()
            .map(|(k, v)| format!(r#"{}="{}""#, urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {header}"))
    }

    /// POST to an OAuth 1.0a token endpoint and parse the urlencoded body.
    async fn token_leg(
        &self,
        url: &str,
        token: Option<&str>,
        token_secret: Option<&str>,
        extra: &[(String, String)],
    ) -> SyncResult<Vec<(String, String)>> {
        let auth = self.oauth_header("POST", url, &[], token, token_secret, extra)?;
        let key = BucketKey::new(Provider::Garmin, EndpointClass::Auth);

        self.limiter.consume(key).await?;

        let response = self
            .client
            .post(url)
            .header("Authorization", auth)
            .send()
            .await
            .map_err(|e| {
                self.limiter.record_error(key);
                ProviderError::Network {
                    provider: Provider::Garmin,
                    operation: "token",
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            self.limiter.record_error(key);
            return Err(ProviderError::Api {
                provider: Provider::Garmin,
                operation: "token",
                status_code: status.as_u16(),
                message: body,
                retryable: status.is_server_error(),
            }
            .into());
        }

        Ok(parse_form_body(&body))
    }

    async fn signed_get(
        &self,
        credential: &AccessCredential,
        path: &str,
        query: &[(String, String)],
        operation: &'static str,
    ) -> SyncResult<Value> {
        let url = format!("{API_BASE}/{path}");
        let auth = self.oauth_header(
            "GET",
            &url,
            query,
            Some(&credential.access_token),
            credential.token_secret.as_deref(),
            &[],
        )?;
        execute_json(
            &self.limiter,
            BucketKey::new(Provider::Garmin, EndpointClass::Data),
            operation,
            self.client
                .get(url)
                .query(query)
                .header("Authorization", auth),
        )
        .await
    }

    fn window_query(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<(String, String)> {
        vec![
            (
                "uploadStartTimeInSeconds".into(),
                start.timestamp().to_string(),
            ),
            ("uploadEndTimeInSeconds".into(), end.timestamp().to_string()),
        ]
    }
}

fn parse_form_body(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((k.to_owned(), v.to_owned()))
        })
        .collect()
}

fn form_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[async_trait]
impl HealthProvider for GarminProvider {
    fn provider(&self) -> Provider {
        Provider::Garmin
    }

    fn authorize_url(&self, state: &str) -> SyncResult<String> {
        // The request-token leg happens out of band; callers substitute the
        // `{oauth_token}` placeholder with the token that leg returned.
        self.consumer()?;
        Ok(format!(
            "{AUTHORIZE_URL}?oauth_token={{oauth_token}}&state={}",
            urlencoding::encode(state)
        ))
    }

    /// `code` must be `"{oauth_token}:{request_token_secret}:{oauth_verifier}"`
    /// from the first two OAuth 1.0a legs.
    async fn exchange_code(&self, code: &str) -> SyncResult<ProviderTokens> {
        let mut parts = code.splitn(3, ':');
        let (Some(token), Some(secret), Some(verifier)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ProviderError::AuthenticationFailed {
                provider: Provider::Garmin,
                message: "code must be oauth_token:request_token_secret:oauth_verifier".to_owned(),
            }
            .into());
        };

        let pairs = self
            .token_leg(
                ACCESS_TOKEN_URL,
                Some(token),
                Some(secret),
                &[("oauth_verifier".into(), verifier.to_owned())],
            )
            .await?;

        let access = form_value(&pairs, "oauth_token").ok_or_else(|| {
            ProviderError::InvalidPayload {
                provider: Provider::Garmin,
                message: "access token response missing oauth_token".to_owned(),
            }
        })?;
        let token_secret = form_value(&pairs, "oauth_token_secret").ok_or_else(|| {
            ProviderError::InvalidPayload {
                provider: Provider::Garmin,
                message: "access token response missing oauth_token_secret".to_owned(),
            }
        })?;

        Ok(ProviderTokens {
            access_token: access.to_owned(),
            refresh_token: None,
            // OAuth 1.0a tokens are long-lived; no reported expiry.
            expires_at: None,
            scopes: BTreeSet::new(),
            token_secret: Some(token_secret.to_owned()),
        })
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> SyncResult<ProviderTokens> {
        Err(ProviderError::UnsupportedFeature {
            provider: Provider::Garmin,
            feature: "token refresh (OAuth 1.0a tokens do not expire)",
        }
        .into())
    }

    async fn get_user_profile(
        &self,
        credential: &AccessCredential,
    ) -> SyncResult<ProviderProfile> {
        let body = self
            .signed_get(credential, "user/id", &[], "get_user_profile")
            .await?;
        Ok(ProviderProfile {
            provider_user_id: body
                .get("userId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            display_name: None,
        })
    }

    async fn get_activities(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        let body = self
            .signed_get(
                credential,
                "activities",
                &Self::window_query(start, end),
                "get_activities",
            )
            .await?;
        match body {
            Value::Array(records) => Ok(records),
            _ => Err(ProviderError::InvalidPayload {
                provider: Provider::Garmin,
                message: "activities response is not an array".to_owned(),
            }
            .into()),
        }
    }

    async fn get_sleep_data(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        let body = self
            .signed_get(
                credential,
                "sleeps",
                &Self::window_query(start, end),
                "get_sleep_data",
            )
            .await?;
        match body {
            Value::Array(records) => Ok(records),
            _ => Err(ProviderError::InvalidPayload {
                provider: Provider::Garmin,
                message: "sleeps response is not an array".to_owned(),
            }
            .into()),
        }
    }

    async fn get_nutrition_data(
        &self,
        _credential: &AccessCredential,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        // The wellness API carries no nutrition endpoints.
        debug!("garmin exposes no nutrition data, returning empty batch");
        Ok(Vec::new())
    }
}

// ABOUTME: Core provider trait and shared request/response types
// ABOUTME: Uniform capability set every provider adapter implements
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter contract.
//!
//! Every external platform implements [`HealthProvider`]: the uniform
//! capability set of token exchange, refresh, profile and the three
//! date-windowed data fetches. Data fetches return raw provider-native
//! records (`serde_json::Value`); normalization happens in the mapper layer,
//! keeping adapters purely about transport and authentication.
//!
//! Callers must not assume partial success within a single adapter call:
//! an error means the whole call failed.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::SyncResult;
use crate::models::Provider;

/// Tokens returned by a successful exchange or refresh.
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    /// Bearer/access token (plaintext; encrypted by the connection manager
    /// before storage).
    pub access_token: String,
    /// Refresh token, for providers that issue one.
    pub refresh_token: Option<String>,
    /// Access token expiry, when reported.
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes.
    pub scopes: BTreeSet<String>,
    /// OAuth 1.0a token secret (Garmin); stored encrypted in connection
    /// metadata.
    pub token_secret: Option<String>,
}

/// Minimal normalized profile from `get_user_profile`.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    /// Provider-native user identifier.
    pub provider_user_id: String,
    /// Display name, when the provider exposes one.
    pub display_name: Option<String>,
}

/// Decrypted credential handed to adapter fetch operations.
///
/// OAuth 2.0 and JWT providers use only `access_token`; the OAuth 1.0a
/// provider additionally needs `token_secret` for request signing.
#[derive(Debug, Clone)]
pub struct AccessCredential {
    /// Plaintext access token.
    pub access_token: String,
    /// Plaintext OAuth 1.0a token secret, when applicable.
    pub token_secret: Option<String>,
}

impl AccessCredential {
    /// Bearer-only credential.
    #[must_use]
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_secret: None,
        }
    }
}

/// Uniform capability set implemented by every provider adapter.
///
/// Implementations must run `RateLimiter::consume` on their bucket before
/// every network request and `record_error` after any non-2xx or transport
/// failure.
#[async_trait]
pub trait HealthProvider: Send + Sync {
    /// Which provider this adapter talks to.
    fn provider(&self) -> Provider;

    /// Authorization URL for the user-facing OAuth flow.
    fn authorize_url(&self, state: &str) -> SyncResult<String>;

    /// Exchange an authorization code for tokens.
    ///
    /// Providers without a code flow document their interpretation of
    /// `code` on the implementation.
    async fn exchange_code(&self, code: &str) -> SyncResult<ProviderTokens>;

    /// Obtain fresh tokens from a refresh token.
    async fn refresh_access_token(&self, refresh_token: &str) -> SyncResult<ProviderTokens>;

    /// Fetch the provider-side user profile.
    async fn get_user_profile(&self, credential: &AccessCredential)
        -> SyncResult<ProviderProfile>;

    /// Fetch raw activity records in the window.
    async fn get_activities(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>>;

    /// Fetch raw sleep records in the window.
    async fn get_sleep_data(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>>;

    /// Fetch raw nutrition records in the window.
    async fn get_nutrition_data(
        &self,
        credential: &AccessCredential,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>>;
}

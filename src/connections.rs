// ABOUTME: Connection lifecycle manager: create/refresh/revoke with encrypted tokens
// ABOUTME: Plaintext credentials exist only inside this module's call frames
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection manager.
//!
//! Owns the `active ⇄ expired → revoked` state machine and the encryption
//! boundary: tokens are encrypted before they reach the store and decrypted
//! only for the duration of an adapter call. A refresh failure surfaces the
//! error but leaves the stored connection untouched; the orchestrator decides
//! whether that demotes the connection (it does, for refresh-after-expiry).

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::crypto::TokenCipher;
use crate::errors::{SyncError, SyncResult};
use crate::models::{Connection, ConnectionStatus, Provider};
use crate::providers::{AccessCredential, ProviderRegistry, ProviderTokens};
use crate::storage::{ConnectionStore, HealthRecordStore};

const METADATA_TOKEN_SECRET: &str = "token_secret";
const METADATA_PROVIDER_USER_ID: &str = "provider_user_id";

/// Status row returned by [`ConnectionManager::statuses`].
#[derive(Debug, Clone)]
pub struct ConnectionStatusView {
    /// Provider the row describes.
    pub provider: Provider,
    /// Lifecycle state.
    pub status: ConnectionStatus,
    /// Completion time of the last successful sync.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Access token expiry, when reported by the provider.
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// Manages stored provider connections and their credential lifecycle.
pub struct ConnectionManager {
    store: Arc<dyn ConnectionStore>,
    records: Arc<dyn HealthRecordStore>,
    registry: Arc<ProviderRegistry>,
    cipher: TokenCipher,
}

impl ConnectionManager {
    /// Build the manager over its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConnectionStore>,
        records: Arc<dyn HealthRecordStore>,
        registry: Arc<ProviderRegistry>,
        cipher: TokenCipher,
    ) -> Self {
        Self {
            store,
            records,
            registry,
            cipher,
        }
    }

    /// Exchange an authorization code and store the resulting connection.
    ///
    /// Reconnecting a provider the user already has updates the existing row
    /// in place; it never creates a duplicate.
    pub async fn create(
        &self,
        user_id: Uuid,
        provider: Provider,
        code: &str,
    ) -> SyncResult<Connection> {
        let adapter = self.registry.get(provider)?;
        let tokens = adapter.exchange_code(code).await?;

        let credential = AccessCredential {
            access_token: tokens.access_token.clone(),
            token_secret: tokens.token_secret.clone(),
        };
        let profile = adapter.get_user_profile(&credential).await?;

        let now = Utc::now();
        let existing = self
            .store
            .find_by_user_and_provider(user_id, provider)
            .await?;
        let is_reconnect = existing.is_some();

        let mut connection = match existing {
            Some(mut conn) => {
                conn.status = ConnectionStatus::Active;
                conn.updated_at = now;
                conn
            }
            None => Connection {
                id: Uuid::new_v4(),
                user_id,
                provider,
                access_token: String::new(),
                refresh_token: None,
                token_expires_at: None,
                last_synced_at: None,
                scopes: BTreeSet::new(),
                status: ConnectionStatus::Active,
                metadata: json!({}),
                created_at: now,
                updated_at: now,
            },
        };

        self.apply_tokens(&mut connection, &tokens)?;
        set_metadata(
            &mut connection.metadata,
            METADATA_PROVIDER_USER_ID,
            Value::String(profile.provider_user_id),
        );

        self.store.upsert(connection.clone()).await?;
        info!(
            provider = %provider,
            user_id = %user_id,
            reconnect = is_reconnect,
            "provider connection stored"
        );
        Ok(connection)
    }

    /// Refresh the access token for a connection.
    ///
    /// Fails with `InvalidState` when no refresh token is stored. On provider
    /// failure the stored connection is left exactly as it was.
    pub async fn refresh(&self, connection_id: Uuid) -> SyncResult<Connection> {
        let mut connection = self.require(connection_id).await?;
        let Some(encrypted_refresh) = connection.refresh_token.clone() else {
            return Err(SyncError::InvalidState(format!(
                "connection {connection_id} has no refresh token"
            )));
        };

        let refresh_token = self.cipher.decrypt(&encrypted_refresh)?;
        let adapter = self.registry.get(connection.provider)?;
        let tokens = adapter.refresh_access_token(&refresh_token).await?;

        self.apply_tokens(&mut connection, &tokens)?;
        connection.status = ConnectionStatus::Active;
        connection.updated_at = Utc::now();
        self.store.upsert(connection.clone()).await?;
        debug!(provider = %connection.provider, "access token refreshed");
        Ok(connection)
    }

    /// Mark a connection expired (refresh failed after token expiry).
    pub async fn mark_expired(&self, connection_id: Uuid) -> SyncResult<()> {
        let mut connection = self.require(connection_id).await?;
        connection.status = ConnectionStatus::Expired;
        connection.updated_at = Utc::now();
        warn!(provider = %connection.provider, "connection marked expired");
        self.store.upsert(connection).await
    }

    /// Mark a connection revoked on the provider side. Terminal.
    pub async fn revoke(&self, connection_id: Uuid) -> SyncResult<()> {
        let mut connection = self.require(connection_id).await?;
        connection.status = ConnectionStatus::Revoked;
        connection.updated_at = Utc::now();
        info!(provider = %connection.provider, "connection revoked");
        self.store.upsert(connection).await
    }

    /// Delete the user's connection to a provider and drop its synced records.
    pub async fn disconnect(&self, user_id: Uuid, provider: Provider) -> SyncResult<()> {
        let connection = self
            .store
            .find_by_user_and_provider(user_id, provider)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("no {provider} connection")))?;
        self.store.delete(connection.id).await?;
        let removed = self
            .records
            .delete_by_user_and_source(user_id, provider)
            .await?;
        info!(provider = %provider, removed, "disconnected provider and deleted records");
        Ok(())
    }

    /// Stamp the completion time of a successful sync pass.
    pub async fn update_last_synced(&self, connection_id: Uuid) -> SyncResult<()> {
        let mut connection = self.require(connection_id).await?;
        connection.last_synced_at = Some(Utc::now());
        connection.updated_at = Utc::now();
        self.store.upsert(connection).await
    }

    /// Status rows for every connection a user has, any state.
    pub async fn statuses(&self, user_id: Uuid) -> SyncResult<Vec<ConnectionStatusView>> {
        Ok(self
            .store
            .find_by_user(user_id)
            .await?
            .into_iter()
            .map(|c| ConnectionStatusView {
                provider: c.provider,
                status: c.status,
                last_synced_at: c.last_synced_at,
                token_expires_at: c.token_expires_at,
            })
            .collect())
    }

    /// Decrypt a connection's stored credentials for adapter use.
    pub fn access_credential(&self, connection: &Connection) -> SyncResult<AccessCredential> {
        let access_token = self.cipher.decrypt(&connection.access_token)?;
        let token_secret = match connection.metadata.get(METADATA_TOKEN_SECRET) {
            Some(Value::String(encrypted)) => Some(self.cipher.decrypt(encrypted)?),
            _ => None,
        };
        Ok(AccessCredential {
            access_token,
            token_secret,
        })
    }

    /// Fetch a connection, erroring when it does not exist.
    pub async fn require(&self, connection_id: Uuid) -> SyncResult<Connection> {
        self.store
            .get(connection_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("connection {connection_id}")))
    }

    /// The connection store, for orchestrator queries.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConnectionStore> {
        &self.store
    }

    /// Encrypt and write a token set onto a connection.
    fn apply_tokens(
        &self,
        connection: &mut Connection,
        tokens: &ProviderTokens,
    ) -> SyncResult<()> {
        connection.access_token = self.cipher.encrypt(&tokens.access_token)?;
        connection.refresh_token = match &tokens.refresh_token {
            Some(token) => Some(self.cipher.encrypt(token)?),
            None => None,
        };
        connection.token_expires_at = tokens.expires_at;
        if !tokens.scopes.is_empty() {
            connection.scopes = tokens.scopes.clone();
        }
        if let Some(secret) = &tokens.token_secret {
            let encrypted = self.cipher.encrypt(secret)?;
            set_metadata(
                &mut connection.metadata,
                METADATA_TOKEN_SECRET,
                Value::String(encrypted),
            );
        }
        Ok(())
    }
}

fn set_metadata(metadata: &mut Value, key: &str, value: Value) {
    if !metadata.is_object() {
        *metadata = json!({});
    }
    if let Some(map) = metadata.as_object_mut() {
        map.insert(key.to_owned(), value);
    }
}

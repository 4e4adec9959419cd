// ABOUTME: Environment-variable configuration for provider credentials and crypto
// ABOUTME: Generates a development encryption key with a warning when none is set
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment-only configuration.
//!
//! Every provider integration reads its client credentials from here; the
//! connection manager reads the encryption key. Nothing else in the engine
//! touches `std::env`.

use std::env;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use tracing::warn;

use crate::crypto::TokenCipher;

/// OAuth 2.0 client credentials for one provider.
#[derive(Debug, Clone, Default)]
pub struct OAuth2ClientConfig {
    /// OAuth client id.
    pub client_id: Option<String>,
    /// OAuth client secret.
    pub client_secret: Option<String>,
    /// Registered redirect URI.
    pub redirect_uri: Option<String>,
}

impl OAuth2ClientConfig {
    /// Whether both client credentials are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// OAuth 1.0a consumer credentials (Garmin).
#[derive(Debug, Clone, Default)]
pub struct OAuth1ClientConfig {
    /// Consumer key.
    pub consumer_key: Option<String>,
    /// Consumer secret, used for HMAC-SHA1 signing.
    pub consumer_secret: Option<String>,
}

impl OAuth1ClientConfig {
    /// Whether both consumer credentials are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.consumer_key.is_some() && self.consumer_secret.is_some()
    }
}

/// Service-account credentials for JWT-assertion providers (Google Fit).
#[derive(Debug, Clone, Default)]
pub struct ServiceAccountConfig {
    /// Service account email (JWT `iss` claim).
    pub client_email: Option<String>,
    /// PEM-encoded RSA private key for signing assertions.
    pub private_key_pem: Option<String>,
}

impl ServiceAccountConfig {
    /// Whether the account is fully configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.client_email.is_some() && self.private_key_pem.is_some()
    }
}

/// Per-provider credential blocks.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    /// Fitbit OAuth 2.0 app.
    pub fitbit: OAuth2ClientConfig,
    /// Strava OAuth 2.0 app.
    pub strava: OAuth2ClientConfig,
    /// Garmin OAuth 1.0a consumer.
    pub garmin: OAuth1ClientConfig,
    /// Google Fit service account.
    pub google_fit: ServiceAccountConfig,
}

/// Process-wide sync engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base64-encoded 32-byte AES-256 key for the token cipher.
    pub encryption_key: String,
    /// Provider credential blocks.
    pub providers: ProviderCredentials,
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// `HEALTHSYNC_ENCRYPTION_KEY` must be a base64-encoded 32-byte key. In
    /// development, when it is unset, a random key is generated and a warning
    /// logged; tokens encrypted with it do not survive a restart.
    pub fn from_env() -> Result<Self> {
        let encryption_key = match env::var("HEALTHSYNC_ENCRYPTION_KEY") {
            Ok(encoded) => {
                let bytes = BASE64_STANDARD
                    .decode(&encoded)
                    .map_err(|e| anyhow!("HEALTHSYNC_ENCRYPTION_KEY is not valid base64: {e}"))?;
                if bytes.len() != 32 {
                    return Err(anyhow!(
                        "HEALTHSYNC_ENCRYPTION_KEY must decode to 32 bytes, got {}",
                        bytes.len()
                    ));
                }
                encoded
            }
            Err(_) => {
                warn!(
                    "HEALTHSYNC_ENCRYPTION_KEY not set, generating a volatile development key; \
                     stored tokens will not survive a restart"
                );
                TokenCipher::generate_key()
            }
        };

        Ok(Self {
            encryption_key,
            providers: ProviderCredentials {
                fitbit: OAuth2ClientConfig {
                    client_id: env::var("FITBIT_CLIENT_ID").ok(),
                    client_secret: env::var("FITBIT_CLIENT_SECRET").ok(),
                    redirect_uri: env::var("FITBIT_REDIRECT_URI").ok(),
                },
                strava: OAuth2ClientConfig {
                    client_id: env::var("STRAVA_CLIENT_ID").ok(),
                    client_secret: env::var("STRAVA_CLIENT_SECRET").ok(),
                    redirect_uri: env::var("STRAVA_REDIRECT_URI").ok(),
                },
                garmin: OAuth1ClientConfig {
                    consumer_key: env::var("GARMIN_CONSUMER_KEY").ok(),
                    consumer_secret: env::var("GARMIN_CONSUMER_SECRET").ok(),
                },
                google_fit: ServiceAccountConfig {
                    client_email: env::var("GOOGLE_FIT_CLIENT_EMAIL").ok(),
                    private_key_pem: env::var("GOOGLE_FIT_PRIVATE_KEY").ok(),
                },
            },
        })
    }

    /// Build the token cipher from the configured key.
    pub fn token_cipher(&self) -> Result<TokenCipher> {
        TokenCipher::from_base64(&self.encryption_key)
            .map_err(|e| anyhow!("invalid encryption key: {e}"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_key_generates_a_volatile_one() {
        env::remove_var("HEALTHSYNC_ENCRYPTION_KEY");
        let config = SyncConfig::from_env().unwrap();
        assert!(config.token_cipher().is_ok());
    }

    #[test]
    #[serial]
    fn invalid_key_is_rejected() {
        env::set_var("HEALTHSYNC_ENCRYPTION_KEY", "not base64!!");
        assert!(SyncConfig::from_env().is_err());
        env::set_var(
            "HEALTHSYNC_ENCRYPTION_KEY",
            BASE64_STANDARD.encode([7u8; 16]),
        );
        assert!(SyncConfig::from_env().is_err());
        env::remove_var("HEALTHSYNC_ENCRYPTION_KEY");
    }

    #[test]
    #[serial]
    fn provider_credentials_load_from_env() {
        env::remove_var("HEALTHSYNC_ENCRYPTION_KEY");
        env::set_var("FITBIT_CLIENT_ID", "fb-id");
        env::set_var("FITBIT_CLIENT_SECRET", "fb-secret");
        let config = SyncConfig::from_env().unwrap();
        assert!(config.providers.fitbit.is_configured());
        assert!(!config.providers.garmin.is_configured());
        env::remove_var("FITBIT_CLIENT_ID");
        env::remove_var("FITBIT_CLIENT_SECRET");
    }
}

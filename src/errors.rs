// ABOUTME: Unified error taxonomy for the synchronization engine
// ABOUTME: Separates provider-side failures from connection and crypto failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the sync engine.
//!
//! Three layers: [`CryptoError`] for credential cipher failures,
//! [`ProviderError`] for anything that goes wrong talking to a remote
//! platform, and [`SyncError`] as the top-level taxonomy surfaced by the
//! connection manager and orchestrator.

use thiserror::Error;

use crate::models::Provider;

/// Result alias used throughout the engine.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures of the symmetric token cipher.
///
/// A decrypt failure means the stored credentials are unusable; callers must
/// force re-authorization instead of retrying.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The configured key is not a valid 32-byte AES-256 key.
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    /// Ciphertext is not valid base64 or is too short to contain a nonce.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// AEAD operation failed (wrong key, tampered or truncated data).
    #[error("decryption failed")]
    DecryptFailed,

    /// AEAD encryption failed.
    #[error("encryption failed")]
    EncryptFailed,
}

/// Errors raised by provider adapters.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Remote API returned a non-2xx status.
    #[error("{provider} {operation} failed with status {status_code}: {message}")]
    Api {
        /// Provider that produced the error.
        provider: Provider,
        /// Adapter operation that was in flight.
        operation: &'static str,
        /// HTTP status code from the remote API.
        status_code: u16,
        /// Response body or parsed provider error message.
        message: String,
        /// Whether retrying later is reasonable (5xx, timeouts).
        retryable: bool,
    },

    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("{provider} {operation} transport error: {message}")]
    Network {
        /// Provider that produced the error.
        provider: Provider,
        /// Adapter operation that was in flight.
        operation: &'static str,
        /// Underlying transport error description.
        message: String,
    },

    /// Token exchange or refresh was rejected by the provider.
    #[error("{provider} authentication failed: {message}")]
    AuthenticationFailed {
        /// Provider that rejected the credentials.
        provider: Provider,
        /// Provider-reported reason.
        message: String,
    },

    /// Response body could not be parsed into the expected shape.
    #[error("{provider} returned an unparseable payload: {message}")]
    InvalidPayload {
        /// Provider that produced the payload.
        provider: Provider,
        /// Parse error description.
        message: String,
    },

    /// Operation is not available on this provider.
    #[error("{provider} does not support {feature}")]
    UnsupportedFeature {
        /// Provider lacking the capability.
        provider: Provider,
        /// Capability that was requested.
        feature: &'static str,
    },

    /// Adapter is missing required client credentials or configuration.
    #[error("{provider} is not configured: {message}")]
    Configuration {
        /// Misconfigured provider.
        provider: Provider,
        /// What is missing or invalid.
        message: String,
    },
}

impl ProviderError {
    /// Provider this error belongs to.
    #[must_use]
    pub const fn provider(&self) -> Provider {
        match self {
            Self::Api { provider, .. }
            | Self::Network { provider, .. }
            | Self::AuthenticationFailed { provider, .. }
            | Self::InvalidPayload { provider, .. }
            | Self::UnsupportedFeature { provider, .. }
            | Self::Configuration { provider, .. } => *provider,
        }
    }

    /// Whether a later retry could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Api { retryable, .. } => *retryable,
            Self::Network { .. } => true,
            Self::AuthenticationFailed { .. }
            | Self::InvalidPayload { .. }
            | Self::UnsupportedFeature { .. }
            | Self::Configuration { .. } => false,
        }
    }
}

/// Top-level errors surfaced to callers of the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Token is expired or invalid and could not be refreshed; the user must
    /// re-authorize the provider.
    #[error("authorization expired for {provider}: {message}")]
    AuthExpired {
        /// Provider whose credentials are no longer usable.
        provider: Provider,
        /// Why the refresh path failed.
        message: String,
    },

    /// A provider adapter call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Rate-limiter wait loop hit its bounded ceiling.
    #[error("rate limit ceiling reached for {bucket}")]
    RateLimitExceeded {
        /// Bucket description (provider + endpoint class).
        bucket: String,
    },

    /// Connection exists but is not in a state that allows the operation.
    #[error("invalid connection state: {0}")]
    InvalidState(String),

    /// No matching connection (or other entity) exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stored credentials could not be decrypted.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

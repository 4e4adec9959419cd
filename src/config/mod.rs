// ABOUTME: Process-wide configuration module, environment-only
// ABOUTME: Provider credentials, encryption key, loaded once at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the sync engine. Loaded from environment variables once
//! at startup, read-only thereafter.

pub mod environment;

pub use environment::{
    OAuth1ClientConfig, OAuth2ClientConfig, ProviderCredentials, ServiceAccountConfig, SyncConfig,
};

// ABOUTME: Provider registry mapping Provider variants to adapter instances
// ABOUTME: Built once from configuration, shared across connection manager and orchestrator
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter registry.
//!
//! One adapter instance per syncable provider, built from [`SyncConfig`]
//! and sharing a single [`RateLimiter`]. `ManualEntry` has no adapter: its
//! records arrive through direct ingestion, never through a sync.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::SyncConfig;
use crate::errors::{SyncError, SyncResult};
use crate::models::Provider;
use crate::rate_limiting::RateLimiter;

use super::apple_health::AppleHealthProvider;
use super::core::HealthProvider;
use super::fitbit::FitbitProvider;
use super::garmin::GarminProvider;
use super::google_fit::GoogleFitProvider;
use super::samsung_health::SamsungHealthProvider;
use super::strava::StravaProvider;

/// Registry of provider adapters keyed by [`Provider`].
pub struct ProviderRegistry {
    adapters: HashMap<Provider, Arc<dyn HealthProvider>>,
    limiter: Arc<RateLimiter>,
}

impl ProviderRegistry {
    /// Build adapters for every syncable provider from configuration.
    #[must_use]
    pub fn new(config: &SyncConfig, limiter: Arc<RateLimiter>) -> Self {
        let mut adapters: HashMap<Provider, Arc<dyn HealthProvider>> = HashMap::new();
        adapters.insert(
            Provider::Fitbit,
            Arc::new(FitbitProvider::new(
                config.providers.fitbit.clone(),
                Arc::clone(&limiter),
            )),
        );
        adapters.insert(
            Provider::Strava,
            Arc::new(StravaProvider::new(
                config.providers.strava.clone(),
                Arc::clone(&limiter),
            )),
        );
        adapters.insert(
            Provider::Garmin,
            Arc::new(GarminProvider::new(
                config.providers.garmin.clone(),
                Arc::clone(&limiter),
            )),
        );
        adapters.insert(
            Provider::GoogleFit,
            Arc::new(GoogleFitProvider::new(
                config.providers.google_fit.clone(),
                Arc::clone(&limiter),
            )),
        );
        adapters.insert(
            Provider::AppleHealth,
            Arc::new(AppleHealthProvider::new(Arc::clone(&limiter))),
        );
        adapters.insert(
            Provider::SamsungHealth,
            Arc::new(SamsungHealthProvider::new(Arc::clone(&limiter))),
        );
        Self { adapters, limiter }
    }

    /// Registry with an explicit adapter set, for tests and embedding.
    #[must_use]
    pub fn with_adapters(
        adapters: HashMap<Provider, Arc<dyn HealthProvider>>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self { adapters, limiter }
    }

    /// Look up the adapter for a provider.
    ///
    /// # Errors
    /// `SyncError::InvalidState` when the provider is not syncable.
    pub fn get(&self, provider: Provider) -> SyncResult<Arc<dyn HealthProvider>> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or_else(|| SyncError::InvalidState(format!("provider {provider} has no sync adapter")))
    }

    /// The rate limiter shared by all adapters.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Providers with a registered adapter.
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        let mut list: Vec<Provider> = self.adapters.keys().copied().collect();
        list.sort_by_key(|p| p.as_str());
        list
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::config::ProviderCredentials;

    fn empty_config() -> SyncConfig {
        SyncConfig {
            encryption_key: crate::crypto::TokenCipher::generate_key(),
            providers: ProviderCredentials::default(),
        }
    }

    #[test]
    fn every_syncable_provider_has_an_adapter() {
        let registry = ProviderRegistry::new(&empty_config(), Arc::new(RateLimiter::new()));
        for provider in Provider::syncable() {
            assert!(registry.get(provider).is_ok(), "missing adapter: {provider}");
        }
    }

    #[test]
    fn manual_entry_has_no_adapter() {
        let registry = ProviderRegistry::new(&empty_config(), Arc::new(RateLimiter::new()));
        assert!(registry.get(Provider::ManualEntry).is_err());
    }
}

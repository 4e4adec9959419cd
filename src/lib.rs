// ABOUTME: Library entry point for the healthsync multi-provider sync engine
// ABOUTME: Connects wearable platforms, normalizes their data, stores canonical records
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! # healthsync
//!
//! A multi-provider health and fitness data synchronization engine. Users
//! connect third-party platforms (Fitbit, Strava, Garmin, Google Fit, and
//! device-local sources); the engine pulls activities, sleep, and nutrition
//! over a date window, normalizes them into canonical records, and stores
//! them with full-replace semantics per `(user, provider)` pair.
//!
//! ## Architecture
//!
//! - **Providers**: one adapter per platform behind the [`providers::HealthProvider`]
//!   trait, covering OAuth 2.0, OAuth 1.0a, and JWT-assertion authentication
//! - **Mappers**: pure normalization from raw payloads to canonical records
//! - **Rate limiting**: shared token buckets with error-driven backoff, consulted
//!   before every remote call
//! - **Connections**: credential lifecycle with AES-256-GCM token encryption
//! - **Sync**: the orchestrator; per-provider failure isolation in `sync_all`
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use healthsync::config::SyncConfig;
//! use healthsync::connections::ConnectionManager;
//! use healthsync::providers::ProviderRegistry;
//! use healthsync::rate_limiting::RateLimiter;
//! use healthsync::storage::{InMemoryConnectionStore, InMemoryHealthRecordStore};
//! use healthsync::sync::SyncOrchestrator;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SyncConfig::from_env()?;
//! let limiter = Arc::new(RateLimiter::new());
//! let registry = Arc::new(ProviderRegistry::new(&config, limiter));
//! let records = Arc::new(InMemoryHealthRecordStore::new());
//! let connections = Arc::new(ConnectionManager::new(
//!     Arc::new(InMemoryConnectionStore::new()),
//!     records.clone(),
//!     registry.clone(),
//!     config.token_cipher()?,
//! ));
//! let orchestrator = SyncOrchestrator::new(connections, registry, records);
//! let _results = orchestrator.sync_all(uuid::Uuid::new_v4(), None).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connections;
pub mod crypto;
pub mod errors;
pub mod logging;
pub mod mappers;
pub mod models;
pub mod providers;
pub mod rate_limiting;
pub mod storage;
pub mod sync;

pub use connections::ConnectionManager;
pub use errors::{CryptoError, ProviderError, SyncError, SyncResult};
pub use models::{Connection, ConnectionStatus, Provider};
pub use providers::{HealthProvider, ProviderRegistry};
pub use rate_limiting::RateLimiter;
pub use sync::{ProviderSyncOutcome, SyncCounts, SyncOrchestrator};

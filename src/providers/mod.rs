// ABOUTME: Provider adapter layer: trait, shared HTTP path, six platform adapters
// ABOUTME: Registry maps Provider variants to adapter instances
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapters.
//!
//! Each external platform gets one adapter implementing [`HealthProvider`].
//! Adapters own transport and authentication only; raw records flow to the
//! mapper layer for normalization. All remote calls pass through the shared
//! rate limiter first.

pub mod apple_health;
pub mod core;
pub mod fitbit;
pub mod garmin;
pub mod google_fit;
pub mod http;
pub mod registry;
pub mod samsung_health;
pub mod strava;

pub use core::{AccessCredential, HealthProvider, ProviderProfile, ProviderTokens};
pub use registry::ProviderRegistry;

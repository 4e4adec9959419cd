// ABOUTME: Token-bucket admission control with error-driven exponential backoff
// ABOUTME: One bucket per provider and endpoint class, shared by all concurrent syncs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-provider rate limiting.
//!
//! Every adapter call consumes from a bucket keyed by `(provider, endpoint
//! class)` before touching the network. Buckets refill continuously across
//! their window. Repeated remote errors add an exponential per-bucket backoff
//! delay (capped per provider) on top of the refill wait, so a failing
//! provider is probed progressively less often.
//!
//! The wait loop is bounded: after [`MAX_WAIT_ATTEMPTS`] sleeps the caller
//! gets [`SyncError::RateLimitExceeded`] instead of suspending indefinitely.
//!
//! Buckets live in a `DashMap`; the read-modify-write of token and error
//! counters happens under the entry lock, never across an await point.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{SyncError, SyncResult};
use crate::models::Provider;

/// Bounded number of refill waits before `consume` gives up.
pub const MAX_WAIT_ATTEMPTS: u32 = 8;

/// Endpoint class a bucket covers. Token endpoints and data endpoints are
/// limited separately on most platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    /// Token exchange, refresh, revoke.
    Auth,
    /// Profile and data fetches.
    Data,
}

impl EndpointClass {
    /// Stable identifier for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Data => "data",
        }
    }
}

/// Key identifying one logical bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// Provider the bucket belongs to.
    pub provider: Provider,
    /// Endpoint class the bucket covers.
    pub class: EndpointClass,
}

impl BucketKey {
    /// Build a key.
    #[must_use]
    pub const fn new(provider: Provider, class: EndpointClass) -> Self {
        Self { provider, class }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.class.as_str())
    }
}

/// Per-provider admission and backoff tuning.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    /// Bucket capacity (requests per window).
    pub capacity: f64,
    /// Refill window.
    pub window: Duration,
    /// Consecutive-error count at which backoff engages.
    pub error_threshold: u32,
    /// First backoff delay once the threshold is crossed.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl RateLimitPolicy {
    /// Conservative fallback applied to providers without an explicit policy.
    #[must_use]
    pub const fn conservative_default() -> Self {
        Self {
            capacity: 100.0,
            window: Duration::from_secs(60),
            error_threshold: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(120),
        }
    }

    /// Published or observed limits for each supported provider.
    #[must_use]
    pub fn for_provider(provider: Provider) -> Option<Self> {
        match provider {
            // Fitbit: 150 requests per hour per user
            Provider::Fitbit => Some(Self {
                capacity: 150.0,
                window: Duration::from_secs(3600),
                error_threshold: 3,
                initial_backoff: Duration::from_secs(5),
                max_backoff: Duration::from_secs(300),
            }),
            // Strava: 100 requests per 15 minutes
            Provider::Strava => Some(Self {
                capacity: 100.0,
                window: Duration::from_secs(900),
                error_threshold: 3,
                initial_backoff: Duration::from_secs(5),
                max_backoff: Duration::from_secs(300),
            }),
            // Garmin wellness API: evaluation tier
            Provider::Garmin => Some(Self {
                capacity: 100.0,
                window: Duration::from_secs(60),
                error_threshold: 5,
                initial_backoff: Duration::from_secs(2),
                max_backoff: Duration::from_secs(120),
            }),
            // Google Fit: 600 read requests per minute per user
            Provider::GoogleFit => Some(Self {
                capacity: 600.0,
                window: Duration::from_secs(60),
                error_threshold: 5,
                initial_backoff: Duration::from_secs(1),
                max_backoff: Duration::from_secs(60),
            }),
            // Stub providers never hit the network; generous local limit
            Provider::AppleHealth | Provider::SamsungHealth => Some(Self {
                capacity: 1000.0,
                window: Duration::from_secs(60),
                error_threshold: 10,
                initial_backoff: Duration::from_millis(500),
                max_backoff: Duration::from_secs(30),
            }),
            Provider::ManualEntry => None,
        }
    }
}

/// Time source, injectable so tests can drive paused tokio time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Default clock backed by `tokio::time::Instant`, which respects paused
/// runtimes in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    error_count: u32,
    backoff: Duration,
}

/// Shared token-bucket rate limiter.
///
/// Cheap to clone behind an `Arc`; adapters and the orchestrator hold the
/// same instance so two users syncing the same provider share its buckets.
pub struct RateLimiter {
    buckets: DashMap<BucketKey, Bucket>,
    policies: HashMap<Provider, RateLimitPolicy>,
    default_policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Build a limiter with the built-in per-provider policies.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(TokioClock))
    }

    /// Build a limiter with an injected clock (for tests).
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let policies = Provider::syncable()
            .into_iter()
            .filter_map(|p| RateLimitPolicy::for_provider(p).map(|policy| (p, policy)))
            .collect();
        Self {
            buckets: DashMap::new(),
            policies,
            default_policy: RateLimitPolicy::conservative_default(),
            clock,
        }
    }

    /// Override the policy for one provider (both endpoint classes).
    pub fn set_policy(&mut self, provider: Provider, policy: RateLimitPolicy) {
        self.policies.insert(provider, policy);
    }

    fn policy_for(&self, provider: Provider) -> &RateLimitPolicy {
        self.policies.get(&provider).unwrap_or_else(|| {
            warn!(
                provider = %provider,
                "no rate limit policy configured, falling back to 100 req / 60 s"
            );
            &self.default_policy
        })
    }

    /// Admit one request against the bucket, waiting for refill (and any
    /// accumulated backoff) when the bucket is empty.
    pub async fn consume(&self, key: BucketKey) -> SyncResult<()> {
        self.consume_cost(key, 1.0).await
    }

    /// Admit a request with an explicit cost.
    pub async fn consume_cost(&self, key: BucketKey, cost: f64) -> SyncResult<()> {
        for attempt in 0..=MAX_WAIT_ATTEMPTS {
            let wait = match self.try_take(key, cost) {
                None => return Ok(()),
                Some(wait) => wait,
            };

            if attempt == MAX_WAIT_ATTEMPTS {
                break;
            }

            debug!(
                bucket = %key,
                wait_ms = wait.as_millis() as u64,
                attempt,
                "rate limited, waiting for refill"
            );
            tokio::time::sleep(wait).await;
        }

        Err(SyncError::RateLimitExceeded {
            bucket: key.to_string(),
        })
    }

    /// Take `cost` tokens if available, otherwise return how long to wait.
    /// The whole read-modify-write runs under the bucket's entry lock.
    fn try_take(&self, key: BucketKey, cost: f64) -> Option<Duration> {
        let policy = self.policy_for(key.provider).clone();
        let now = self.clock.now();

        let mut bucket = self.buckets.entry(key).or_insert_with(|| Bucket {
            tokens: policy.capacity,
            last_refill: now,
            error_count: 0,
            backoff: Duration::ZERO,
        });

        // Continuous refill: elapsed/window of the capacity, clamped.
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refill = elapsed.as_secs_f64() / policy.window.as_secs_f64() * policy.capacity;
        bucket.tokens = (bucket.tokens + refill).min(policy.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            return None;
        }

        let deficit = cost - bucket.tokens;
        let per_token = policy.window.as_secs_f64() / policy.capacity;
        let wait_ms = (per_token * deficit * 1000.0).ceil() as u64;
        Some(Duration::from_millis(wait_ms) + bucket.backoff)
    }

    /// Record a remote error against the bucket. Once the policy threshold
    /// is reached the backoff delay is set, then doubled per further error,
    /// capped at the policy ceiling.
    pub fn record_error(&self, key: BucketKey) {
        let policy = self.policy_for(key.provider).clone();
        let now = self.clock.now();

        let mut bucket = self.buckets.entry(key).or_insert_with(|| Bucket {
            tokens: policy.capacity,
            last_refill: now,
            error_count: 0,
            backoff: Duration::ZERO,
        });

        bucket.error_count += 1;
        if bucket.error_count >= policy.error_threshold {
            bucket.backoff = if bucket.backoff.is_zero() {
                policy.initial_backoff
            } else {
                (bucket.backoff * 2).min(policy.max_backoff)
            };
            warn!(
                bucket = %key,
                errors = bucket.error_count,
                backoff_ms = bucket.backoff.as_millis() as u64,
                "error threshold reached, backoff engaged"
            );
        }
    }

    /// Clear the error counter and backoff delay for one bucket.
    pub fn reset_errors(&self, key: BucketKey) {
        if let Some(mut bucket) = self.buckets.get_mut(&key) {
            bucket.error_count = 0;
            bucket.backoff = Duration::ZERO;
        }
    }

    /// Clear error state on both of a provider's buckets; called after a
    /// fully successful sync pass.
    pub fn reset_provider(&self, provider: Provider) {
        self.reset_errors(BucketKey::new(provider, EndpointClass::Auth));
        self.reset_errors(BucketKey::new(provider, EndpointClass::Data));
    }

    /// Current backoff delay for a bucket (zero if untouched).
    #[must_use]
    pub fn current_backoff(&self, key: BucketKey) -> Duration {
        self.buckets
            .get(&key)
            .map_or(Duration::ZERO, |b| b.backoff)
    }

    /// Current error count for a bucket (zero if untouched).
    #[must_use]
    pub fn error_count(&self, key: BucketKey) -> u32 {
        self.buckets.get(&key).map_or(0, |b| b.error_count)
    }
}

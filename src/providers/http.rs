// ABOUTME: Shared HTTP plumbing for provider adapters
// ABOUTME: Pooled client plus the consume-then-record request wrapper
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP helpers shared by the provider adapters.
//!
//! [`execute_json`] is the single path through which adapter requests reach
//! the network: it runs rate-limiter admission first, records remote errors
//! against the bucket, and maps failures into [`ProviderError`].

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use crate::errors::{ProviderError, SyncResult};
use crate::rate_limiting::{BucketKey, RateLimiter};

static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

/// Pooled HTTP client shared by all adapters.
pub fn shared_client() -> &'static Client {
    SHARED_CLIENT.get_or_init(|| {
        ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}

/// Send a request through the rate limiter and parse the JSON response.
///
/// Non-2xx statuses and transport errors call `record_error` on the bucket
/// before being returned as [`ProviderError`].
pub async fn execute_json(
    limiter: &RateLimiter,
    key: BucketKey,
    operation: &'static str,
    request: RequestBuilder,
) -> SyncResult<Value> {
    limiter.consume(key).await?;

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            limiter.record_error(key);
            return Err(ProviderError::Network {
                provider: key.provider,
                operation,
                message: e.to_string(),
            }
            .into());
        }
    };

    let status = response.status();
    if !status.is_success() {
        limiter.record_error(key);
        let body = response.text().await.unwrap_or_default();
        debug!(
            provider = %key.provider,
            operation,
            status = status.as_u16(),
            "provider request failed"
        );
        return Err(ProviderError::Api {
            provider: key.provider,
            operation,
            status_code: status.as_u16(),
            message: truncate(&body, 512),
            retryable: status.is_server_error() || status.as_u16() == 429,
        }
        .into());
    }

    response.json().await.map_err(|e| {
        ProviderError::InvalidPayload {
            provider: key.provider,
            message: format!("{operation}: {e}"),
        }
        .into()
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_owned()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 512), "short");
        let long = "é".repeat(300);
        let cut = truncate(&long, 512);
        assert!(cut.len() <= 515);
        assert!(cut.ends_with('…'));
    }
}

// ABOUTME: Shared test harness: scripted provider adapters and engine assembly
// ABOUTME: Builds a full engine over in-memory stores with mock adapters

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use healthsync::connections::ConnectionManager;
use healthsync::crypto::TokenCipher;
use healthsync::errors::{ProviderError, SyncResult};
use healthsync::models::Provider;
use healthsync::providers::{
    AccessCredential, HealthProvider, ProviderProfile, ProviderRegistry, ProviderTokens,
};
use healthsync::rate_limiting::RateLimiter;
use healthsync::storage::{InMemoryConnectionStore, InMemoryHealthRecordStore};
use healthsync::sync::SyncOrchestrator;

/// Scripted adapter returning fixed raw batches, with call counters.
pub struct MockProvider {
    pub provider: Provider,
    pub activity_batch: Vec<Value>,
    pub sleep_batch: Vec<Value>,
    pub nutrition_batch: Vec<Value>,
    /// When set, every fetch fails with a network error of this message.
    pub fail_fetches_with: Option<String>,
    /// When true, refresh_access_token fails.
    pub fail_refresh: bool,
    /// When true, issued tokens carry an expiry in the past.
    pub issue_expired_tokens: bool,
    pub refresh_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            activity_batch: Vec::new(),
            sleep_batch: Vec::new(),
            nutrition_batch: Vec::new(),
            fail_fetches_with: None,
            fail_refresh: false,
            issue_expired_tokens: false,
            refresh_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    fn tokens(&self) -> ProviderTokens {
        let expires_at = if self.issue_expired_tokens {
            Some(Utc::now() - Duration::hours(1))
        } else {
            Some(Utc::now() + Duration::hours(8))
        };
        ProviderTokens {
            access_token: format!("access-{}", self.provider),
            refresh_token: Some(format!("refresh-{}", self.provider)),
            expires_at,
            scopes: BTreeSet::from(["activity".to_owned()]),
            token_secret: None,
        }
    }

    fn fetch(&self, batch: &[Value], operation: &'static str) -> SyncResult<Vec<Value>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_fetches_with {
            return Err(ProviderError::Network {
                provider: self.provider,
                operation,
                message: message.clone(),
            }
            .into());
        }
        Ok(batch.to_vec())
    }
}

#[async_trait]
impl HealthProvider for MockProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn authorize_url(&self, state: &str) -> SyncResult<String> {
        Ok(format!("https://example.test/authorize?state={state}"))
    }

    async fn exchange_code(&self, _code: &str) -> SyncResult<ProviderTokens> {
        Ok(self.tokens())
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> SyncResult<ProviderTokens> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh {
            return Err(ProviderError::AuthenticationFailed {
                provider: self.provider,
                message: "refresh token rejected".to_owned(),
            }
            .into());
        }
        let mut tokens = self.tokens();
        tokens.expires_at = Some(Utc::now() + Duration::hours(8));
        Ok(tokens)
    }

    async fn get_user_profile(
        &self,
        _credential: &AccessCredential,
    ) -> SyncResult<ProviderProfile> {
        Ok(ProviderProfile {
            provider_user_id: format!("user-{}", self.provider),
            display_name: None,
        })
    }

    async fn get_activities(
        &self,
        _credential: &AccessCredential,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        self.fetch(&self.activity_batch, "get_activities")
    }

    async fn get_sleep_data(
        &self,
        _credential: &AccessCredential,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        self.fetch(&self.sleep_batch, "get_sleep_data")
    }

    async fn get_nutrition_data(
        &self,
        _credential: &AccessCredential,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> SyncResult<Vec<Value>> {
        self.fetch(&self.nutrition_batch, "get_nutrition_data")
    }
}

/// Assembled engine over in-memory stores and scripted adapters.
pub struct TestEngine {
    pub connections: Arc<ConnectionManager>,
    pub orchestrator: SyncOrchestrator,
    pub connection_store: Arc<InMemoryConnectionStore>,
    pub record_store: Arc<InMemoryHealthRecordStore>,
    pub cipher: TokenCipher,
}

/// Build an engine whose registry holds exactly the given scripted adapters.
pub fn engine_with(adapters: Vec<Arc<MockProvider>>) -> TestEngine {
    let limiter = Arc::new(RateLimiter::new());
    let mut map: HashMap<Provider, Arc<dyn HealthProvider>> = HashMap::new();
    for adapter in adapters {
        map.insert(adapter.provider, adapter);
    }
    let registry = Arc::new(ProviderRegistry::with_adapters(map, limiter));

    let connection_store = Arc::new(InMemoryConnectionStore::new());
    let record_store = Arc::new(InMemoryHealthRecordStore::new());
    let cipher = TokenCipher::from_base64(&TokenCipher::generate_key()).unwrap();
    let connections = Arc::new(ConnectionManager::new(
        connection_store.clone(),
        record_store.clone(),
        registry.clone(),
        cipher.clone(),
    ));
    let orchestrator = SyncOrchestrator::new(
        connections.clone(),
        registry,
        record_store.clone(),
    );
    TestEngine {
        connections,
        orchestrator,
        connection_store,
        record_store,
        cipher,
    }
}

/// A Fitbit activity-list record the Fitbit mapper accepts.
pub fn fitbit_activity(log_id: u64) -> Value {
    json!({
        "logId": log_id,
        "activityName": "Run",
        "startTime": "2024-05-01T07:30:00.000Z",
        "duration": 1_800_000,
        "distance": 5.0,
        "calories": 400,
        "steps": 6_000
    })
}

/// A Fitbit sleep-log record the Fitbit mapper accepts.
pub fn fitbit_sleep(log_id: u64) -> Value {
    json!({
        "logId": log_id,
        "startTime": "2024-05-01T23:00:00.000",
        "endTime": "2024-05-02T06:30:00.000",
        "duration": 27_000_000,
        "efficiency": 90,
        "levels": {"data": [
            {"dateTime": "2024-05-01T23:00:00.000", "level": "light", "seconds": 5_400},
            {"dateTime": "2024-05-02T00:30:00.000", "level": "deep", "seconds": 3_600}
        ]}
    })
}

/// A Fitbit food-log record the Fitbit mapper accepts.
pub fn fitbit_food(log_id: u64) -> Value {
    json!({
        "logId": log_id,
        "logDate": "2024-05-01",
        "loggedFood": {
            "name": "Oatmeal",
            "amount": 1.0,
            "unit": {"name": "bowl"},
            "calories": 310,
            "mealTypeId": 1
        },
        "nutritionalValues": {"calories": 310, "protein": 11.0, "carbs": 54.0, "fat": 6.0}
    })
}

/// A Garmin activity summary the Garmin mapper accepts.
pub fn garmin_activity(id: &str) -> Value {
    json!({
        "summaryId": id,
        "activityType": "RUNNING",
        "startTimeInSeconds": 1_714_550_400,
        "durationInSeconds": 2_400,
        "distanceInMeters": 8_000.0,
        "activeKilocalories": 500.0
    })
}

pub fn user() -> Uuid {
    Uuid::new_v4()
}

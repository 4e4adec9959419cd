// ABOUTME: Canonical data model shared by every provider integration
// ABOUTME: Connections, activity/sleep/nutrition records, and derived health data points
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical domain models.
//!
//! Everything a provider returns is normalized into the record types here
//! before it reaches storage. Records are immutable once written: a resync
//! fully replaces every record tagged with the same `source_provider`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External platforms the engine can synchronize with.
///
/// `ManualEntry` is a record source only: user-entered data carries it as
/// `source_provider`, but no adapter or connection exists for it.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Fitbit Web API (OAuth 2.0 bearer).
    Fitbit,
    /// Strava API v3 (OAuth 2.0 bearer).
    Strava,
    /// Garmin wellness API (OAuth 1.0a three-legged).
    Garmin,
    /// Google Fit REST API (service-account JWT-assertion grant).
    GoogleFit,
    /// Apple Health. No public cloud API; served by a deterministic stub.
    AppleHealth,
    /// Samsung Health. No public cloud API; served by a deterministic stub.
    SamsungHealth,
    /// User-entered data. Never has a connection or adapter.
    ManualEntry,
}

impl Provider {
    /// Stable lowercase identifier used in storage and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fitbit => "fitbit",
            Self::Strava => "strava",
            Self::Garmin => "garmin",
            Self::GoogleFit => "google_fit",
            Self::AppleHealth => "apple_health",
            Self::SamsungHealth => "samsung_health",
            Self::ManualEntry => "manual_entry",
        }
    }

    /// The providers a user can connect and sync (everything except
    /// `ManualEntry`).
    #[must_use]
    pub const fn syncable() -> [Self; 6] {
        [
            Self::Fitbit,
            Self::Strava,
            Self::Garmin,
            Self::GoogleFit,
            Self::AppleHealth,
            Self::SamsungHealth,
        ]
    }

    /// Whether connections can exist for this provider.
    #[must_use]
    pub const fn is_syncable(self) -> bool {
        !matches!(self, Self::ManualEntry)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fitbit" => Ok(Self::Fitbit),
            "strava" => Ok(Self::Strava),
            "garmin" => Ok(Self::Garmin),
            "google_fit" | "googlefit" => Ok(Self::GoogleFit),
            "apple_health" | "applehealth" => Ok(Self::AppleHealth),
            "samsung_health" | "samsunghealth" => Ok(Self::SamsungHealth),
            "manual_entry" | "manual" => Ok(Self::ManualEntry),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Lifecycle state of a stored provider connection.
///
/// Transitions: `Active` → `Expired` (refresh failed after token expiry),
/// `Expired` → `Active` (successful refresh), `Active`/`Expired` → `Revoked`
/// (user action, terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Credentials are usable (possibly pending a routine refresh).
    Active,
    /// Token refresh failed; user must re-authorize.
    Expired,
    /// Access was revoked on the provider side. Terminal.
    Revoked,
}

/// Stored credential/authorization relationship between one user and one
/// provider. At most one exists per `(user_id, provider)` pair.
///
/// Token fields hold ciphertext produced by the token cipher; only the
/// connection manager sees plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection id.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Connected provider.
    pub provider: Provider,
    /// Encrypted OAuth access token.
    pub access_token: String,
    /// Encrypted refresh token, when the provider issues one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires, if the provider reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Completion time of the last successful sync pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Granted OAuth scopes.
    pub scopes: BTreeSet<String>,
    /// Lifecycle state.
    pub status: ConnectionStatus,
    /// Provider-specific extras (provider user id, OAuth 1.0a token secret).
    pub metadata: serde_json::Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    /// Whether the connection can be used for syncing.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, ConnectionStatus::Active)
    }

    /// Whether the access token has passed its reported expiry.
    #[must_use]
    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.is_some_and(|at| at <= now)
    }
}

/// Fields shared by every canonical health record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecordBase {
    /// Owning user.
    pub user_id: Uuid,
    /// Primary scalar value of the record (meaning depends on the kind).
    pub value: f64,
    /// Unit of `value`.
    pub unit: String,
    /// When the measured period started.
    pub start_time: DateTime<Utc>,
    /// When the measured period ended, for interval records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Provider the record was fetched from (or `manual_entry`).
    pub source_provider: Provider,
    /// Device identifier reported by the provider, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_device_id: Option<String>,
    /// Free-form extras; always carries `original_id` for traceability.
    pub metadata: serde_json::Value,
}

/// A normalized workout or activity session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Shared record fields. `value`/`unit` carry the duration in seconds.
    #[serde(flatten)]
    pub base: HealthRecordBase,
    /// Normalized activity type (e.g. "running", "cycling").
    pub activity_type: String,
    /// Total duration in seconds.
    pub duration_seconds: u32,
    /// Distance in kilometers, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    /// Active energy burned in kilocalories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<f64>,
    /// Step count, for step-based activities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    /// Average heart rate in BPM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate_avg: Option<u32>,
    /// Maximum heart rate in BPM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate_max: Option<u32>,
}

/// Canonical sleep stage vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepStageKind {
    /// Awake during the session.
    Awake,
    /// Light sleep.
    Light,
    /// Deep (slow-wave) sleep.
    Deep,
    /// REM sleep.
    Rem,
    /// Stage reported by the provider but not classifiable.
    Unknown,
}

impl SleepStageKind {
    /// Map a provider stage label onto the canonical vocabulary.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "awake" | "wake" | "restless" => Self::Awake,
            "light" | "core" | "asleep" => Self::Light,
            "deep" | "sws" => Self::Deep,
            "rem" => Self::Rem,
            _ => Self::Unknown,
        }
    }
}

/// One contiguous stage segment within a sleep session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepStage {
    /// Canonical stage tag.
    pub stage: SleepStageKind,
    /// Segment start.
    pub start_time: DateTime<Utc>,
    /// Segment end.
    pub end_time: DateTime<Utc>,
    /// Segment duration in seconds.
    pub duration_seconds: u32,
}

/// A normalized sleep session with its ordered stage sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepSessionRecord {
    /// Shared record fields. `value`/`unit` carry the duration in hours.
    #[serde(flatten)]
    pub base: HealthRecordBase,
    /// Total sleep duration in seconds.
    pub duration_seconds: u32,
    /// Ordered stage segments.
    pub stages: Vec<SleepStage>,
    /// Provider sleep quality/efficiency score (0-100).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f32>,
}

impl SleepSessionRecord {
    /// Seconds spent in each stage across the session.
    #[must_use]
    pub fn stage_summary(&self) -> HashMap<SleepStageKind, u32> {
        let mut summary = HashMap::new();
        for stage in &self.stages {
            *summary.entry(stage.stage).or_insert(0) += stage.duration_seconds;
        }
        summary
    }
}

/// Meal classification for nutrition entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    /// Breakfast.
    Breakfast,
    /// Lunch.
    Lunch,
    /// Dinner.
    Dinner,
    /// Snack.
    Snack,
    /// Unclassified meal.
    Other,
}

impl MealType {
    /// Lossy parse from a provider meal label.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "breakfast" | "morning meal" => Self::Breakfast,
            "lunch" => Self::Lunch,
            "dinner" | "supper" => Self::Dinner,
            "snack" | "morning snack" | "afternoon snack" | "evening snack" => Self::Snack,
            _ => Self::Other,
        }
    }
}

/// Macronutrient breakdown in grams.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Macronutrients {
    /// Protein in grams.
    pub protein_g: f64,
    /// Carbohydrates in grams.
    pub carbs_g: f64,
    /// Fat in grams.
    pub fat_g: f64,
    /// Fiber in grams.
    pub fiber_g: f64,
}

impl Macronutrients {
    /// Component-wise sum.
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        Self {
            protein_g: self.protein_g + other.protein_g,
            carbs_g: self.carbs_g + other.carbs_g,
            fat_g: self.fat_g + other.fat_g,
            fiber_g: self.fiber_g + other.fiber_g,
        }
    }
}

/// A single food item within a nutrition entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodItem {
    /// Food name.
    pub name: String,
    /// Quantity consumed.
    pub quantity: f64,
    /// Unit of `quantity` (g, ml, serving).
    pub unit: String,
    /// Energy in kilocalories.
    pub calories: f64,
    /// Macronutrient breakdown.
    pub macros: Macronutrients,
}

/// Aggregated totals across a nutrition entry's items.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NutritionTotals {
    /// Total energy in kilocalories.
    pub calories: f64,
    /// Total macronutrients.
    pub macros: Macronutrients,
}

/// A normalized nutrition log entry (one meal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionEntryRecord {
    /// Shared record fields. `value`/`unit` carry total kilocalories.
    #[serde(flatten)]
    pub base: HealthRecordBase,
    /// Meal classification.
    pub meal_type: MealType,
    /// Ordered food items.
    pub items: Vec<FoodItem>,
    /// Totals aggregated across `items`.
    pub totals: NutritionTotals,
}

impl NutritionEntryRecord {
    /// Recompute `totals` from the item list.
    #[must_use]
    pub fn aggregate_items(items: &[FoodItem]) -> NutritionTotals {
        items.iter().fold(NutritionTotals::default(), |acc, item| {
            NutritionTotals {
                calories: acc.calories + item.calories,
                macros: acc.macros.add(item.macros),
            }
        })
    }
}

/// A flattened, type-tagged scalar observation derived from the canonical
/// records, used by cross-metric trend and aggregation queries.
///
/// Generated one-to-many per source record; absent or zero source fields
/// never produce a point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDataPoint {
    /// Owning user.
    pub user_id: Uuid,
    /// Coarse category ("activity", "sleep", "nutrition").
    pub data_type: String,
    /// Specific metric ("steps", "duration_hours", "calories").
    pub data_subtype: String,
    /// Observed value.
    pub value: f64,
    /// Unit of `value`.
    pub unit: String,
    /// Observation start.
    pub start_time: DateTime<Utc>,
    /// Observation end, for interval observations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Provider the source record came from.
    pub source_provider: Provider,
    /// Carries the source record's `original_id`.
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn provider_round_trips_through_str() {
        for provider in Provider::syncable() {
            assert_eq!(provider.as_str().parse::<Provider>(), Ok(provider));
        }
        assert_eq!("manual_entry".parse::<Provider>(), Ok(Provider::ManualEntry));
        assert!("polar".parse::<Provider>().is_err());
    }

    #[test]
    fn manual_entry_is_not_syncable() {
        assert!(!Provider::ManualEntry.is_syncable());
        assert!(Provider::syncable().iter().all(|p| p.is_syncable()));
    }

    #[test]
    fn sleep_stage_labels_normalize() {
        assert_eq!(SleepStageKind::from_label("WAKE"), SleepStageKind::Awake);
        assert_eq!(SleepStageKind::from_label("core"), SleepStageKind::Light);
        assert_eq!(SleepStageKind::from_label("sws"), SleepStageKind::Deep);
        assert_eq!(SleepStageKind::from_label("rem"), SleepStageKind::Rem);
        assert_eq!(
            SleepStageKind::from_label("hypnagogia"),
            SleepStageKind::Unknown
        );
    }

    #[test]
    fn nutrition_totals_aggregate() {
        let items = vec![
            FoodItem {
                name: "oatmeal".into(),
                quantity: 80.0,
                unit: "g".into(),
                calories: 300.0,
                macros: Macronutrients {
                    protein_g: 10.0,
                    carbs_g: 54.0,
                    fat_g: 5.0,
                    fiber_g: 8.0,
                },
            },
            FoodItem {
                name: "banana".into(),
                quantity: 1.0,
                unit: "serving".into(),
                calories: 105.0,
                macros: Macronutrients {
                    protein_g: 1.3,
                    carbs_g: 27.0,
                    fat_g: 0.4,
                    fiber_g: 3.1,
                },
            },
        ];
        let totals = NutritionEntryRecord::aggregate_items(&items);
        assert!((totals.calories - 405.0).abs() < f64::EPSILON);
        assert!((totals.macros.protein_g - 11.3).abs() < 1e-9);
    }
}

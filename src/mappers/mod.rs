// ABOUTME: Data mapper layer: pure per-provider normalization of raw payloads
// ABOUTME: Canonical units, sleep-stage vocabulary, original_id traceability
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data mappers.
//!
//! Pure functions from raw provider payloads to canonical records. Units are
//! normalized here (distance to kilometers, sleep duration to hours, energy
//! to kilocalories) and every record carries `metadata.original_id` pointing
//! back at the provider-native identifier.
//!
//! A record that cannot be mapped is skipped and counted, never fabricated;
//! only a wholly unusable batch surfaces as an error upstream.

pub mod apple_health;
pub mod fitbit;
pub mod garmin;
pub mod google_fit;
pub mod health_points;
pub mod samsung_health;
pub mod strava;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{
    ActivityRecord, HealthRecordBase, NutritionEntryRecord, Provider, SleepSessionRecord,
};

/// Result of mapping one raw batch: the records that normalized cleanly plus
/// a count of those skipped.
#[derive(Debug)]
pub struct MapOutcome<T> {
    /// Successfully normalized records.
    pub records: Vec<T>,
    /// Raw records dropped because required fields were missing or invalid.
    pub skipped: usize,
}

impl<T> MapOutcome<T> {
    /// Map each raw value, collecting successes and counting failures.
    pub fn collect(raw: &[Value], mut map_one: impl FnMut(&Value) -> Option<T>) -> Self {
        let mut records = Vec::with_capacity(raw.len());
        let mut skipped = 0;
        for value in raw {
            match map_one(value) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }
        Self { records, skipped }
    }
}

/// Pure normalization interface, one implementation per provider.
pub trait DataMapper: Send + Sync {
    /// Provider whose payload shapes this mapper understands.
    fn provider(&self) -> Provider;

    /// Normalize raw activity records.
    fn map_activities(&self, user_id: Uuid, raw: &[Value]) -> MapOutcome<ActivityRecord>;

    /// Normalize raw sleep records.
    fn map_sleep_data(&self, user_id: Uuid, raw: &[Value]) -> MapOutcome<SleepSessionRecord>;

    /// Normalize raw nutrition records.
    fn map_nutrition_data(&self, user_id: Uuid, raw: &[Value]) -> MapOutcome<NutritionEntryRecord>;
}

/// Look up the mapper for a syncable provider.
#[must_use]
pub fn for_provider(provider: Provider) -> Option<&'static dyn DataMapper> {
    match provider {
        Provider::Fitbit => Some(&fitbit::FitbitMapper),
        Provider::Strava => Some(&strava::StravaMapper),
        Provider::Garmin => Some(&garmin::GarminMapper),
        Provider::GoogleFit => Some(&google_fit::GoogleFitMapper),
        Provider::AppleHealth => Some(&apple_health::AppleHealthMapper),
        Provider::SamsungHealth => Some(&samsung_health::SamsungHealthMapper),
        Provider::ManualEntry => None,
    }
}

// --- shared field accessors -------------------------------------------------

pub(crate) fn get_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

pub(crate) fn get_f64(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64)
}

pub(crate) fn get_u32(value: &Value, key: &str) -> Option<u32> {
    value
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

pub(crate) fn get_i64(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64)
}

/// Identifier fields arrive as strings or numbers depending on provider.
pub(crate) fn get_id(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn from_epoch_seconds(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

pub(crate) fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Millis fields that some APIs serialize as strings.
pub(crate) fn get_epoch_millis(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    match value.get(key)? {
        Value::Number(n) => from_epoch_millis(n.as_i64()?),
        Value::String(s) => from_epoch_millis(s.parse().ok()?),
        _ => None,
    }
}

pub(crate) fn meters_to_km(meters: f64) -> f64 {
    meters / 1000.0
}

pub(crate) fn seconds_to_hours(seconds: u32) -> f64 {
    f64::from(seconds) / 3600.0
}

/// Build the shared base for a canonical record.
pub(crate) fn record_base(
    user_id: Uuid,
    value: f64,
    unit: &str,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    source_provider: Provider,
    original_id: &str,
) -> HealthRecordBase {
    HealthRecordBase {
        user_id,
        value,
        unit: unit.to_owned(),
        start_time,
        end_time,
        source_provider,
        source_device_id: None,
        metadata: json!({ "original_id": original_id }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn every_syncable_provider_has_a_mapper() {
        for provider in Provider::syncable() {
            assert!(for_provider(provider).is_some(), "missing mapper: {provider}");
        }
        assert!(for_provider(Provider::ManualEntry).is_none());
    }

    #[test]
    fn epoch_millis_accepts_string_and_number() {
        let v = json!({"a": 1_700_000_000_000_i64, "b": "1700000000000", "c": true});
        assert!(get_epoch_millis(&v, "a").is_some());
        assert_eq!(get_epoch_millis(&v, "a"), get_epoch_millis(&v, "b"));
        assert!(get_epoch_millis(&v, "c").is_none());
    }

    #[test]
    fn skipped_records_are_counted_not_dropped_silently() {
        let raw = vec![json!({"ok": 1}), json!({"bad": true}), json!({"ok": 2})];
        let outcome = MapOutcome::collect(&raw, |v| v.get("ok").and_then(Value::as_i64));
        assert_eq!(outcome.records, vec![1, 2]);
        assert_eq!(outcome.skipped, 1);
    }
}

// ABOUTME: Strava payload normalization: athlete activity summaries
// ABOUTME: Meters to kilometers, sport_type to canonical activity labels
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strava mapper.
//!
//! Only activities exist; the adapter already returns empty sleep and
//! nutrition batches, so those mappings are trivially empty. Distances
//! arrive in meters and moving time in seconds.

use chrono::Duration;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{ActivityRecord, NutritionEntryRecord, Provider, SleepSessionRecord};

use super::{
    get_f64, get_id, get_str, get_u32, meters_to_km, parse_datetime, record_base, DataMapper,
    MapOutcome,
};

/// Mapper for Strava payloads.
pub struct StravaMapper;

fn map_activity(user_id: Uuid, raw: &Value) -> Option<ActivityRecord> {
    let original_id = get_id(raw, "id")?;
    let start_time = get_str(raw, "start_date").and_then(parse_datetime)?;
    let duration_seconds = get_u32(raw, "moving_time").or_else(|| get_u32(raw, "elapsed_time"))?;
    let end_time = start_time + Duration::seconds(i64::from(duration_seconds));

    Some(ActivityRecord {
        base: record_base(
            user_id,
            f64::from(duration_seconds),
            "seconds",
            start_time,
            Some(end_time),
            Provider::Strava,
            &original_id,
        ),
        activity_type: get_str(raw, "sport_type")
            .or_else(|| get_str(raw, "type"))
            .map_or_else(|| "workout".to_owned(), str::to_lowercase),
        duration_seconds,
        distance_km: get_f64(raw, "distance").map(meters_to_km),
        calories_burned: get_f64(raw, "calories").or_else(|| get_f64(raw, "kilojoules")),
        steps: None,
        heart_rate_avg: get_f64(raw, "average_heartrate").map(|hr| hr.round() as u32),
        heart_rate_max: get_f64(raw, "max_heartrate").map(|hr| hr.round() as u32),
    })
}

impl DataMapper for StravaMapper {
    fn provider(&self) -> Provider {
        Provider::Strava
    }

    fn map_activities(&self, user_id: Uuid, raw: &[Value]) -> MapOutcome<ActivityRecord> {
        MapOutcome::collect(raw, |value| map_activity(user_id, value))
    }

    fn map_sleep_data(&self, _user_id: Uuid, raw: &[Value]) -> MapOutcome<SleepSessionRecord> {
        MapOutcome {
            records: Vec::new(),
            skipped: raw.len(),
        }
    }

    fn map_nutrition_data(
        &self,
        _user_id: Uuid,
        raw: &[Value],
    ) -> MapOutcome<NutritionEntryRecord> {
        MapOutcome {
            records: Vec::new(),
            skipped: raw.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    #[test]
    fn activity_distance_converts_to_km() {
        let raw = json!({
            "id": 10_200_300_u64,
            "sport_type": "Ride",
            "start_date": "2024-05-03T06:15:00Z",
            "moving_time": 4_500,
            "elapsed_time": 4_800,
            "distance": 30_250.0,
            "average_heartrate": 141.6,
            "max_heartrate": 179.0
        });
        let outcome = StravaMapper.map_activities(Uuid::new_v4(), &[raw]);
        assert_eq!(outcome.skipped, 0);
        let record = &outcome.records[0];
        assert_eq!(record.activity_type, "ride");
        assert_eq!(record.duration_seconds, 4_500);
        assert!((record.distance_km.unwrap() - 30.25).abs() < 1e-9);
        assert_eq!(record.heart_rate_avg, Some(142));
        assert_eq!(record.base.metadata["original_id"], "10200300");
    }

    #[test]
    fn sleep_and_nutrition_batches_are_empty() {
        let user = Uuid::new_v4();
        assert!(StravaMapper.map_sleep_data(user, &[]).records.is_empty());
        assert!(StravaMapper
            .map_nutrition_data(user, &[])
            .records
            .is_empty());
    }
}

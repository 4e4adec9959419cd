// ABOUTME: Apple Health payload normalization for HealthKit-export record shapes
// ABOUTME: HKWorkoutActivityType labels, sleepAnalysis minute buckets to stages
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Apple Health mapper.
//!
//! Normalizes HealthKit-export shaped records (the same shapes the
//! placeholder adapter emits, and the shapes a device-upload ingestion path
//! would produce). Workout distances arrive in meters; `sleepAnalysis`
//! carries per-stage minute buckets laid out consecutively from bedtime.

use chrono::Duration;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    ActivityRecord, FoodItem, Macronutrients, MealType, NutritionEntryRecord, Provider,
    SleepSessionRecord, SleepStage, SleepStageKind,
};

use super::{
    get_f64, get_str, get_u32, meters_to_km, parse_datetime, record_base, seconds_to_hours,
    DataMapper, MapOutcome,
};

/// Mapper for Apple Health payloads.
pub struct AppleHealthMapper;

/// Strip the `HKWorkoutActivityType` prefix and lowercase the remainder.
fn workout_label(raw: &str) -> String {
    raw.strip_prefix("HKWorkoutActivityType")
        .unwrap_or(raw)
        .to_lowercase()
}

fn map_activity(user_id: Uuid, raw: &Value) -> Option<ActivityRecord> {
    let original_id = get_str(raw, "uuid")?;
    let start_time = get_str(raw, "startDate").and_then(parse_datetime)?;
    let duration_seconds = get_f64(raw, "duration")? as u32;
    let end_time = start_time + Duration::seconds(i64::from(duration_seconds));

    Some(ActivityRecord {
        base: record_base(
            user_id,
            f64::from(duration_seconds),
            "seconds",
            start_time,
            Some(end_time),
            Provider::AppleHealth,
            original_id,
        ),
        activity_type: get_str(raw, "workoutActivityType")
            .map_or_else(|| "workout".to_owned(), workout_label),
        duration_seconds,
        distance_km: get_f64(raw, "totalDistance").map(meters_to_km),
        calories_burned: get_f64(raw, "totalEnergyBurned"),
        steps: get_u32(raw, "stepCount").filter(|&s| s > 0),
        heart_rate_avg: None,
        heart_rate_max: None,
    })
}

fn map_sleep(user_id: Uuid, raw: &Value) -> Option<SleepSessionRecord> {
    let original_id = get_str(raw, "uuid")?;
    let start_time = get_str(raw, "startDate").and_then(parse_datetime)?;
    let end_time = get_str(raw, "endDate").and_then(parse_datetime)?;
    let duration_seconds =
        u32::try_from((end_time - start_time).num_seconds().max(0)).unwrap_or(u32::MAX);

    let mut stages = Vec::new();
    let mut cursor = start_time;
    for bucket in raw
        .get("sleepAnalysis")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let Some(minutes) = get_u32(bucket, "minutes") else {
            continue;
        };
        let Some(label) = get_str(bucket, "stage") else {
            continue;
        };
        let seconds = minutes * 60;
        let bucket_end = cursor + Duration::seconds(i64::from(seconds));
        stages.push(SleepStage {
            stage: SleepStageKind::from_label(label),
            start_time: cursor,
            end_time: bucket_end,
            duration_seconds: seconds,
        });
        cursor = bucket_end;
    }

    Some(SleepSessionRecord {
        base: record_base(
            user_id,
            seconds_to_hours(duration_seconds),
            "hours",
            start_time,
            Some(end_time),
            Provider::AppleHealth,
            original_id,
        ),
        duration_seconds,
        stages,
        quality_score: None,
    })
}

fn map_nutrition(user_id: Uuid, raw: &Value) -> Option<NutritionEntryRecord> {
    let original_id = get_str(raw, "uuid")?;
    let start_time = get_str(raw, "date").and_then(parse_datetime)?;

    let items: Vec<FoodItem> = raw
        .get("items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|item| FoodItem {
            name: get_str(item, "name").unwrap_or("unknown food").to_owned(),
            quantity: get_f64(item, "quantity").unwrap_or(1.0),
            unit: get_str(item, "unit").unwrap_or("serving").to_owned(),
            calories: get_f64(item, "calories").unwrap_or(0.0),
            macros: Macronutrients {
                protein_g: get_f64(item, "protein").unwrap_or(0.0),
                carbs_g: get_f64(item, "carbohydrates").unwrap_or(0.0),
                fat_g: get_f64(item, "fat").unwrap_or(0.0),
                fiber_g: get_f64(item, "fiber").unwrap_or(0.0),
            },
        })
        .collect();
    if items.is_empty() {
        return None;
    }
    let totals = NutritionEntryRecord::aggregate_items(&items);

    Some(NutritionEntryRecord {
        base: record_base(
            user_id,
            totals.calories,
            "kcal",
            start_time,
            None,
            Provider::AppleHealth,
            original_id,
        ),
        meal_type: get_str(raw, "mealType").map_or(MealType::Other, MealType::from_label),
        items,
        totals,
    })
}

impl DataMapper for AppleHealthMapper {
    fn provider(&self) -> Provider {
        Provider::AppleHealth
    }

    fn map_activities(&self, user_id: Uuid, raw: &[Value]) -> MapOutcome<ActivityRecord> {
        MapOutcome::collect(raw, |value| map_activity(user_id, value))
    }

    fn map_sleep_data(&self, user_id: Uuid, raw: &[Value]) -> MapOutcome<SleepSessionRecord> {
        MapOutcome::collect(raw, |value| map_sleep(user_id, value))
    }

    fn map_nutrition_data(&self, user_id: Uuid, raw: &[Value]) -> MapOutcome<NutritionEntryRecord> {
        MapOutcome::collect(raw, |value| map_nutrition(user_id, value))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    #[test]
    fn workout_label_drops_healthkit_prefix() {
        assert_eq!(workout_label("HKWorkoutActivityTypeWalking"), "walking");
        assert_eq!(workout_label("Running"), "running");
    }

    #[test]
    fn sleep_analysis_buckets_lay_out_consecutively() {
        let raw = json!({
            "uuid": "sleep-1",
            "startDate": "2024-05-01T22:00:00Z",
            "endDate": "2024-05-02T06:00:00Z",
            "sleepAnalysis": [
                {"stage": "core", "minutes": 240},
                {"stage": "deep", "minutes": 90},
                {"stage": "rem",  "minutes": 80}
            ]
        });
        let outcome = AppleHealthMapper.map_sleep_data(Uuid::new_v4(), &[raw]);
        let record = &outcome.records[0];
        assert_eq!(record.stages.len(), 3);
        // "core" is Apple's light-sleep label.
        assert_eq!(record.stages[0].stage, SleepStageKind::Light);
        assert_eq!(record.stages[0].end_time, record.stages[1].start_time);
        assert_eq!(record.stages[1].duration_seconds, 5_400);
    }

    #[test]
    fn nutrition_without_items_is_skipped() {
        let raw = json!({"uuid": "n-1", "date": "2024-05-01T12:00:00Z", "items": []});
        let outcome = AppleHealthMapper.map_nutrition_data(Uuid::new_v4(), &[raw]);
        assert_eq!(outcome.skipped, 1);
    }
}

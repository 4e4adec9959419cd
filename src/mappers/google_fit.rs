// ABOUTME: Google Fit payload normalization: sessions and nutrition aggregate buckets
// ABOUTME: Millis-as-string timestamps, numeric activity types, nested mapVal nutrients
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Fit mapper.
//!
//! Sessions carry numeric activity type codes and millisecond timestamps
//! serialized as strings. Nutrition arrives as one aggregate bucket per day
//! whose points hold a `mapVal` of nutrient key/value pairs plus meal type
//! and food name entries.

use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    ActivityRecord, FoodItem, Macronutrients, MealType, NutritionEntryRecord, Provider,
    SleepSessionRecord,
};

use super::{
    from_epoch_millis, get_epoch_millis, get_id, get_str, record_base, seconds_to_hours,
    DataMapper, MapOutcome,
};

/// Mapper for Google Fit payloads.
pub struct GoogleFitMapper;

/// Subset of Google Fit numeric activity types the engine labels precisely.
fn activity_label(code: i64) -> String {
    match code {
        1 => "cycling".to_owned(),
        7 => "walking".to_owned(),
        8 => "running".to_owned(),
        82 => "swimming".to_owned(),
        97 => "strength_training".to_owned(),
        _ => "workout".to_owned(),
    }
}

fn meal_type_from_code(code: i64) -> MealType {
    match code {
        1 => MealType::Breakfast,
        2 => MealType::Lunch,
        3 => MealType::Dinner,
        4 => MealType::Snack,
        _ => MealType::Other,
    }
}

fn map_activity(user_id: Uuid, raw: &Value) -> Option<ActivityRecord> {
    let original_id = get_id(raw, "id")?;
    let start_time = get_epoch_millis(raw, "startTimeMillis")?;
    let end_time = get_epoch_millis(raw, "endTimeMillis")?;
    let duration_seconds =
        u32::try_from((end_time - start_time).num_seconds().max(0)).unwrap_or(u32::MAX);

    Some(ActivityRecord {
        base: record_base(
            user_id,
            f64::from(duration_seconds),
            "seconds",
            start_time,
            Some(end_time),
            Provider::GoogleFit,
            &original_id,
        ),
        activity_type: raw
            .get("activityType")
            .and_then(Value::as_i64)
            .map_or_else(|| "workout".to_owned(), activity_label),
        duration_seconds,
        // Session summaries carry no distance or heart rate.
        distance_km: None,
        calories_burned: None,
        steps: None,
        heart_rate_avg: None,
        heart_rate_max: None,
    })
}

fn map_sleep(user_id: Uuid, raw: &Value) -> Option<SleepSessionRecord> {
    let original_id = get_id(raw, "id")?;
    let start_time = get_epoch_millis(raw, "startTimeMillis")?;
    let end_time = get_epoch_millis(raw, "endTimeMillis")?;
    let duration_seconds =
        u32::try_from((end_time - start_time).num_seconds().max(0)).unwrap_or(u32::MAX);

    Some(SleepSessionRecord {
        base: record_base(
            user_id,
            seconds_to_hours(duration_seconds),
            "hours",
            start_time,
            Some(end_time),
            Provider::GoogleFit,
            &original_id,
        ),
        duration_seconds,
        // Stage granularity needs a separate dataset read; sessions carry none.
        stages: Vec::new(),
        quality_score: None,
    })
}

/// Pull a nutrient value out of a point's `mapVal` list by key.
fn nutrient(map_val: &[Value], key: &str) -> f64 {
    map_val
        .iter()
        .find(|entry| get_str(entry, "key") == Some(key))
        .and_then(|entry| entry.pointer("/value/fpVal"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn map_nutrition_point(user_id: Uuid, point: &Value) -> Option<NutritionEntryRecord> {
    let values = point.get("value").and_then(Value::as_array)?;
    let map_val = values
        .first()
        .and_then(|v| v.get("mapVal"))
        .and_then(Value::as_array)?;

    let start_nanos: i64 = get_str(point, "startTimeNanos").and_then(|s| s.parse().ok())?;
    let start_time = from_epoch_millis(start_nanos / 1_000_000)?;

    let meal_type = values
        .get(1)
        .and_then(|v| v.get("intVal"))
        .and_then(Value::as_i64)
        .map_or(MealType::Other, meal_type_from_code);
    let name = values
        .get(2)
        .and_then(|v| v.get("strVal"))
        .and_then(Value::as_str)
        .unwrap_or("unknown food");

    let item = FoodItem {
        name: name.to_owned(),
        quantity: 1.0,
        unit: "serving".to_owned(),
        calories: nutrient(map_val, "calories"),
        macros: Macronutrients {
            protein_g: nutrient(map_val, "protein"),
            carbs_g: nutrient(map_val, "carbs.total"),
            fat_g: nutrient(map_val, "fat.total"),
            fiber_g: nutrient(map_val, "dietary_fiber"),
        },
    };
    let items = vec![item];
    let totals = NutritionEntryRecord::aggregate_items(&items);

    Some(NutritionEntryRecord {
        base: record_base(
            user_id,
            totals.calories,
            "kcal",
            start_time,
            None,
            Provider::GoogleFit,
            &start_nanos.to_string(),
        ),
        meal_type,
        items,
        totals,
    })
}

impl DataMapper for GoogleFitMapper {
    fn provider(&self) -> Provider {
        Provider::GoogleFit
    }

    fn map_activities(&self, user_id: Uuid, raw: &[Value]) -> MapOutcome<ActivityRecord> {
        MapOutcome::collect(raw, |value| map_activity(user_id, value))
    }

    fn map_sleep_data(&self, user_id: Uuid, raw: &[Value]) -> MapOutcome<SleepSessionRecord> {
        MapOutcome::collect(raw, |value| map_sleep(user_id, value))
    }

    fn map_nutrition_data(&self, user_id: Uuid, raw: &[Value]) -> MapOutcome<NutritionEntryRecord> {
        // One aggregate bucket per day; each point is one logged meal.
        let mut records = Vec::new();
        let mut skipped = 0;
        for bucket in raw {
            let points = bucket
                .pointer("/dataset")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|dataset| dataset.get("point").and_then(Value::as_array))
                .flatten();
            for point in points {
                match map_nutrition_point(user_id, point) {
                    Some(record) => records.push(record),
                    None => skipped += 1,
                }
            }
        }
        MapOutcome { records, skipped }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    #[test]
    fn session_maps_string_millis_and_type_code() {
        let raw = json!({
            "id": "session-301",
            "name": "Morning run",
            "activityType": 8,
            "startTimeMillis": "1714550400000",
            "endTimeMillis": "1714552200000"
        });
        let outcome = GoogleFitMapper.map_activities(Uuid::new_v4(), &[raw]);
        let record = &outcome.records[0];
        assert_eq!(record.activity_type, "running");
        assert_eq!(record.duration_seconds, 1_800);
        assert_eq!(record.base.metadata["original_id"], "session-301");
    }

    #[test]
    fn nutrition_bucket_points_become_entries() {
        let bucket = json!({
            "startTimeMillis": "1714521600000",
            "endTimeMillis": "1714608000000",
            "dataset": [{"point": [{
                "startTimeNanos": "1714564800000000000",
                "value": [
                    {"mapVal": [
                        {"key": "calories", "value": {"fpVal": 520.0}},
                        {"key": "protein", "value": {"fpVal": 28.0}},
                        {"key": "carbs.total", "value": {"fpVal": 61.0}},
                        {"key": "fat.total", "value": {"fpVal": 18.0}}
                    ]},
                    {"intVal": 2},
                    {"strVal": "Burrito bowl"}
                ]
            }]}]
        });
        let outcome = GoogleFitMapper.map_nutrition_data(Uuid::new_v4(), &[bucket]);
        assert_eq!(outcome.skipped, 0);
        let record = &outcome.records[0];
        assert_eq!(record.meal_type, MealType::Lunch);
        assert_eq!(record.items[0].name, "Burrito bowl");
        assert!((record.totals.calories - 520.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_without_nutrients_is_skipped() {
        let bucket = json!({"dataset": [{"point": [{"startTimeNanos": "1", "value": []}]}]});
        let outcome = GoogleFitMapper.map_nutrition_data(Uuid::new_v4(), &[bucket]);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.skipped, 1);
    }
}

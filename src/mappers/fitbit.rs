// ABOUTME: Fitbit payload normalization: activity list, sleep log 1.2, food log
// ABOUTME: Handles Fitbit's offset-less local timestamps and mealTypeId codes
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fitbit mapper.
//!
//! Activity distances already arrive in kilometers; durations arrive in
//! milliseconds. Sleep log v1.2 carries stage data under `levels.data` with
//! labels `wake`/`light`/`deep`/`rem`. Food log entries are one record per
//! logged food.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    ActivityRecord, FoodItem, Macronutrients, MealType, NutritionEntryRecord, Provider,
    SleepSessionRecord, SleepStage, SleepStageKind,
};

use super::{
    get_f64, get_id, get_str, get_u32, parse_datetime, record_base, seconds_to_hours, DataMapper,
    MapOutcome,
};

/// Mapper for Fitbit payloads.
pub struct FitbitMapper;

/// Fitbit timestamps sometimes omit the UTC offset; treat those as UTC.
fn parse_fitbit_datetime(s: &str) -> Option<DateTime<Utc>> {
    parse_datetime(s).or_else(|| {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.3f")
            .ok()
            .map(|naive| naive.and_utc())
    })
}

fn meal_type_from_id(id: u32) -> MealType {
    match id {
        1 => MealType::Breakfast,
        3 => MealType::Lunch,
        5 => MealType::Dinner,
        2 | 4 | 6 => MealType::Snack,
        _ => MealType::Other,
    }
}

fn map_activity(user_id: Uuid, raw: &Value) -> Option<ActivityRecord> {
    let original_id = get_id(raw, "logId")?;
    let start_time = get_str(raw, "startTime").and_then(parse_fitbit_datetime)?;
    let duration_ms = raw.get("duration").and_then(Value::as_u64)?;
    let duration_seconds = u32::try_from(duration_ms / 1000).ok()?;
    let end_time = start_time + Duration::seconds(i64::from(duration_seconds));

    Some(ActivityRecord {
        base: record_base(
            user_id,
            f64::from(duration_seconds),
            "seconds",
            start_time,
            Some(end_time),
            Provider::Fitbit,
            &original_id,
        ),
        activity_type: get_str(raw, "activityName")
            .map_or_else(|| "workout".to_owned(), str::to_lowercase),
        duration_seconds,
        // Fitbit's activity list reports distance in kilometers already.
        distance_km: get_f64(raw, "distance"),
        calories_burned: get_f64(raw, "calories"),
        steps: get_u32(raw, "steps").filter(|&s| s > 0),
        heart_rate_avg: get_u32(raw, "averageHeartRate"),
        heart_rate_max: None,
    })
}

fn map_sleep(user_id: Uuid, raw: &Value) -> Option<SleepSessionRecord> {
    let original_id = get_id(raw, "logId")?;
    let start_time = get_str(raw, "startTime").and_then(parse_fitbit_datetime)?;
    let duration_ms = raw.get("duration").and_then(Value::as_u64)?;
    let duration_seconds = u32::try_from(duration_ms / 1000).ok()?;
    let end_time = get_str(raw, "endTime")
        .and_then(parse_fitbit_datetime)
        .unwrap_or(start_time + Duration::seconds(i64::from(duration_seconds)));

    let stages = raw
        .pointer("/levels/data")
        .and_then(Value::as_array)
        .map(|segments| {
            segments
                .iter()
                .filter_map(|segment| {
                    let stage_start =
                        get_str(segment, "dateTime").and_then(parse_fitbit_datetime)?;
                    let seconds = get_u32(segment, "seconds")?;
                    Some(SleepStage {
                        stage: SleepStageKind::from_label(get_str(segment, "level")?),
                        start_time: stage_start,
                        end_time: stage_start + Duration::seconds(i64::from(seconds)),
                        duration_seconds: seconds,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(SleepSessionRecord {
        base: record_base(
            user_id,
            seconds_to_hours(duration_seconds),
            "hours",
            start_time,
            Some(end_time),
            Provider::Fitbit,
            &original_id,
        ),
        duration_seconds,
        stages,
        quality_score: get_f64(raw, "efficiency").map(|e| e as f32),
    })
}

fn map_nutrition(user_id: Uuid, raw: &Value) -> Option<NutritionEntryRecord> {
    let original_id = get_id(raw, "logId")?;
    let log_date = get_str(raw, "logDate")
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())?
        .and_hms_opt(0, 0, 0)?
        .and_utc();
    let food = raw.get("loggedFood")?;
    let nutrients = raw.get("nutritionalValues").unwrap_or(&Value::Null);

    let item = FoodItem {
        name: get_str(food, "name").unwrap_or("unknown food").to_owned(),
        quantity: get_f64(food, "amount").unwrap_or(1.0),
        unit: food
            .pointer("/unit/name")
            .and_then(Value::as_str)
            .unwrap_or("serving")
            .to_owned(),
        calories: get_f64(food, "calories")
            .or_else(|| get_f64(nutrients, "calories"))
            .unwrap_or(0.0),
        macros: Macronutrients {
            protein_g: get_f64(nutrients, "protein").unwrap_or(0.0),
            carbs_g: get_f64(nutrients, "carbs").unwrap_or(0.0),
            fat_g: get_f64(nutrients, "fat").unwrap_or(0.0),
            fiber_g: get_f64(nutrients, "fiber").unwrap_or(0.0),
        },
    };
    let items = vec![item];
    let totals = NutritionEntryRecord::aggregate_items(&items);

    Some(NutritionEntryRecord {
        base: record_base(
            user_id,
            totals.calories,
            "kcal",
            log_date,
            None,
            Provider::Fitbit,
            &original_id,
        ),
        meal_type: get_u32(food, "mealTypeId").map_or(MealType::Other, meal_type_from_id),
        items,
        totals,
    })
}

impl DataMapper for FitbitMapper {
    fn provider(&self) -> Provider {
        Provider::Fitbit
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

    fn user() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn activity_maps_with_original_id_and_units() {
        let raw = json!({
            "logId": 51_007_u64,
            "activityName": "Run",
            "startTime": "2024-05-01T07:30:00.000-07:00",
            "duration": 1_805_000,
            "distance": 5.2,
            "calories": 402,
            "steps": 6_400,
            "averageHeartRate": 148
        });
        let outcome = FitbitMapper.map_activities(user(), &[raw]);
        assert_eq!(outcome.skipped, 0);
        let record = &outcome.records[0];
        assert_eq!(record.activity_type, "run");
        assert_eq!(record.duration_seconds, 1805);
        assert_eq!(record.distance_km, Some(5.2));
        assert_eq!(record.steps, Some(6400));
        assert_eq!(record.base.metadata["original_id"], "51007");
        assert_eq!(record.base.unit, "seconds");
    }

    #[test]
    fn sleep_maps_stage_vocabulary() {
        let raw = json!({
            "logId": 88_001_u64,
            "startTime": "2024-05-01T23:10:00.000",
            "endTime": "2024-05-02T06:40:00.000",
            "duration": 27_000_000,
            "efficiency": 92,
            "levels": {"data": [
                {"dateTime": "2024-05-01T23:10:00.000", "level": "wake", "seconds": 300},
                {"dateTime": "2024-05-01T23:15:00.000", "level": "light", "seconds": 5_400},
                {"dateTime": "2024-05-02T00:45:00.000", "level": "deep", "seconds": 3_600},
                {"dateTime": "2024-05-02T01:45:00.000", "level": "rem", "seconds": 2_700}
            ]}
        });
        let outcome = FitbitMapper.map_sleep_data(user(), &[raw]);
        let record = &outcome.records[0];
        assert_eq!(record.duration_seconds, 27_000);
        assert_eq!(record.base.unit, "hours");
        let summary = record.stage_summary();
        assert_eq!(summary[&SleepStageKind::Awake], 300);
        assert_eq!(summary[&SleepStageKind::Light], 5_400);
        assert_eq!(summary[&SleepStageKind::Deep], 3_600);
        assert_eq!(summary[&SleepStageKind::Rem], 2_700);
    }

    #[test]
    fn nutrition_maps_meal_type_codes() {
        let raw = json!({
            "logId": 7_310_u64,
            "logDate": "2024-05-01",
            "loggedFood": {
                "name": "Oatmeal",
                "amount": 1.0,
                "unit": {"name": "bowl"},
                "calories": 310,
                "mealTypeId": 1
            },
            "nutritionalValues": {
                "calories": 310, "protein": 11.0, "carbs": 54.0, "fat": 6.0, "fiber": 8.0
            }
        });
        let outcome = FitbitMapper.map_nutrition_data(user(), &[raw]);
        let record = &outcome.records[0];
        assert_eq!(record.meal_type, MealType::Breakfast);
        assert!((record.totals.calories - 310.0).abs() < f64::EPSILON);
        assert!((record.totals.macros.fiber_g - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_required_fields_skip_the_record() {
        let raw = json!({"activityName": "Run"});
        let outcome = FitbitMapper.map_activities(user(), &[raw]);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.skipped, 1);
    }
}

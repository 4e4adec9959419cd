// ABOUTME: Samsung Health payload normalization for partner-API record shapes
// ABOUTME: Numeric exercise and meal type codes, millisecond epoch timestamps
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Samsung Health mapper.
//!
//! Partner-API records use numeric codes for exercise and meal types and
//! millisecond epoch timestamps. Food entries are flat (one food per record)
//! with nutrient fields alongside the identity fields.

use chrono::Duration;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    ActivityRecord, FoodItem, Macronutrients, MealType, NutritionEntryRecord, Provider,
    SleepSessionRecord, SleepStage, SleepStageKind,
};

use super::{
    get_epoch_millis, get_f64, get_i64, get_str, get_u32, meters_to_km, record_base,
    seconds_to_hours, DataMapper, MapOutcome,
};

/// Mapper for Samsung Health payloads.
pub struct SamsungHealthMapper;

/// Samsung Health exercise type codes the engine labels precisely.
fn exercise_label(code: i64) -> String {
    match code {
        1001 => "walking".to_owned(),
        1002 => "running".to_owned(),
        11_007 => "cycling".to_owned(),
        14_001 => "swimming".to_owned(),
        _ => "workout".to_owned(),
    }
}

fn meal_type_from_code(code: i64) -> MealType {
    match code {
        100_001 => MealType::Breakfast,
        100_002 => MealType::Lunch,
        100_003 => MealType::Dinner,
        100_004 | 100_005 | 100_006 => MealType::Snack,
        _ => MealType::Other,
    }
}

fn map_activity(user_id: Uuid, raw: &Value) -> Option<ActivityRecord> {
    let original_id = get_str(raw, "datauuid")?;
    let start_time = get_epoch_millis(raw, "start_time")?;
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
            Provider::SamsungHealth,
            original_id,
        ),
        activity_type: get_i64(raw, "exercise_type")
            .map_or_else(|| "workout".to_owned(), exercise_label),
        duration_seconds,
        distance_km: get_f64(raw, "distance").map(meters_to_km),
        calories_burned: get_f64(raw, "calorie"),
        steps: get_u32(raw, "count").filter(|&s| s > 0),
        heart_rate_avg: None,
        heart_rate_max: None,
    })
}

fn map_sleep(user_id: Uuid, raw: &Value) -> Option<SleepSessionRecord> {
    let original_id = get_str(raw, "datauuid")?;
    let start_time = get_epoch_millis(raw, "start_time")?;
    let end_time = get_epoch_millis(raw, "end_time")?;
    let duration_seconds =
        u32::try_from((end_time - start_time).num_seconds().max(0)).unwrap_or(u32::MAX);

    let mut stages = Vec::new();
    let mut cursor = start_time;
    for bucket in raw
        .get("stages")
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
            Provider::SamsungHealth,
            original_id,
        ),
        duration_seconds,
        stages,
        quality_score: None,
    })
}

fn map_nutrition(user_id: Uuid, raw: &Value) -> Option<NutritionEntryRecord> {
    let original_id = get_str(raw, "datauuid")?;
    let start_time = get_epoch_millis(raw, "start_time")?;

    let item = FoodItem {
        name: get_str(raw, "title").unwrap_or("unknown food").to_owned(),
        quantity: 1.0,
        unit: "serving".to_owned(),
        calories: get_f64(raw, "calorie").unwrap_or(0.0),
        macros: Macronutrients {
            protein_g: get_f64(raw, "protein").unwrap_or(0.0),
            carbs_g: get_f64(raw, "carbohydrate").unwrap_or(0.0),
            fat_g: get_f64(raw, "total_fat").unwrap_or(0.0),
            fiber_g: get_f64(raw, "dietary_fiber").unwrap_or(0.0),
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
            Provider::SamsungHealth,
            original_id,
        ),
        meal_type: get_i64(raw, "meal_type").map_or(MealType::Other, meal_type_from_code),
        items,
        totals,
    })
}

impl DataMapper for SamsungHealthMapper {
    fn provider(&self) -> Provider {
        Provider::SamsungHealth
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
    fn exercise_codes_map_to_labels() {
        let raw = json!({
            "datauuid": "sh-ex-1",
            "exercise_type": 1002,
            "start_time": 1_714_550_400_000_i64,
            "duration": 2_100_000,
            "distance": 4_500.0,
            "calorie": 260.0,
            "count": 5_800
        });
        let outcome = SamsungHealthMapper.map_activities(Uuid::new_v4(), &[raw]);
        let record = &outcome.records[0];
        assert_eq!(record.activity_type, "running");
        assert_eq!(record.duration_seconds, 2_100);
        assert!((record.distance_km.unwrap() - 4.5).abs() < 1e-9);
        assert_eq!(record.steps, Some(5_800));
    }

    #[test]
    fn meal_codes_map_to_types() {
        let raw = json!({
            "datauuid": "sh-food-1",
            "start_time": 1_714_590_000_000_i64,
            "meal_type": 100_003,
            "title": "Sample dinner",
            "calorie": 740.0,
            "protein": 38.0,
            "carbohydrate": 82.0,
            "total_fat": 26.0
        });
        let outcome = SamsungHealthMapper.map_nutrition_data(Uuid::new_v4(), &[raw]);
        let record = &outcome.records[0];
        assert_eq!(record.meal_type, MealType::Dinner);
        assert!((record.totals.macros.carbs_g - 82.0).abs() < f64::EPSILON);
    }
}

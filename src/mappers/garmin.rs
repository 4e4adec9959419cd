// ABOUTME: Garmin wellness payload normalization: activity and sleep summaries
// ABOUTME: Epoch-second timestamps, sleepLevelsMap segments to canonical stages
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Garmin mapper.
//!
//! Wellness summaries report times as epoch seconds and distance in meters.
//! Sleep stage segments arrive grouped by level under `sleepLevelsMap`; they
//! are flattened into one chronological stage sequence.

use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    ActivityRecord, NutritionEntryRecord, Provider, SleepSessionRecord, SleepStage, SleepStageKind,
};

use super::{
    from_epoch_seconds, get_f64, get_i64, get_id, get_str, get_u32, meters_to_km, record_base,
    seconds_to_hours, DataMapper, MapOutcome,
};

/// Mapper for Garmin wellness payloads.
pub struct GarminMapper;

fn map_activity(user_id: Uuid, raw: &Value) -> Option<ActivityRecord> {
    let original_id = get_id(raw, "summaryId")?;
    let start_time = get_i64(raw, "startTimeInSeconds").and_then(from_epoch_seconds)?;
    let duration_seconds = get_u32(raw, "durationInSeconds")?;
    let end_time = start_time + chrono::Duration::seconds(i64::from(duration_seconds));

    Some(ActivityRecord {
        base: record_base(
            user_id,
            f64::from(duration_seconds),
            "seconds",
            start_time,
            Some(end_time),
            Provider::Garmin,
            &original_id,
        ),
        activity_type: get_str(raw, "activityType")
            .map_or_else(|| "workout".to_owned(), str::to_lowercase),
        duration_seconds,
        distance_km: get_f64(raw, "distanceInMeters").map(meters_to_km),
        calories_burned: get_f64(raw, "activeKilocalories"),
        steps: get_u32(raw, "steps").filter(|&s| s > 0),
        heart_rate_avg: get_u32(raw, "averageHeartRateInBeatsPerMinute"),
        heart_rate_max: get_u32(raw, "maxHeartRateInBeatsPerMinute"),
    })
}

fn map_sleep(user_id: Uuid, raw: &Value) -> Option<SleepSessionRecord> {
    let original_id = get_id(raw, "summaryId")?;
    let start_time = get_i64(raw, "startTimeInSeconds").and_then(from_epoch_seconds)?;
    let duration_seconds = get_u32(raw, "durationInSeconds")?;
    let end_time = start_time + chrono::Duration::seconds(i64::from(duration_seconds));

    let mut stages: Vec<SleepStage> = Vec::new();
    if let Some(levels) = raw.get("sleepLevelsMap").and_then(Value::as_object) {
        for (label, segments) in levels {
            let kind = SleepStageKind::from_label(label);
            for segment in segments.as_array().into_iter().flatten() {
                let Some(seg_start) =
                    get_i64(segment, "startTimeInSeconds").and_then(from_epoch_seconds)
                else {
                    continue;
                };
                let Some(seg_end) =
                    get_i64(segment, "endTimeInSeconds").and_then(from_epoch_seconds)
                else {
                    continue;
                };
                let seconds = u32::try_from((seg_end - seg_start).num_seconds().max(0))
                    .unwrap_or(u32::MAX);
                stages.push(SleepStage {
                    stage: kind,
                    start_time: seg_start,
                    end_time: seg_end,
                    duration_seconds: seconds,
                });
            }
        }
    }
    stages.sort_by_key(|s| s.start_time);

    Some(SleepSessionRecord {
        base: record_base(
            user_id,
            seconds_to_hours(duration_seconds),
            "hours",
            start_time,
            Some(end_time),
            Provider::Garmin,
            &original_id,
        ),
        duration_seconds,
        stages,
        quality_score: raw
            .pointer("/overallSleepScore/value")
            .and_then(Value::as_f64)
            .map(|score| score as f32),
    })
}

impl DataMapper for GarminMapper {
    fn provider(&self) -> Provider {
        Provider::Garmin
    }

    fn map_activities(&self, user_id: Uuid, raw: &[Value]) -> MapOutcome<ActivityRecord> {
        MapOutcome::collect(raw, |value| map_activity(user_id, value))
    }

    fn map_sleep_data(&self, user_id: Uuid, raw: &[Value]) -> MapOutcome<SleepSessionRecord> {
        MapOutcome::collect(raw, |value| map_sleep(user_id, value))
    }

    fn map_nutrition_data(
        &self,
        _user_id: Uuid,
        raw: &[Value],
    ) -> MapOutcome<NutritionEntryRecord> {
        // The wellness API has no nutrition endpoints; the batch is empty.
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
    fn activity_maps_epoch_times_and_meters() {
        let raw = json!({
            "summaryId": "x-activity-991",
            "activityType": "RUNNING",
            "startTimeInSeconds": 1_714_550_400,
            "durationInSeconds": 2_400,
            "distanceInMeters": 8_050.0,
            "activeKilocalories": 510.0,
            "steps": 8_900,
            "averageHeartRateInBeatsPerMinute": 152,
            "maxHeartRateInBeatsPerMinute": 181
        });
        let outcome = GarminMapper.map_activities(Uuid::new_v4(), &[raw]);
        assert_eq!(outcome.skipped, 0);
        let record = &outcome.records[0];
        assert_eq!(record.activity_type, "running");
        assert!((record.distance_km.unwrap() - 8.05).abs() < 1e-9);
        assert_eq!(record.heart_rate_max, Some(181));
        assert_eq!(record.base.metadata["original_id"], "x-activity-991");
    }

    #[test]
    fn sleep_levels_flatten_into_chronological_stages() {
        let raw = json!({
            "summaryId": "x-sleep-17",
            "startTimeInSeconds": 1_714_600_000,
            "durationInSeconds": 27_000,
            "sleepLevelsMap": {
                "deep":  [{"startTimeInSeconds": 1_714_603_600, "endTimeInSeconds": 1_714_607_200}],
                "light": [{"startTimeInSeconds": 1_714_600_000, "endTimeInSeconds": 1_714_603_600}],
                "rem":   [{"startTimeInSeconds": 1_714_607_200, "endTimeInSeconds": 1_714_609_000}]
            }
        });
        let outcome = GarminMapper.map_sleep_data(Uuid::new_v4(), &[raw]);
        let record = &outcome.records[0];
        assert_eq!(record.stages.len(), 3);
        // Sorted chronologically, not by level name.
        assert_eq!(record.stages[0].stage, SleepStageKind::Light);
        assert_eq!(record.stages[1].stage, SleepStageKind::Deep);
        assert_eq!(record.stages[2].stage, SleepStageKind::Rem);
        assert_eq!(record.stages[1].duration_seconds, 3_600);
    }
}

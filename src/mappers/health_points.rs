// ABOUTME: Derives flat scalar observations from canonical records
// ABOUTME: Absent or zero source fields never produce a point
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health data point projection.
//!
//! Canonical records flatten into type-tagged scalar observations for trend
//! and aggregation queries. The projection is provider-agnostic since the
//! input is already normalized. A missing or zero source field produces no
//! point at all; zero-valued observations are never fabricated.

use crate::models::{
    ActivityRecord, HealthDataPoint, HealthRecordBase, NutritionEntryRecord, SleepSessionRecord,
    SleepStageKind,
};

fn point(base: &HealthRecordBase, data_type: &str, subtype: &str, value: f64, unit: &str)
    -> HealthDataPoint {
    HealthDataPoint {
        user_id: base.user_id,
        data_type: data_type.to_owned(),
        data_subtype: subtype.to_owned(),
        value,
        unit: unit.to_owned(),
        start_time: base.start_time,
        end_time: base.end_time,
        source_provider: base.source_provider,
        metadata: base.metadata.clone(),
    }
}

/// Push a point only when the source value is present and non-zero.
fn push_nonzero(
    points: &mut Vec<HealthDataPoint>,
    base: &HealthRecordBase,
    data_type: &str,
    subtype: &str,
    value: Option<f64>,
    unit: &str,
) {
    if let Some(value) = value {
        if value.abs() > f64::EPSILON {
            points.push(point(base, data_type, subtype, value, unit));
        }
    }
}

/// Derive scalar observations from activity records.
#[must_use]
pub fn from_activities(records: &[ActivityRecord]) -> Vec<HealthDataPoint> {
    let mut points = Vec::new();
    for record in records {
        let base = &record.base;
        push_nonzero(
            &mut points,
            base,
            "activity",
            "duration_seconds",
            Some(f64::from(record.duration_seconds)),
            "seconds",
        );
        push_nonzero(
            &mut points,
            base,
            "activity",
            "distance",
            record.distance_km,
            "km",
        );
        push_nonzero(
            &mut points,
            base,
            "activity",
            "calories",
            record.calories_burned,
            "kcal",
        );
        push_nonzero(
            &mut points,
            base,
            "activity",
            "steps",
            record.steps.map(f64::from),
            "count",
        );
        push_nonzero(
            &mut points,
            base,
            "activity",
            "heart_rate_avg",
            record.heart_rate_avg.map(f64::from),
            "bpm",
        );
    }
    points
}

/// Derive scalar observations from sleep sessions.
#[must_use]
pub fn from_sleep_sessions(records: &[SleepSessionRecord]) -> Vec<HealthDataPoint> {
    let mut points = Vec::new();
    for record in records {
        let base = &record.base;
        push_nonzero(
            &mut points,
            base,
            "sleep",
            "duration_hours",
            Some(f64::from(record.duration_seconds) / 3600.0),
            "hours",
        );
        let summary = record.stage_summary();
        for (kind, subtype) in [
            (SleepStageKind::Deep, "deep_seconds"),
            (SleepStageKind::Rem, "rem_seconds"),
            (SleepStageKind::Light, "light_seconds"),
            (SleepStageKind::Awake, "awake_seconds"),
        ] {
            push_nonzero(
                &mut points,
                base,
                "sleep",
                subtype,
                summary.get(&kind).copied().map(f64::from),
                "seconds",
            );
        }
        push_nonzero(
            &mut points,
            base,
            "sleep",
            "quality_score",
            record.quality_score.map(f64::from),
            "score",
        );
    }
    points
}

/// Derive scalar observations from nutrition entries.
#[must_use]
pub fn from_nutrition_entries(records: &[NutritionEntryRecord]) -> Vec<HealthDataPoint> {
    let mut points = Vec::new();
    for record in records {
        let base = &record.base;
        push_nonzero(
            &mut points,
            base,
            "nutrition",
            "calories",
            Some(record.totals.calories),
            "kcal",
        );
        push_nonzero(
            &mut points,
            base,
            "nutrition",
            "protein",
            Some(record.totals.macros.protein_g),
            "g",
        );
        push_nonzero(
            &mut points,
            base,
            "nutrition",
            "carbs",
            Some(record.totals.macros.carbs_g),
            "g",
        );
        push_nonzero(
            &mut points,
            base,
            "nutrition",
            "fat",
            Some(record.totals.macros.fat_g),
            "g",
        );
        push_nonzero(
            &mut points,
            base,
            "nutrition",
            "fiber",
            Some(record.totals.macros.fiber_g),
            "g",
        );
    }
    points
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::mappers::record_base;
    use crate::models::Provider;
    use chrono::Utc;
    use uuid::Uuid;

    fn activity(steps: Option<u32>) -> ActivityRecord {
        ActivityRecord {
            base: record_base(
                Uuid::new_v4(),
                1800.0,
                "seconds",
                Utc::now(),
                None,
                Provider::Fitbit,
                "orig-1",
            ),
            activity_type: "run".to_owned(),
            duration_seconds: 1800,
            distance_km: None,
            calories_burned: None,
            steps,
            heart_rate_avg: None,
            heart_rate_max: None,
        }
    }

    #[test]
    fn absent_steps_produce_no_point() {
        let points = from_activities(&[activity(None)]);
        assert!(points.iter().all(|p| p.data_subtype != "steps"));
    }

    #[test]
    fn zero_steps_produce_no_point() {
        let points = from_activities(&[activity(Some(0))]);
        assert!(points.iter().all(|p| p.data_subtype != "steps"));
    }

    #[test]
    fn present_steps_produce_one_point_with_original_id() {
        let points = from_activities(&[activity(Some(500))]);
        let steps: Vec<_> = points.iter().filter(|p| p.data_subtype == "steps").collect();
        assert_eq!(steps.len(), 1);
        assert!((steps[0].value - 500.0).abs() < f64::EPSILON);
        assert_eq!(steps[0].unit, "count");
        assert_eq!(steps[0].metadata["original_id"], "orig-1");
    }
}

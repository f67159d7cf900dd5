//! Chart data for reviewing a flagged meter: consumption and seasonal index
//! over time, with the record date marked.

use meter_client::domain::AnnotatedReading;
use serde::Serialize;
use time::Date;

use super::ClassificationOutput;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfilePoint {
    #[serde(with = "meter_client::domain::date_format")]
    pub date: Date,
    pub consumption: f64,
    pub seasonal_index: Option<f64>,
    pub building_deviation: Option<f64>,
    pub after_record: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeterProfile {
    pub meter_id: String,
    pub record_date: Option<Date>,
    pub points: Vec<ProfilePoint>,
}

pub fn meter_profile(annotated: &[AnnotatedReading], meter_id: &str) -> Option<MeterProfile> {
    let mut rows: Vec<&AnnotatedReading> = annotated.iter().filter(|a| a.meter_id == meter_id).collect();
    if rows.is_empty() {
        return None;
    }
    rows.sort_by_key(|a| a.date);

    let record_date = rows[0].record_date;
    let points = rows
        .into_iter()
        .map(|a| ProfilePoint {
            date: a.date,
            consumption: a.consumption,
            seasonal_index: a.seasonal_index,
            building_deviation: a.building_deviation,
            after_record: record_date.is_some_and(|r| a.date > r),
        })
        .collect();

    Some(MeterProfile {
        meter_id: meter_id.to_string(),
        record_date,
        points,
    })
}

/// Profiles of the first `limit` suspicious meters, in suspicious-list order.
pub fn suspicious_profiles(output: &ClassificationOutput, limit: usize) -> Vec<MeterProfile> {
    output
        .suspicious
        .iter()
        .take(limit)
        .filter_map(|s| meter_profile(&output.annotated, &s.meter_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_client::domain::{Reading, SuspiciousMeter};
    use time::macros::date;

    fn annotated(meter: &str, date: Date, record: Option<Date>) -> AnnotatedReading {
        AnnotatedReading {
            record_date: record,
            seasonal_index: Some(1.0),
            ..AnnotatedReading::unannotated(&Reading::new(meter, "b-1", date, 10.0))
        }
    }

    #[test]
    fn profile_is_date_ordered_and_marks_post_record_points() {
        let record = Some(date!(2020 - 02 - 01));
        let rows = vec![
            annotated("m-1", date!(2020 - 03 - 01), record),
            annotated("m-2", date!(2020 - 01 - 01), None),
            annotated("m-1", date!(2020 - 01 - 01), record),
            annotated("m-1", date!(2020 - 02 - 01), record),
        ];

        let profile = meter_profile(&rows, "m-1").unwrap();
        let dates: Vec<Date> = profile.points.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![date!(2020 - 01 - 01), date!(2020 - 02 - 01), date!(2020 - 03 - 01)]);
        let after: Vec<bool> = profile.points.iter().map(|p| p.after_record).collect();
        assert_eq!(after, vec![false, false, true]);
        assert!(meter_profile(&rows, "m-9").is_none());
    }

    #[test]
    fn suspicious_profiles_respect_limit() {
        let output = ClassificationOutput {
            annotated: vec![
                annotated("m-1", date!(2020 - 01 - 01), None),
                annotated("m-2", date!(2020 - 01 - 01), None),
            ],
            suspicious: ["m-1", "m-2"]
                .iter()
                .map(|m| SuspiciousMeter {
                    meter_id: m.to_string(),
                    building_id: "b-1".to_string(),
                    record_date: date!(2020 - 01 - 01),
                    explanation: String::new(),
                })
                .collect(),
        };

        let profiles = suspicious_profiles(&output, 1);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].meter_id, "m-1");
        assert_eq!(suspicious_profiles(&output, 10).len(), 2);
    }
}

use time::Date;

use super::Reading;

/// A reading augmented with every value derived by the tamper analysis.
///
/// Derived values that are undefined for the reading (zero yearly mean,
/// empty building/month bucket, no record) are `None` rather than zero.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnotatedReading {
    pub meter_id: String,
    pub building_id: String,
    #[cfg_attr(feature = "serde", serde(with = "crate::domain::date_format"))]
    pub date: Date,
    pub consumption: f64,
    pub seasonal_index: Option<f64>,
    pub building_baseline: Option<f64>,
    pub building_deviation: Option<f64>,
    #[cfg_attr(feature = "serde", serde(with = "crate::domain::date_format::option"))]
    pub record_date: Option<Date>,
    pub suspicious: bool,
    pub explanation: String,
}

impl AnnotatedReading {
    /// Starts an annotation with nothing derived yet.
    pub fn unannotated(reading: &Reading) -> Self {
        Self {
            meter_id: reading.meter_id.clone(),
            building_id: reading.building_id.clone(),
            date: reading.date,
            consumption: reading.consumption,
            seasonal_index: None,
            building_baseline: None,
            building_deviation: None,
            record_date: None,
            suspicious: false,
            explanation: String::new(),
        }
    }
}

/// One row of the suspicious-meter list handed to analysts.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SuspiciousMeter {
    pub meter_id: String,
    pub building_id: String,
    #[cfg_attr(feature = "serde", serde(with = "crate::domain::date_format"))]
    pub record_date: Date,
    pub explanation: String,
}

use time::{Date, Month};

/// One monthly meter read.
///
/// Readings are immutable once ingested; analysis only ever derives new
/// values from them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    pub meter_id: String,
    pub building_id: String,
    #[cfg_attr(feature = "serde", serde(with = "crate::domain::date_format"))]
    pub date: Date,
    pub consumption: f64,
}

impl Reading {
    pub fn new(
        meter_id: impl Into<String>,
        building_id: impl Into<String>,
        date: Date,
        consumption: f64,
    ) -> Self {
        Self {
            meter_id: meter_id.into(),
            building_id: building_id.into(),
            date,
            consumption,
        }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> Month {
        self.date.month()
    }
}

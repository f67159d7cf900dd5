//! Ingestion boundary: maps raw columns onto typed `Reading`s and collects
//! every schema problem into one `SchemaError`.

use std::fmt;

use csv::StringRecord;
use meter_client::domain::{date_format::parse_month_date, Reading};
use serde::{Deserialize, Serialize};

/// Header names of the four required columns.
///
/// Consumption values are read with `.` or a decimal `,` (`12,5`), never with
/// thousands grouping: `1,234` is 1.234, and `1.234,5` is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub meter_id: String,
    pub building_id: String,
    pub date: String,
    pub consumption: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            meter_id: "meter_id".to_string(),
            building_id: "building_id".to_string(),
            date: "date".to_string(),
            consumption: "consumption".to_string(),
        }
    }
}

/// Positions of the required columns within a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex {
    meter_id: usize,
    building_id: usize,
    date: usize,
    consumption: usize,
}

impl ColumnMapping {
    /// Locates every required column, reporting all missing ones at once.
    pub fn resolve(&self, headers: &StringRecord) -> Result<ColumnIndex, SchemaError> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };

        let found = [
            (&self.meter_id, position(&self.meter_id)),
            (&self.building_id, position(&self.building_id)),
            (&self.date, position(&self.date)),
            (&self.consumption, position(&self.consumption)),
        ];
        let missing: Vec<String> = found
            .iter()
            .filter(|(_, pos)| pos.is_none())
            .map(|(name, _)| name.to_string())
            .collect();

        match found {
            [(_, Some(meter_id)), (_, Some(building_id)), (_, Some(date)), (_, Some(consumption))] => Ok(ColumnIndex {
                meter_id,
                building_id,
                date,
                consumption,
            }),
            _ => Err(SchemaError {
                missing_columns: missing,
                invalid: Vec::new(),
            }),
        }
    }
}

impl ColumnIndex {
    pub fn raw(&self, row: usize, record: &StringRecord) -> RawReading {
        let field = |idx: usize| record.get(idx).map(str::to_string);
        RawReading {
            row,
            meter_id: field(self.meter_id),
            building_id: field(self.building_id),
            date: field(self.date),
            consumption: field(self.consumption),
        }
    }
}

/// One untyped input row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReading {
    pub row: usize,
    pub meter_id: Option<String>,
    pub building_id: Option<String>,
    pub date: Option<String>,
    pub consumption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub row: usize,
    pub column: String,
    pub value: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn new(row: usize, column: &str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            row,
            column: column.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} column '{}': {}", self.row, self.column, self.reason)?;
        if !self.value.is_empty() {
            write!(f, " (value '{}')", self.value)?;
        }
        Ok(())
    }
}

/// Issues listed in the error message before truncating.
const MAX_LISTED_ISSUES: usize = 10;

fn describe(missing_columns: &[String], invalid: &[FieldIssue]) -> String {
    let mut parts = Vec::new();
    if !missing_columns.is_empty() {
        parts.push(format!("missing required columns: {}", missing_columns.join(", ")));
    }
    if !invalid.is_empty() {
        let listed: Vec<String> = invalid.iter().take(MAX_LISTED_ISSUES).map(|i| i.to_string()).collect();
        let mut s = format!("{} invalid field(s): {}", invalid.len(), listed.join("; "));
        if invalid.len() > MAX_LISTED_ISSUES {
            s.push_str(&format!("; and {} more", invalid.len() - MAX_LISTED_ISSUES));
        }
        parts.push(s);
    }
    parts.join("; ")
}

/// Every reason an input dataset was rejected, gathered before any analysis
/// runs.
#[derive(thiserror::Error, Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[error("invalid input: {}", describe(.missing_columns, .invalid))]
pub struct SchemaError {
    pub missing_columns: Vec<String>,
    pub invalid: Vec<FieldIssue>,
}

impl SchemaError {
    pub fn from_issues(invalid: Vec<FieldIssue>) -> Result<(), Self> {
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(Self {
                missing_columns: Vec::new(),
                invalid,
            })
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing_columns.is_empty() && self.invalid.is_empty()
    }

    pub fn merge(&mut self, other: SchemaError) {
        for col in other.missing_columns {
            if !self.missing_columns.contains(&col) {
                self.missing_columns.push(col);
            }
        }
        self.invalid.extend(other.invalid);
    }
}

fn required_text(row: usize, column: &str, value: Option<String>, issues: &mut Vec<FieldIssue>) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            issues.push(FieldIssue::new(row, column, "", "missing value"));
            None
        }
    }
}

/// Parses a consumption figure, accepting a decimal comma when no decimal
/// point is present (`"12,5"`). Grouping separators are not recognised.
fn parse_consumption(s: &str) -> Result<f64, String> {
    let normalized = if s.contains(',') && !s.contains('.') {
        s.replace(',', ".")
    } else {
        s.to_string()
    };
    normalized.parse::<f64>().map_err(|e| format!("not a number: {e}"))
}

impl RawReading {
    pub fn parse(self) -> Result<Reading, SchemaError> {
        let row = self.row;
        let mut issues = Vec::new();

        let meter_id = required_text(row, "meter_id", self.meter_id, &mut issues);
        let building_id = required_text(row, "building_id", self.building_id, &mut issues);

        let date = required_text(row, "date", self.date, &mut issues).and_then(|raw| match parse_month_date(&raw) {
            Ok(d) => Some(d),
            Err(e) => {
                issues.push(FieldIssue::new(row, "date", raw, e.to_string()));
                None
            }
        });

        let consumption = required_text(row, "consumption", self.consumption, &mut issues).and_then(|raw| {
            match parse_consumption(&raw) {
                Ok(v) => Some(v),
                Err(reason) => {
                    issues.push(FieldIssue::new(row, "consumption", raw, reason));
                    None
                }
            }
        });

        match (meter_id, building_id, date, consumption) {
            (Some(meter_id), Some(building_id), Some(date), Some(consumption)) if issues.is_empty() => {
                let reading = Reading {
                    meter_id,
                    building_id,
                    date,
                    consumption,
                };
                SchemaError::from_issues(check_reading(row, &reading))?;
                Ok(reading)
            }
            _ => Err(SchemaError {
                missing_columns: Vec::new(),
                invalid: issues,
            }),
        }
    }
}

/// Value checks shared by every path that produces typed readings.
pub fn check_reading(row: usize, reading: &Reading) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    if reading.meter_id.trim().is_empty() {
        issues.push(FieldIssue::new(row, "meter_id", "", "missing value"));
    }
    if reading.building_id.trim().is_empty() {
        issues.push(FieldIssue::new(row, "building_id", "", "missing value"));
    }
    if !reading.consumption.is_finite() {
        issues.push(FieldIssue::new(row, "consumption", reading.consumption.to_string(), "must be finite"));
    } else if reading.consumption < 0.0 {
        issues.push(FieldIssue::new(
            row,
            "consumption",
            reading.consumption.to_string(),
            "must be non-negative",
        ));
    }
    issues
}

/// Validates an already-typed dataset; rows are numbered from 1.
pub fn validate_readings(readings: &[Reading]) -> Result<(), SchemaError> {
    let issues = readings
        .iter()
        .enumerate()
        .flat_map(|(i, r)| check_reading(i + 1, r))
        .collect();
    SchemaError::from_issues(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn headers(cols: &[&str]) -> StringRecord {
        StringRecord::from(cols.to_vec())
    }

    #[test]
    fn resolves_custom_column_names() {
        let mapping = ColumnMapping {
            meter_id: "TesisatNo".to_string(),
            building_id: "BinaNo".to_string(),
            date: "Tarih".to_string(),
            consumption: "Tüketim".to_string(),
        };
        let index = mapping
            .resolve(&headers(&["\u{feff}Tarih", "BinaNo", "TesisatNo", " Tüketim "]))
            .expect("all columns present");

        let raw = index.raw(2, &headers(&["2021-03", "B7", "1001", "12,5"]));
        let reading = raw.parse().expect("valid row");
        assert_eq!(reading.meter_id, "1001");
        assert_eq!(reading.building_id, "B7");
        assert_eq!(reading.date, date!(2021 - 03 - 01));
        assert_eq!(reading.consumption, 12.5);
    }

    #[test]
    fn reports_every_missing_column() {
        let err = ColumnMapping::default()
            .resolve(&headers(&["meter_id", "reading"]))
            .unwrap_err();
        assert_eq!(err.missing_columns, vec!["building_id", "date", "consumption"]);
        assert!(err.to_string().contains("missing required columns: building_id, date, consumption"));
    }

    #[test]
    fn collects_all_issues_of_a_row() {
        let raw = RawReading {
            row: 7,
            meter_id: Some("  ".to_string()),
            building_id: Some("b-1".to_string()),
            date: Some("07/2021".to_string()),
            consumption: Some("-3".to_string()),
        };
        let err = raw.parse().unwrap_err();
        let columns: Vec<&str> = err.invalid.iter().map(|i| i.column.as_str()).collect();
        assert_eq!(columns, vec!["meter_id", "date"]);
        assert!(err.invalid.iter().all(|i| i.row == 7));
    }

    #[test]
    fn negative_and_non_numeric_consumption_are_rejected() {
        let base = RawReading {
            row: 1,
            meter_id: Some("m".to_string()),
            building_id: Some("b".to_string()),
            date: Some("2020-01-01".to_string()),
            consumption: None,
        };

        let neg = RawReading {
            consumption: Some("-3".to_string()),
            ..base.clone()
        };
        let err = neg.parse().unwrap_err();
        assert_eq!(err.invalid[0].reason, "must be non-negative");

        let text = RawReading {
            consumption: Some("lots".to_string()),
            ..base.clone()
        };
        assert!(text.parse().unwrap_err().invalid[0].reason.starts_with("not a number"));

        let err = base.parse().unwrap_err();
        assert_eq!(err.invalid[0].column, "consumption");
        assert_eq!(err.invalid[0].reason, "missing value");
    }

    #[test]
    fn consumption_comma_is_always_decimal() {
        assert_eq!(parse_consumption("12,5"), Ok(12.5));
        assert_eq!(parse_consumption("1,234"), Ok(1.234));
        assert_eq!(parse_consumption("1.234"), Ok(1.234));
        assert!(parse_consumption("1.234,5").is_err());
    }

    #[test]
    fn merge_keeps_columns_unique_and_truncates_message() {
        let mut err = SchemaError::default();
        assert!(err.is_empty());
        for row in 1..=12 {
            err.merge(SchemaError {
                missing_columns: vec!["date".to_string()],
                invalid: vec![FieldIssue::new(row, "consumption", "x", "not a number")],
            });
        }
        assert_eq!(err.missing_columns, vec!["date"]);
        assert_eq!(err.invalid.len(), 12);
        assert!(err.to_string().ends_with("and 2 more"));
    }

    #[test]
    fn typed_readings_are_rechecked() {
        let readings = vec![
            Reading::new("m-1", "b-1", date!(2020 - 01 - 01), 1.0),
            Reading::new("m-2", "", date!(2020 - 01 - 01), f64::NAN),
        ];
        let err = validate_readings(&readings).unwrap_err();
        assert_eq!(err.invalid.len(), 2);
        assert!(err.invalid.iter().all(|i| i.row == 2));
    }
}

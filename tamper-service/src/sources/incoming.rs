use crate::schema::{FieldIssue, RawReading, SchemaError};

/// A JSON scalar that may arrive as a string or a number.
///
/// Meter and building numbers are opaque identifiers; exports are not
/// consistent about quoting them.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
        }
    }
}

/// Reading as submitted over HTTP or in NDJSON files.
///
/// Every field is optional here so a missing field is reported as a schema
/// issue instead of a bare deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct IncomingReading {
    pub meter_id: Option<Scalar>,
    pub building_id: Option<Scalar>,
    pub date: Option<String>,
    pub consumption: Option<Scalar>,
}

impl IncomingReading {
    /// Decodes one JSON reading; a malformed object becomes a schema issue
    /// on `row` instead of failing the whole batch.
    pub fn from_json(value: serde_json::Value, row: usize) -> Result<Self, SchemaError> {
        serde_json::from_value(value).map_err(|e| record_issue(row, &e))
    }

    pub fn into_raw(self, row: usize) -> RawReading {
        RawReading {
            row,
            meter_id: self.meter_id.map(Scalar::into_text),
            building_id: self.building_id.map(Scalar::into_text),
            date: self.date,
            consumption: self.consumption.map(Scalar::into_text),
        }
    }
}

pub(crate) fn record_issue(row: usize, e: &serde_json::Error) -> SchemaError {
    SchemaError {
        missing_columns: Vec::new(),
        invalid: vec![FieldIssue::new(row, "<record>", "", format!("invalid JSON: {e}"))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn numeric_identifiers_and_consumption_are_accepted() {
        let incoming: IncomingReading = serde_json::from_str(
            r#"{"meter_id": 100234, "building_id": "B-7", "date": "2021-04", "consumption": 12.75}"#,
        )
        .unwrap();

        let reading = incoming.into_raw(1).parse().unwrap();
        assert_eq!(reading.meter_id, "100234");
        assert_eq!(reading.building_id, "B-7");
        assert_eq!(reading.date, date!(2021 - 04 - 01));
        assert_eq!(reading.consumption, 12.75);
    }

    #[test]
    fn missing_fields_become_schema_issues() {
        let incoming: IncomingReading = serde_json::from_str(r#"{"meter_id": "m-1"}"#).unwrap();
        let err = incoming.into_raw(4).parse().unwrap_err();
        let columns: Vec<&str> = err.invalid.iter().map(|i| i.column.as_str()).collect();
        assert_eq!(columns, vec!["building_id", "date", "consumption"]);
    }

    #[test]
    fn mistyped_fields_are_reported_on_their_row() {
        let err = IncomingReading::from_json(serde_json::json!({"meter_id": "m-1", "date": 202101}), 3).unwrap_err();
        assert_eq!(err.invalid.len(), 1);
        assert_eq!(err.invalid[0].row, 3);
        assert!(err.invalid[0].reason.starts_with("invalid JSON"));

        assert!(IncomingReading::from_json(serde_json::json!([1, 2]), 4).is_err());
    }
}

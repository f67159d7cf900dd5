//! Month-resolution dates as they appear in meter-read exports.
//!
//! Accepted inputs:
//! - `YYYY-MM` (first day of the month)
//! - `YYYY-MM-DD`
//! - `YYYY-MM-DD HH:MM:SS` (spreadsheet exports)
//! - RFC3339 timestamps (date part only)
//!
//! Dates are always written back as `YYYY-MM-DD`.

use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DateParseError {
    #[error("date is empty")]
    Empty,
    #[error("unrecognised date '{0}', expected YYYY-MM, YYYY-MM-DD or RFC3339")]
    Unrecognised(String),
}

pub fn parse_month_date(s: &str) -> Result<Date, DateParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DateParseError::Empty);
    }

    let day = format_description!("[year]-[month]-[day]");
    if let Ok(d) = Date::parse(s, day) {
        return Ok(d);
    }
    if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(ts.date());
    }
    if let Ok(dt) = PrimitiveDateTime::parse(s, format_description!("[year]-[month]-[day] [hour]:[minute]:[second]")) {
        return Ok(dt.date());
    }
    if let Ok(d) = Date::parse(&format!("{s}-01"), day) {
        return Ok(d);
    }

    Err(DateParseError::Unrecognised(s.to_string()))
}

pub fn format_date(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
}

#[cfg(feature = "serde")]
pub fn serialize<S>(d: &Date, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_date(*d))
}

#[cfg(feature = "serde")]
pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    let s = String::deserialize(deserializer)?;
    parse_month_date(&s).map_err(serde::de::Error::custom)
}

#[cfg(feature = "serde")]
pub mod option {
    use time::Date;

    pub fn serialize<S>(d: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match d {
            Some(d) => serializer.serialize_some(&super::format_date(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::Deserialize;

        match Option::<String>::deserialize(deserializer)? {
            Some(s) if !s.trim().is_empty() => super::parse_month_date(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_year_month_as_first_of_month() {
        assert_eq!(parse_month_date("2021-03"), Ok(date!(2021 - 03 - 01)));
    }

    #[test]
    fn parses_full_dates_and_timestamps() {
        assert_eq!(parse_month_date(" 2021-03-15 "), Ok(date!(2021 - 03 - 15)));
        assert_eq!(parse_month_date("2021-03-01 00:00:00"), Ok(date!(2021 - 03 - 01)));
        assert_eq!(parse_month_date("2021-03-01T00:00:00Z"), Ok(date!(2021 - 03 - 01)));
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert_eq!(parse_month_date("  "), Err(DateParseError::Empty));
        assert!(matches!(parse_month_date("03/2021"), Err(DateParseError::Unrecognised(_))));
        assert!(matches!(parse_month_date("2021-13"), Err(DateParseError::Unrecognised(_))));
    }

    #[test]
    fn formats_with_zero_padding() {
        assert_eq!(format_date(date!(2021 - 03 - 01)), "2021-03-01");
    }
}

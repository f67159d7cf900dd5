//! Permanent-drop decision rule.
//!
//! A meter is suspicious only if it passes every gate, in order:
//!
//! 1. it has a record (peak consumption) date;
//! 2. at least 6 readings before and 12 after the record date (the record
//!    reading itself belongs to neither side);
//! 3. at least one calendar month has a valid seasonal index on both sides;
//! 4. the average per-month seasonal drop reaches `drop_threshold`;
//! 5. the mean index over the first two post-record years stays below
//!    `before_avg * (1 - permanent_threshold)`;
//! 6. the mean building deviation over the whole post-record period is below
//!    `-building_threshold`.
//!
//! The first failing gate decides the reason. Thresholds are taken as given;
//! range checks belong to whoever builds them.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::{Deserialize, Serialize};
use time::Date;

use super::MeterObservation;

pub const MIN_READINGS_BEFORE: usize = 6;
pub const MIN_READINGS_AFTER: usize = 12;

/// Number of post-record years the permanence check looks at.
const PERMANENCE_YEARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub drop_threshold: f64,
    pub permanent_threshold: f64,
    pub building_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            drop_threshold: 0.30,
            permanent_threshold: 0.30,
            building_threshold: 0.20,
        }
    }
}

/// Why a meter was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    NoRecord,
    InsufficientData { before: usize, after: usize },
    TooFewPostRecordYears { years: usize },
    NoCommonMonths,
    DropNotComputable,
    InsufficientDrop,
    DropNotPermanent,
    NotConfirmedByBuilding,
}

impl Reason {
    /// Stable label for metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Reason::NoRecord => "no_record",
            Reason::InsufficientData { .. } | Reason::TooFewPostRecordYears { .. } => "insufficient_data",
            Reason::NoCommonMonths => "no_common_months",
            Reason::DropNotComputable => "drop_not_computable",
            Reason::InsufficientDrop => "insufficient_drop",
            Reason::DropNotPermanent => "drop_not_permanent",
            Reason::NotConfirmedByBuilding => "not_confirmed_by_building",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Suspicious,
    Cleared(Reason),
}

/// Terminal decision for one meter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub outcome: Outcome,
    pub avg_drop_ratio: Option<f64>,
    pub building_deviation_avg: Option<f64>,
}

impl Classification {
    fn cleared(reason: Reason) -> Self {
        Self {
            outcome: Outcome::Cleared(reason),
            avg_drop_ratio: None,
            building_deviation_avg: None,
        }
    }

    fn cleared_with_drop(reason: Reason, avg_drop: f64) -> Self {
        Self {
            avg_drop_ratio: Some(avg_drop),
            ..Self::cleared(reason)
        }
    }

    pub fn is_suspicious(&self) -> bool {
        self.outcome == Outcome::Suspicious
    }

    pub fn reason(&self) -> Option<Reason> {
        match self.outcome {
            Outcome::Suspicious => None,
            Outcome::Cleared(r) => Some(r),
        }
    }

    pub fn outcome_code(&self) -> &'static str {
        match self.outcome {
            Outcome::Suspicious => "suspicious",
            Outcome::Cleared(r) => r.code(),
        }
    }

    /// Human-readable explanation for analysts; not meant to be parsed.
    pub fn explanation(&self) -> String {
        self.to_string()
    }
}

fn pct(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let drop = pct(self.avg_drop_ratio);
        match self.outcome {
            Outcome::Suspicious => write!(
                f,
                "suspicious: average seasonal drop {drop}, building deviation {}",
                pct(self.building_deviation_avg)
            ),
            Outcome::Cleared(Reason::NoRecord) => f.write_str("no record"),
            Outcome::Cleared(Reason::InsufficientData { before, after }) => write!(
                f,
                "insufficient data ({before} readings before record, {after} after; need {MIN_READINGS_BEFORE} and {MIN_READINGS_AFTER})"
            ),
            Outcome::Cleared(Reason::TooFewPostRecordYears { years }) => write!(
                f,
                "insufficient data (readings after record span {years} year(s), need {PERMANENCE_YEARS})"
            ),
            Outcome::Cleared(Reason::NoCommonMonths) => f.write_str("no common months"),
            Outcome::Cleared(Reason::DropNotComputable) => f.write_str("drop not computable"),
            Outcome::Cleared(Reason::InsufficientDrop) => {
                write!(f, "insufficient drop (average drop {drop})")
            }
            Outcome::Cleared(Reason::DropNotPermanent) => {
                write!(f, "drop not permanent (average drop {drop})")
            }
            Outcome::Cleared(Reason::NotConfirmedByBuilding) => {
                write!(f, "drop not confirmed by building comparison (average drop {drop})")
            }
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Mean valid seasonal index per calendar month (1..=12).
fn monthly_means(observations: &[&MeterObservation]) -> BTreeMap<u8, f64> {
    let mut sums: BTreeMap<u8, (f64, usize)> = BTreeMap::new();
    for o in observations {
        if let Some(idx) = o.seasonal_index {
            let entry = sums.entry(u8::from(o.date.month())).or_insert((0.0, 0));
            entry.0 += idx;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(month, (sum, count))| (month, sum / count as f64))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DropClassifier {
    thresholds: Thresholds,
}

impl DropClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Runs the gate chain over one meter's observations.
    pub fn classify(&self, observations: &[MeterObservation], record_date: Option<Date>) -> Classification {
        let Some(record_date) = record_date else {
            return Classification::cleared(Reason::NoRecord);
        };

        let before: Vec<&MeterObservation> = observations.iter().filter(|o| o.date < record_date).collect();
        let after: Vec<&MeterObservation> = observations.iter().filter(|o| o.date > record_date).collect();
        if before.len() < MIN_READINGS_BEFORE || after.len() < MIN_READINGS_AFTER {
            return Classification::cleared(Reason::InsufficientData {
                before: before.len(),
                after: after.len(),
            });
        }

        let before_months = monthly_means(&before);
        let after_months = monthly_means(&after);
        let common: Vec<(f64, f64)> = before_months
            .iter()
            .filter_map(|(month, b)| after_months.get(month).map(|a| (*b, *a)))
            .collect();
        if common.is_empty() {
            return Classification::cleared(Reason::NoCommonMonths);
        }

        let Some(avg_drop) = mean(
            common
                .iter()
                .filter(|(b, _)| *b > 0.0)
                .map(|(b, a)| (b - a) / b),
        ) else {
            return Classification::cleared(Reason::DropNotComputable);
        };
        if avg_drop < self.thresholds.drop_threshold {
            return Classification::cleared_with_drop(Reason::InsufficientDrop, avg_drop);
        }

        let years_after: BTreeSet<i32> = after.iter().map(|o| o.date.year()).collect();
        if years_after.len() < PERMANENCE_YEARS {
            return Classification::cleared_with_drop(
                Reason::TooFewPostRecordYears { years: years_after.len() },
                avg_drop,
            );
        }
        let early_years: Vec<i32> = years_after.into_iter().take(PERMANENCE_YEARS).collect();
        let early_after_avg = mean(
            after
                .iter()
                .filter(|o| early_years.contains(&o.date.year()))
                .filter_map(|o| o.seasonal_index),
        );
        let before_avg = mean(before.iter().filter_map(|o| o.seasonal_index));
        let permanent = match (early_after_avg, before_avg) {
            (Some(early), Some(base)) => early < base * (1.0 - self.thresholds.permanent_threshold),
            _ => false,
        };
        if !permanent {
            return Classification::cleared_with_drop(Reason::DropNotPermanent, avg_drop);
        }

        let building_deviation_avg = mean(after.iter().filter_map(|o| o.building_deviation));
        match building_deviation_avg {
            Some(dev) if dev < -self.thresholds.building_threshold => Classification {
                outcome: Outcome::Suspicious,
                avg_drop_ratio: Some(avg_drop),
                building_deviation_avg: Some(dev),
            },
            _ => Classification {
                outcome: Outcome::Cleared(Reason::NotConfirmedByBuilding),
                avg_drop_ratio: Some(avg_drop),
                building_deviation_avg,
            },
        }
    }
}

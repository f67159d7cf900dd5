//! Tamper analytics: seasonal normalization, building peer baselines,
//! record detection and the permanent-drop decision rule.

pub mod baseline;
pub mod classifier;
pub mod orchestrator;
pub mod profile;
pub mod record;
pub mod seasonal;

use time::Date;

pub use classifier::{Classification, DropClassifier, Outcome, Reason, Thresholds};
pub use orchestrator::{classify, classify_sharded, ClassificationOutput, ClassifyError};

/// One reading of a single meter as seen by the per-meter stages, with the
/// global seasonal and peer values already resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterObservation {
    pub date: Date,
    pub consumption: f64,
    pub seasonal_index: Option<f64>,
    pub building_deviation: Option<f64>,
}

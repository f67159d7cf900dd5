//! Runs the analysis stages over a whole dataset and merges the per-meter
//! verdicts back onto every reading.
//!
//! Stage order: seasonal indices, building baselines (a barrier over all
//! meters), then record detection and classification per meter. The per-meter
//! part is independent across meters and may be sharded over workers.

use std::{
    collections::{BTreeMap, HashMap},
    time::Instant,
};

use meter_client::domain::{AnnotatedReading, Reading, SuspiciousMeter};
use time::Date;

use super::{
    baseline::{BuildingBaselines, PeerComparison},
    classifier::{Classification, DropClassifier, Thresholds},
    record::record_date,
    seasonal::seasonal_indices,
    MeterObservation,
};
use crate::schema::{validate_readings, SchemaError};

#[derive(thiserror::Error, Debug)]
pub enum ClassifyError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("unexpected failure during classification: {0}")]
    Unexpected(String),
}

/// Reading-level annotations plus the deduplicated suspicious-meter list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationOutput {
    /// One row per input reading, in input order.
    pub annotated: Vec<AnnotatedReading>,
    /// One row per flagged meter, sorted by meter id.
    pub suspicious: Vec<SuspiciousMeter>,
}

impl ClassificationOutput {
    pub fn meter_count(&self) -> usize {
        self.annotated
            .iter()
            .map(|a| a.meter_id.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len()
    }
}

/// All readings of one meter, in chronological order.
struct MeterSeries {
    meter_id: String,
    building_id: String,
    rows: Vec<usize>,
    observations: Vec<MeterObservation>,
}

struct MeterVerdict {
    meter_id: String,
    building_id: String,
    rows: Vec<usize>,
    record_date: Option<Date>,
    classification: Classification,
}

/// Global stages shared by every meter.
struct PeerAnnotations {
    indices: Vec<Option<f64>>,
    comparisons: Vec<PeerComparison>,
}

fn prepare(readings: &[Reading]) -> (PeerAnnotations, Vec<MeterSeries>) {
    let indices = seasonal_indices(readings);
    let baselines = BuildingBaselines::compute(readings, &indices);
    let comparisons = baselines.compare(readings, &indices);
    tracing::debug!(
        readings = readings.len(),
        baseline_slots = baselines.len(),
        "seasonal indices and building baselines computed"
    );

    let mut by_meter: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, r) in readings.iter().enumerate() {
        by_meter.entry(r.meter_id.as_str()).or_default().push(i);
    }

    let meters = by_meter
        .into_iter()
        .map(|(meter_id, mut rows)| {
            rows.sort_by_key(|&i| readings[i].date);
            let observations = rows
                .iter()
                .map(|&i| MeterObservation {
                    date: readings[i].date,
                    consumption: readings[i].consumption,
                    seasonal_index: indices[i],
                    building_deviation: comparisons[i].deviation,
                })
                .collect();
            MeterSeries {
                meter_id: meter_id.to_string(),
                building_id: readings[rows[0]].building_id.clone(),
                rows,
                observations,
            }
        })
        .collect();

    (PeerAnnotations { indices, comparisons }, meters)
}

fn evaluate_meter(classifier: &DropClassifier, series: MeterSeries) -> MeterVerdict {
    let record_date = record_date(&series.observations);
    let classification = classifier.classify(&series.observations, record_date);
    tracing::debug!(
        meter_id = %series.meter_id,
        outcome = classification.outcome_code(),
        avg_drop_ratio = ?classification.avg_drop_ratio,
        building_deviation_avg = ?classification.building_deviation_avg,
        "meter classified"
    );
    MeterVerdict {
        meter_id: series.meter_id,
        building_id: series.building_id,
        rows: series.rows,
        record_date,
        classification,
    }
}

fn assemble(
    readings: &[Reading],
    peer: PeerAnnotations,
    mut verdicts: Vec<MeterVerdict>,
    started: Instant,
) -> ClassificationOutput {
    verdicts.sort_by(|a, b| a.meter_id.cmp(&b.meter_id));

    let mut annotated: Vec<AnnotatedReading> = readings
        .iter()
        .zip(peer.indices.iter().zip(&peer.comparisons))
        .map(|(r, (idx, cmp))| AnnotatedReading {
            seasonal_index: *idx,
            building_baseline: cmp.baseline,
            building_deviation: cmp.deviation,
            ..AnnotatedReading::unannotated(r)
        })
        .collect();

    let mut suspicious = Vec::new();
    for v in &verdicts {
        let explanation = v.classification.explanation();
        let flagged = v.classification.is_suspicious();
        for &row in &v.rows {
            let a = &mut annotated[row];
            a.record_date = v.record_date;
            a.suspicious = flagged;
            a.explanation = explanation.clone();
        }

        metrics::counter!("tamper_meters_classified_total", "outcome" => v.classification.outcome_code())
            .increment(1);

        if let (true, Some(record_date)) = (flagged, v.record_date) {
            suspicious.push(SuspiciousMeter {
                meter_id: v.meter_id.clone(),
                building_id: v.building_id.clone(),
                record_date,
                explanation,
            });
        }
    }

    metrics::counter!("tamper_suspicious_meters_total").increment(suspicious.len() as u64);
    metrics::histogram!("tamper_classification_duration_seconds").record(started.elapsed().as_secs_f64());
    tracing::info!(
        readings = readings.len(),
        meters = verdicts.len(),
        suspicious = suspicious.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "classification complete"
    );

    ClassificationOutput { annotated, suspicious }
}

/// Classifies every meter in `readings` on the calling thread.
///
/// Only schema problems come back as errors; a panic inside a stage unwinds
/// to the caller. Use [`classify_sharded`] where a failing stage must surface
/// as [`ClassifyError::Unexpected`].
pub fn classify(readings: &[Reading], thresholds: &Thresholds) -> Result<ClassificationOutput, ClassifyError> {
    let started = Instant::now();
    validate_readings(readings)?;

    let (peer, meters) = prepare(readings);
    let classifier = DropClassifier::new(*thresholds);
    let verdicts = meters.into_iter().map(|s| evaluate_meter(&classifier, s)).collect();

    Ok(assemble(readings, peer, verdicts, started))
}

fn shard_index(key: &str, workers: usize) -> usize {
    use std::hash::{Hash, Hasher};

    let mut h = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut h);
    (h.finish() as usize) % workers.max(1)
}

/// Same result as [`classify`], with per-meter evaluation spread over
/// `workers` blocking tasks once the building baselines are final.
///
/// A failing worker aborts the whole run; no partial output is returned.
pub async fn classify_sharded(
    readings: Vec<Reading>,
    thresholds: Thresholds,
    workers: usize,
) -> Result<ClassificationOutput, ClassifyError> {
    let started = Instant::now();
    validate_readings(&readings)?;

    let workers = workers.max(1);
    let (peer, meters) = prepare(&readings);

    let mut shards: HashMap<usize, Vec<MeterSeries>> = HashMap::new();
    for series in meters {
        shards
            .entry(shard_index(&series.meter_id, workers))
            .or_default()
            .push(series);
    }

    let classifier = DropClassifier::new(thresholds);
    let joins: Vec<_> = shards
        .into_values()
        .map(|shard| {
            tokio::task::spawn_blocking(move || {
                shard
                    .into_iter()
                    .map(|s| evaluate_meter(&classifier, s))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut verdicts = Vec::new();
    for j in joins {
        match j.await {
            Ok(v) => verdicts.extend(v),
            Err(e) => {
                tracing::error!(error = %e, "meter classification worker failed");
                return Err(ClassifyError::Unexpected(format!("meter worker failed: {e}")));
            }
        }
    }

    Ok(assemble(&readings, peer, verdicts, started))
}
